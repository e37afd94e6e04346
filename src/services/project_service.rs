use chrono::Utc;
use sea_orm::*;
use sea_orm::sea_query::{Expr, Query};
use validator::Validate;

use crate::error::AppError;
use crate::models::dto::{CreateProjectRequest, ProjectDetail, UpdateProjectRequest};
use crate::models::{equipment, project};
use crate::services::listing::{self, ListRequest, Page};

pub const DUPLICATE_CODE: &str = "Project code already exists";

pub struct ProjectService;

/// Champs de tri autorisés (nom JSON -> colonne)
fn sort_column(field: &str) -> Option<project::Column> {
    match field {
        "createdAt" => Some(project::Column::CreatedAt),
        "updatedAt" => Some(project::Column::UpdatedAt),
        "code" => Some(project::Column::Code),
        "cmn" => Some(project::Column::Cmn),
        "refTSK" => Some(project::Column::RefTsk),
        "refS" => Some(project::Column::RefS),
        "qte" => Some(project::Column::Qte),
        "status" => Some(project::Column::Status),
        "id" => Some(project::Column::Id),
        _ => None,
    }
}

/// code, cmn, refTSK, refS ou l'assetNumber d'un de ses équipements
fn search_condition(term: &str) -> Condition {
    let pattern = listing::like_pattern(term);

    let matching_equipments = Query::select()
        .column(equipment::Column::ProjectId)
        .from(equipment::Entity)
        .and_where(listing::contains(equipment::Entity, equipment::Column::AssetNumber, &pattern))
        .to_owned();

    Condition::any()
        .add(listing::contains(project::Entity, project::Column::Code, &pattern))
        .add(listing::contains(project::Entity, project::Column::Cmn, &pattern))
        .add(listing::contains(project::Entity, project::Column::RefTsk, &pattern))
        .add(listing::contains(project::Entity, project::Column::RefS, &pattern))
        .add(Expr::col((project::Entity, project::Column::Id)).in_subquery(matching_equipments))
}

impl ProjectService {
    pub async fn create(
        db: &DatabaseConnection,
        request: CreateProjectRequest,
    ) -> Result<project::Model, AppError> {
        let request = request.trimmed();
        request.validate()?;

        if Self::exists_with_code(db, &request.code).await? {
            return Err(AppError::DuplicateKey(DUPLICATE_CODE.to_string()));
        }

        let now = Utc::now();
        let new_project = project::ActiveModel {
            code: Set(request.code),
            cmn: Set(request.cmn),
            ref_tsk: Set(request.ref_tsk),
            qte: Set(request.qte),
            pin: Set(request.pin),
            sap1: Set(request.sap1),
            sap2: Set(request.sap2),
            ref_s: Set(request.ref_s),
            status: Set(request.status.unwrap_or_default()),
            equipments: Set(Vec::new()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        new_project
            .insert(db)
            .await
            .map_err(|e| AppError::from_db(e, DUPLICATE_CODE))
    }

    pub async fn list(
        db: &DatabaseConnection,
        request: &ListRequest,
    ) -> Result<Page<project::Model>, AppError> {
        let sort = request.sort_column(sort_column)?;
        let condition = request.search.as_deref().map(search_condition);

        // 1. Total sur le filtre seul
        let mut count_query = project::Entity::find();
        if let Some(condition) = condition.clone() {
            count_query = count_query.filter(condition);
        }
        let total = count_query.count(db).await?;

        // 2. Page demandée, plus récents d'abord
        let mut query = project::Entity::find();
        if let Some(condition) = condition {
            query = query.filter(condition);
        }
        let query = query
            .order_by(sort, listing::order(true))
            .order_by_asc(project::Column::Id);
        let projects = listing::Pagination::apply(request.pagination.as_ref(), query)
            .all(db)
            .await?;

        Ok(Page::new(projects, total, request.pagination.as_ref()))
    }

    pub async fn get(db: &DatabaseConnection, id: i32) -> Result<project::Model, AppError> {
        project::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("Project not found"))
    }

    /// Projet avec ses équipements peuplés, dans l'ordre du tableau
    pub async fn get_detail(db: &DatabaseConnection, id: i32) -> Result<ProjectDetail, AppError> {
        let project = Self::get(db, id).await?;

        let equipments = if project.equipments.is_empty() {
            Vec::new()
        } else {
            equipment::Entity::find()
                .filter(equipment::Column::Id.is_in(project.equipments.clone()))
                .all(db)
                .await?
        };

        Ok(ProjectDetail::new(project, equipments))
    }

    pub async fn update(
        db: &DatabaseConnection,
        id: i32,
        request: UpdateProjectRequest,
    ) -> Result<project::Model, AppError> {
        let request = request.trimmed();
        request.validate()?;

        let existing = Self::get(db, id).await?;
        let mut active: project::ActiveModel = existing.into();

        // Champs absents = inchangés
        if let Some(code) = request.code {
            active.code = Set(code);
        }
        if let Some(cmn) = request.cmn {
            active.cmn = Set(cmn);
        }
        if let Some(ref_tsk) = request.ref_tsk {
            active.ref_tsk = Set(ref_tsk);
        }
        if let Some(qte) = request.qte {
            active.qte = Set(qte);
        }
        if let Some(pin) = request.pin {
            active.pin = Set(pin);
        }
        if let Some(sap1) = request.sap1 {
            active.sap1 = Set(Some(sap1).filter(|s| !s.is_empty()));
        }
        if let Some(sap2) = request.sap2 {
            active.sap2 = Set(Some(sap2).filter(|s| !s.is_empty()));
        }
        if let Some(ref_s) = request.ref_s {
            active.ref_s = Set(ref_s);
        }
        if let Some(status) = request.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Utc::now());

        active
            .update(db)
            .await
            .map_err(|e| AppError::from_db(e, DUPLICATE_CODE))
    }

    /// Supprime le projet. Les équipements qui le référencent ne sont pas modifiés
    pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
        let project = Self::get(db, id).await?;

        let dangling = equipment::Entity::find()
            .filter(equipment::Column::ProjectId.eq(project.id))
            .count(db)
            .await?;
        if dangling > 0 {
            log::warn!(
                "Project {} deleted while {} equipment(s) still reference it",
                project.code,
                dangling
            );
        }

        project::Entity::delete_by_id(project.id).exec(db).await?;
        log::info!("Project {} deleted", project.code);
        Ok(())
    }

    pub async fn delete_all(db: &DatabaseConnection) -> Result<u64, AppError> {
        let result = project::Entity::delete_many().exec(db).await?;
        log::warn!("Deleted all projects ({} rows)", result.rows_affected);
        Ok(result.rows_affected)
    }

    /// Map code -> id pour la résolution des codes projet à l'import
    pub async fn code_map(
        db: &DatabaseConnection,
    ) -> Result<std::collections::HashMap<String, i32>, AppError> {
        let projects = project::Entity::find().all(db).await?;
        Ok(projects.into_iter().map(|p| (p.code, p.id)).collect())
    }

    pub async fn exists_with_code(db: &DatabaseConnection, code: &str) -> Result<bool, AppError> {
        let found = project::Entity::find()
            .filter(project::Column::Code.eq(code))
            .one(db)
            .await?;
        Ok(found.is_some())
    }
}
