use std::collections::HashMap;

use chrono::Utc;
use sea_orm::*;
use validator::Validate;

use crate::error::AppError;
use crate::models::dto::{
    CreateInterventionRequest, InterventionView, ProjectSummary, UpdateInterventionRequest,
    UserSummary,
};
use crate::models::{intervention, project, users};
use crate::services::listing::{self, ListRequest, Page};

pub struct InterventionService;

fn sort_column(field: &str) -> Option<intervention::Column> {
    match field {
        "createdAt" => Some(intervention::Column::CreatedAt),
        "updatedAt" => Some(intervention::Column::UpdatedAt),
        "description" => Some(intervention::Column::Description),
        "type" => Some(intervention::Column::InterventionType),
        "status" => Some(intervention::Column::Status),
        "id" => Some(intervention::Column::Id),
        _ => None,
    }
}

/// description + colonnes de l'utilisateur et du projet joints
fn search_condition(term: &str) -> Condition {
    let pattern = listing::like_pattern(term);
    Condition::any()
        .add(listing::contains(intervention::Entity, intervention::Column::Description, &pattern))
        .add(listing::contains(users::Entity, users::Column::FirstName, &pattern))
        .add(listing::contains(users::Entity, users::Column::LastName, &pattern))
        .add(listing::contains(users::Entity, users::Column::Code, &pattern))
        .add(listing::contains(users::Entity, users::Column::Email, &pattern))
        .add(listing::contains(users::Entity, users::Column::Post, &pattern))
        .add(listing::contains(project::Entity, project::Column::Code, &pattern))
        .add(listing::contains(project::Entity, project::Column::Cmn, &pattern))
        .add(listing::contains(project::Entity, project::Column::RefTsk, &pattern))
}

fn joined_query(condition: Option<Condition>) -> Select<intervention::Entity> {
    let query = intervention::Entity::find()
        .left_join(users::Entity)
        .left_join(project::Entity);
    match condition {
        Some(condition) => query.filter(condition),
        None => query,
    }
}

async fn ensure_user(db: &DatabaseConnection, user_id: i32) -> Result<(), AppError> {
    users::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::not_found("User not found"))
}

async fn ensure_project(db: &DatabaseConnection, project_id: i32) -> Result<(), AppError> {
    project::Entity::find_by_id(project_id)
        .one(db)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::not_found("Project not found"))
}

/// Charge en 2 requêtes les users et projets référencés par les interventions
async fn attach_relations(
    db: &DatabaseConnection,
    interventions: Vec<intervention::Model>,
) -> Result<Vec<InterventionView>, AppError> {
    let user_ids: Vec<i32> = interventions.iter().map(|i| i.user_id).collect();
    let project_ids: Vec<i32> = interventions.iter().map(|i| i.project_id).collect();

    let users_map: HashMap<i32, users::Model> = if user_ids.is_empty() {
        HashMap::new()
    } else {
        users::Entity::find()
            .filter(users::Column::Id.is_in(user_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect()
    };

    let projects_map: HashMap<i32, project::Model> = if project_ids.is_empty() {
        HashMap::new()
    } else {
        project::Entity::find()
            .filter(project::Column::Id.is_in(project_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect()
    };

    Ok(interventions
        .into_iter()
        .map(|intervention| InterventionView {
            user: users_map.get(&intervention.user_id).map(UserSummary::from),
            project: projects_map.get(&intervention.project_id).map(ProjectSummary::from),
            intervention,
        })
        .collect())
}

impl InterventionService {
    pub async fn create(
        db: &DatabaseConnection,
        request: CreateInterventionRequest,
    ) -> Result<intervention::Model, AppError> {
        let description = request.description.trim().to_string();
        let request = CreateInterventionRequest { description, ..request };
        request.validate()?;

        ensure_user(db, request.user_id).await?;
        ensure_project(db, request.project_id).await?;

        let now = Utc::now();
        let new_intervention = intervention::ActiveModel {
            user_id: Set(request.user_id),
            project_id: Set(request.project_id),
            description: Set(request.description),
            intervention_type: Set(request.intervention_type.unwrap_or_default()),
            status: Set(request.status.unwrap_or_default()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        Ok(new_intervention.insert(db).await?)
    }

    pub async fn list(
        db: &DatabaseConnection,
        request: &ListRequest,
    ) -> Result<Page<InterventionView>, AppError> {
        let sort = request.sort_column(sort_column)?;
        let condition = request.search.as_deref().map(search_condition);

        let total = joined_query(condition.clone()).count(db).await?;

        let query = joined_query(condition)
            .order_by(sort, listing::order(false))
            .order_by_asc(intervention::Column::Id);
        let interventions = listing::Pagination::apply(request.pagination.as_ref(), query)
            .all(db)
            .await?;

        let views = attach_relations(db, interventions).await?;
        Ok(Page::new(views, total, request.pagination.as_ref()))
    }

    pub async fn get(db: &DatabaseConnection, id: i32) -> Result<InterventionView, AppError> {
        let intervention = intervention::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("Intervention not found"))?;

        let mut views = attach_relations(db, vec![intervention]).await?;
        views
            .pop()
            .ok_or_else(|| AppError::not_found("Intervention not found"))
    }

    pub async fn update(
        db: &DatabaseConnection,
        id: i32,
        request: UpdateInterventionRequest,
    ) -> Result<intervention::Model, AppError> {
        let request = UpdateInterventionRequest {
            description: request.description.map(|d| d.trim().to_string()),
            ..request
        };
        request.validate()?;

        // 1. Références modifiées
        if let Some(user_id) = request.user_id {
            ensure_user(db, user_id).await?;
        }
        if let Some(project_id) = request.project_id {
            ensure_project(db, project_id).await?;
        }

        let existing = intervention::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("Intervention not found"))?;

        // 2. Champs présents uniquement
        let mut active: intervention::ActiveModel = existing.into();
        if let Some(user_id) = request.user_id {
            active.user_id = Set(user_id);
        }
        if let Some(project_id) = request.project_id {
            active.project_id = Set(project_id);
        }
        if let Some(description) = request.description {
            active.description = Set(description);
        }
        if let Some(intervention_type) = request.intervention_type {
            active.intervention_type = Set(intervention_type);
        }
        if let Some(status) = request.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(db).await?)
    }

    pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
        let result = intervention::Entity::delete_by_id(id).exec(db).await?;
        if result.rows_affected == 0 {
            return Err(AppError::not_found("Intervention not found"));
        }
        Ok(())
    }

    pub async fn delete_all(db: &DatabaseConnection) -> Result<u64, AppError> {
        let result = intervention::Entity::delete_many().exec(db).await?;
        log::warn!("Deleted all interventions ({} rows)", result.rows_affected);
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_whitelist_uses_json_names() {
        assert!(matches!(sort_column("type"), Some(intervention::Column::InterventionType)));
        assert!(sort_column("intervention_type").is_none());
    }

    #[test]
    fn test_search_joins_user_and_project() {
        let sql = joined_query(Some(search_condition("Dupont")))
            .build(DbBackend::Postgres)
            .to_string();

        assert!(sql.contains(r#"LEFT JOIN "users""#), "{}", sql);
        assert!(sql.contains(r#"LEFT JOIN "projects""#), "{}", sql);
        assert!(sql.contains(r#"LOWER("users"."last_name") LIKE '%dupont%'"#), "{}", sql);
        assert!(sql.contains(r#"LOWER("projects"."ref_tsk") LIKE '%dupont%'"#), "{}", sql);
        assert!(sql.contains(r#"LOWER("interventions"."description") LIKE '%dupont%'"#), "{}", sql);
    }

    #[test]
    fn test_no_search_means_no_where_clause() {
        let sql = joined_query(None).build(DbBackend::Postgres).to_string();
        assert!(!sql.contains("WHERE"), "{}", sql);
    }
}
