use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use validator::Validate;

use super::layout::{
    Layout, Record, EQUIPMENT_LAYOUT, INTERVENTION_LAYOUT, PROJECT_LAYOUT, USER_LAYOUT,
};
use super::{ImportTarget, Persisted};
use crate::error::AppError;
use crate::models::dto::{CreateEquipmentRequest, CreateInterventionRequest, CreateProjectRequest, CreateUserRequest};
use crate::models::intervention::{InterventionStatus, InterventionType};
use crate::models::parse_enum;
use crate::models::users::{Affectation, Dept, Post, Role};
use crate::services::equipment_service::EquipmentService;
use crate::services::intervention_service::InterventionService;
use crate::services::notifier::Notifier;
use crate::services::project_service::ProjectService;
use crate::services::user_service::UserService;

// ----------------------------------------------------------------------------
// Projets
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ImportedProject {
    pub code: String,
    pub cmn: String,
    #[serde(rename = "refTSK")]
    pub ref_tsk: String,
}

pub struct ProjectTarget<'a> {
    pub db: &'a DatabaseConnection,
}

#[async_trait]
impl ImportTarget for ProjectTarget<'_> {
    type Row = CreateProjectRequest;
    type Summary = ImportedProject;

    fn entity(&self) -> &'static str {
        "project"
    }

    fn layout(&self) -> &'static Layout {
        &PROJECT_LAYOUT
    }

    fn build(&self, record: &Record) -> Result<Self::Row, AppError> {
        let request = CreateProjectRequest {
            code: record.text("code")?,
            cmn: record.text("cmn")?,
            ref_tsk: record.text("refTSK")?,
            qte: record.integer("qte")?,
            pin: record.text("pin")?,
            sap1: record.optional("sap1"),
            sap2: record.optional("sap2"),
            ref_s: record.text("refS")?,
            status: None,
        }
        .trimmed();
        request.validate()?;
        Ok(request)
    }

    async fn duplicate(&self, row: &Self::Row) -> Result<Option<String>, AppError> {
        let exists = ProjectService::exists_with_code(self.db, &row.code).await?;
        Ok(exists.then(|| format!("Project with code {} already exists", row.code)))
    }

    async fn persist(&self, row: Self::Row) -> Result<Persisted<Self::Summary>, AppError> {
        let project = ProjectService::create(self.db, row).await?;
        Ok(Persisted::done(ImportedProject {
            code: project.code,
            cmn: project.cmn,
            ref_tsk: project.ref_tsk,
        }))
    }
}

// ----------------------------------------------------------------------------
// Équipements
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedEquipment {
    pub asset_number: String,
    pub project: Option<i32>,
    pub module: String,
}

pub struct EquipmentTarget<'a> {
    pub db: &'a DatabaseConnection,
    /// code projet -> id, chargé une fois avant la boucle
    pub projects: HashMap<String, i32>,
}

impl<'a> EquipmentTarget<'a> {
    pub async fn load(db: &'a DatabaseConnection) -> Result<Self, AppError> {
        Ok(Self {
            db,
            projects: ProjectService::code_map(db).await?,
        })
    }
}

#[async_trait]
impl ImportTarget for EquipmentTarget<'_> {
    type Row = CreateEquipmentRequest;
    type Summary = ImportedEquipment;

    fn entity(&self) -> &'static str {
        "equipment"
    }

    fn layout(&self) -> &'static Layout {
        &EQUIPMENT_LAYOUT
    }

    fn build(&self, record: &Record) -> Result<Self::Row, AppError> {
        // Code projet inconnu => équipement non affecté
        let project = record
            .optional("projectCode")
            .and_then(|code| self.projects.get(&code).copied());

        let request = CreateEquipmentRequest {
            project,
            number: record.integer("number")?,
            table_number: record.text("tableNumber")?,
            asset_number: record.text("assetNumber")?,
            module: record.text("module")?,
            size: record.text("size")?,
            version_win: record.text("versionWin")?,
            version_cswin: record.text("versionCswin")?,
            version_dongle: record.text("versionDongle")?,
            nom_pc: record.text("nomPc")?,
        }
        .trimmed();
        request.validate()?;
        Ok(request)
    }

    async fn duplicate(&self, row: &Self::Row) -> Result<Option<String>, AppError> {
        let exists = EquipmentService::exists_with_asset_number(self.db, &row.asset_number).await?;
        Ok(exists.then(|| format!("Equipment with asset number {} already exists", row.asset_number)))
    }

    async fn persist(&self, row: Self::Row) -> Result<Persisted<Self::Summary>, AppError> {
        let equipment = EquipmentService::create(self.db, row).await?;
        Ok(Persisted::done(ImportedEquipment {
            asset_number: equipment.asset_number,
            project: equipment.project_id,
            module: equipment.module,
        }))
    }
}

// ----------------------------------------------------------------------------
// Utilisateurs
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedUser {
    pub code: String,
    pub first_name: String,
    pub last_name: String,
}

pub struct UserTarget<'a> {
    pub db: &'a DatabaseConnection,
    pub notifier: &'a dyn Notifier,
}

#[async_trait]
impl ImportTarget for UserTarget<'_> {
    type Row = CreateUserRequest;
    type Summary = ImportedUser;

    fn entity(&self) -> &'static str {
        "user"
    }

    fn layout(&self) -> &'static Layout {
        &USER_LAYOUT
    }

    fn build(&self, record: &Record) -> Result<Self::Row, AppError> {
        let request = CreateUserRequest {
            first_name: record.text("firstName")?,
            last_name: record.text("lastName")?,
            code: record.text("code")?,
            email: record.text("email")?,
            password: None,
            post_hr: record.optional("post_hr"),
            post: parse_enum::<Post>("post", &record.text("post")?)?,
            affectation: Some(parse_enum::<Affectation>("affectation", &record.text("affectation")?)?),
            dept: Some(parse_enum::<Dept>("dept", &record.text("dept")?)?),
            project_id: None,
            role: Some(Role::User),
            active: Some(true),
        }
        .trimmed();
        request.validate()?;
        Ok(request)
    }

    async fn duplicate(&self, row: &Self::Row) -> Result<Option<String>, AppError> {
        let exists = UserService::exists_with_code(self.db, &row.code).await?;
        Ok(exists.then(|| {
            format!(
                "User with code {} ({} {}) already exists",
                row.code, row.first_name, row.last_name
            )
        }))
    }

    async fn persist(&self, row: Self::Row) -> Result<Persisted<Self::Summary>, AppError> {
        let created = UserService::create(self.db, row, None).await?;
        let follow_up = UserService::notify_created(self.notifier, &created).await;

        Ok(Persisted {
            summary: ImportedUser {
                code: created.user.code,
                first_name: created.user.first_name,
                last_name: created.user.last_name,
            },
            follow_up,
        })
    }
}

// ----------------------------------------------------------------------------
// Interventions
// ----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedIntervention {
    pub id: i32,
    pub description: String,
    pub user_code: String,
    pub project_code: String,
}

pub struct InterventionRow {
    pub request: CreateInterventionRequest,
    pub user_code: String,
    pub project_code: String,
}

pub struct InterventionTarget<'a> {
    pub db: &'a DatabaseConnection,
    pub users: HashMap<String, i32>,
    pub projects: HashMap<String, i32>,
}

impl<'a> InterventionTarget<'a> {
    pub async fn load(db: &'a DatabaseConnection) -> Result<Self, AppError> {
        Ok(Self {
            db,
            users: UserService::code_map(db).await?,
            projects: ProjectService::code_map(db).await?,
        })
    }
}

/// Code inconnu => erreur de ligne (contrairement aux équipements)
fn resolve(map: &HashMap<String, i32>, kind: &str, code: &str) -> Result<i32, AppError> {
    map.get(code)
        .copied()
        .ok_or_else(|| AppError::not_found(format!("Unknown {} code {}", kind, code)))
}

#[async_trait]
impl ImportTarget for InterventionTarget<'_> {
    type Row = InterventionRow;
    type Summary = ImportedIntervention;

    fn entity(&self) -> &'static str {
        "intervention"
    }

    fn layout(&self) -> &'static Layout {
        &INTERVENTION_LAYOUT
    }

    fn build(&self, record: &Record) -> Result<Self::Row, AppError> {
        let user_code = record.text("userCode")?;
        let project_code = record.text("projectCode")?;

        let request = CreateInterventionRequest {
            user_id: resolve(&self.users, "user", &user_code)?,
            project_id: resolve(&self.projects, "project", &project_code)?,
            description: record.text("description")?,
            intervention_type: Some(parse_enum::<InterventionType>("type", &record.text("type")?)?),
            status: Some(parse_enum::<InterventionStatus>("status", &record.text("status")?)?),
        };
        request.validate()?;

        Ok(InterventionRow {
            request,
            user_code,
            project_code,
        })
    }

    // Pas de clé métier: chaque ligne crée une intervention
    async fn duplicate(&self, _row: &Self::Row) -> Result<Option<String>, AppError> {
        Ok(None)
    }

    async fn persist(&self, row: Self::Row) -> Result<Persisted<Self::Summary>, AppError> {
        let intervention = InterventionService::create(self.db, row.request).await?;
        Ok(Persisted::done(ImportedIntervention {
            id: intervention.id,
            description: intervention.description,
            user_code: row.user_code,
            project_code: row.project_code,
        }))
    }
}
