// Requêtes JSON et vues retournées par l'API
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::models::intervention::{InterventionStatus, InterventionType};
use crate::models::project::ProjectStatus;
use crate::models::{equipment, intervention, project, users};

// ----------------------------------------------------------------------------
// Helpers serde
// ----------------------------------------------------------------------------

/// Distingue un champ absent (None) d'un champ à null (Some(None))
/// Utilisé par `project` dans la mise à jour d'un équipement
fn deserialize_some<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

fn trim(value: String) -> String {
    value.trim().to_string()
}

fn trim_opt(value: Option<String>) -> Option<String> {
    value.map(trim)
}

// ----------------------------------------------------------------------------
// Query strings
// ----------------------------------------------------------------------------

/// Paramètres communs des listes: ?page=&limit=&sort=&search=
/// page/limit restent en texte pour produire nos propres erreurs de validation
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub sort: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteAllQuery {
    pub confirm: Option<String>,
}

// ----------------------------------------------------------------------------
// Projets
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, message = "Code is required"))]
    pub code: String,
    #[validate(length(min = 1, message = "Customer Material Number is required"))]
    pub cmn: String,
    #[serde(rename = "refTSK")]
    #[validate(length(min = 1, message = "Ref TSK is required"))]
    pub ref_tsk: String,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub qte: i32,
    #[validate(length(min = 1, message = "Pin is required"))]
    pub pin: String,
    pub sap1: Option<String>,
    pub sap2: Option<String>,
    #[validate(length(min = 1, message = "Ref Switcheur is required"))]
    pub ref_s: String,
    pub status: Option<ProjectStatus>,
}

impl CreateProjectRequest {
    pub fn trimmed(self) -> Self {
        Self {
            code: trim(self.code),
            cmn: trim(self.cmn),
            ref_tsk: trim(self.ref_tsk),
            pin: trim(self.pin),
            sap1: trim_opt(self.sap1).filter(|s| !s.is_empty()),
            sap2: trim_opt(self.sap2).filter(|s| !s.is_empty()),
            ref_s: trim(self.ref_s),
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, message = "Code is required"))]
    pub code: Option<String>,
    #[validate(length(min = 1, message = "Customer Material Number is required"))]
    pub cmn: Option<String>,
    #[serde(rename = "refTSK")]
    #[validate(length(min = 1, message = "Ref TSK is required"))]
    pub ref_tsk: Option<String>,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub qte: Option<i32>,
    #[validate(length(min = 1, message = "Pin is required"))]
    pub pin: Option<String>,
    pub sap1: Option<String>,
    pub sap2: Option<String>,
    #[validate(length(min = 1, message = "Ref Switcheur is required"))]
    pub ref_s: Option<String>,
    pub status: Option<ProjectStatus>,
}

impl UpdateProjectRequest {
    pub fn trimmed(self) -> Self {
        Self {
            code: trim_opt(self.code),
            cmn: trim_opt(self.cmn),
            ref_tsk: trim_opt(self.ref_tsk),
            pin: trim_opt(self.pin),
            sap1: trim_opt(self.sap1),
            sap2: trim_opt(self.sap2),
            ref_s: trim_opt(self.ref_s),
            ..self
        }
    }
}

/// Projet avec ses équipements peuplés (GET /project/{id})
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    pub id: i32,
    pub code: String,
    pub cmn: String,
    #[serde(rename = "refTSK")]
    pub ref_tsk: String,
    pub qte: i32,
    pub pin: String,
    pub sap1: Option<String>,
    pub sap2: Option<String>,
    pub ref_s: String,
    pub status: ProjectStatus,
    pub equipments: Vec<equipment::Model>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl ProjectDetail {
    /// Conserve l'ordre du tableau `equipments` du projet
    pub fn new(project: project::Model, mut loaded: Vec<equipment::Model>) -> Self {
        let mut equipments = Vec::with_capacity(project.equipments.len());
        for id in &project.equipments {
            if let Some(pos) = loaded.iter().position(|e| e.id == *id) {
                equipments.push(loaded.swap_remove(pos));
            }
        }

        Self {
            id: project.id,
            code: project.code,
            cmn: project.cmn,
            ref_tsk: project.ref_tsk,
            qte: project.qte,
            pin: project.pin,
            sap1: project.sap1,
            sap2: project.sap2,
            ref_s: project.ref_s,
            status: project.status,
            equipments,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: i32,
    pub code: String,
    pub cmn: String,
    #[serde(rename = "refTSK")]
    pub ref_tsk: String,
}

impl From<&project::Model> for ProjectSummary {
    fn from(p: &project::Model) -> Self {
        Self {
            id: p.id,
            code: p.code.clone(),
            cmn: p.cmn.clone(),
            ref_tsk: p.ref_tsk.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Équipements
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEquipmentRequest {
    pub project: Option<i32>,
    pub number: i32,
    #[validate(length(min = 1, message = "Table Number is required"))]
    pub table_number: String,
    #[validate(length(min = 1, message = "Asset Number is required"))]
    pub asset_number: String,
    #[validate(length(min = 1, message = "Module is required"))]
    pub module: String,
    #[validate(length(min = 1, message = "Size is required"))]
    pub size: String,
    #[validate(length(min = 1, message = "Version WIN is required"))]
    pub version_win: String,
    #[validate(length(min = 1, message = "Version CSWIN is required"))]
    pub version_cswin: String,
    #[validate(length(min = 1, message = "Version Dongle is required"))]
    pub version_dongle: String,
    #[validate(length(min = 1, message = "Nom PC is required"))]
    pub nom_pc: String,
}

impl CreateEquipmentRequest {
    pub fn trimmed(self) -> Self {
        Self {
            table_number: trim(self.table_number),
            asset_number: trim(self.asset_number),
            module: trim(self.module),
            size: trim(self.size),
            version_win: trim(self.version_win),
            version_cswin: trim(self.version_cswin),
            version_dongle: trim(self.version_dongle),
            nom_pc: trim(self.nom_pc),
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEquipmentRequest {
    // absent = inchangé, null = désaffecter, id = réaffecter
    #[serde(default, deserialize_with = "deserialize_some")]
    pub project: Option<Option<i32>>,
    pub number: Option<i32>,
    #[validate(length(min = 1, message = "Table Number is required"))]
    pub table_number: Option<String>,
    #[validate(length(min = 1, message = "Asset Number is required"))]
    pub asset_number: Option<String>,
    #[validate(length(min = 1, message = "Module is required"))]
    pub module: Option<String>,
    #[validate(length(min = 1, message = "Size is required"))]
    pub size: Option<String>,
    #[validate(length(min = 1, message = "Version WIN is required"))]
    pub version_win: Option<String>,
    #[validate(length(min = 1, message = "Version CSWIN is required"))]
    pub version_cswin: Option<String>,
    #[validate(length(min = 1, message = "Version Dongle is required"))]
    pub version_dongle: Option<String>,
    #[validate(length(min = 1, message = "Nom PC is required"))]
    pub nom_pc: Option<String>,
}

impl UpdateEquipmentRequest {
    pub fn trimmed(self) -> Self {
        Self {
            table_number: trim_opt(self.table_number),
            asset_number: trim_opt(self.asset_number),
            module: trim_opt(self.module),
            size: trim_opt(self.size),
            version_win: trim_opt(self.version_win),
            version_cswin: trim_opt(self.version_cswin),
            version_dongle: trim_opt(self.version_dongle),
            nom_pc: trim_opt(self.nom_pc),
            ..self
        }
    }
}

/// Équipement avec son projet joint (null si non affecté ou projet supprimé)
#[derive(Debug, Serialize)]
pub struct EquipmentView {
    #[serde(flatten)]
    pub equipment: equipment::Model,
    #[serde(rename = "projectDetails")]
    pub project_details: Option<project::Model>,
}

// ----------------------------------------------------------------------------
// Utilisateurs
// ----------------------------------------------------------------------------

/// Champs d'un utilisateur à créer, déjà extraits du formulaire multipart
/// (ou d'une ligne d'import)
#[derive(Debug, Clone, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 2, max = 50, message = "First name must be between 2 and 50 characters"))]
    pub first_name: String,
    #[validate(length(min = 2, max = 50, message = "Last name must be between 2 and 50 characters"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "Code is required"))]
    pub code: String,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    // None => mot de passe généré
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
    pub post_hr: Option<String>,
    pub post: users::Post,
    pub affectation: Option<users::Affectation>,
    pub dept: Option<users::Dept>,
    pub project_id: Option<i32>,
    pub role: Option<users::Role>,
    pub active: Option<bool>,
}

impl CreateUserRequest {
    pub fn trimmed(self) -> Self {
        Self {
            first_name: trim(self.first_name),
            last_name: trim(self.last_name),
            code: trim(self.code),
            email: trim(self.email).to_lowercase(),
            post_hr: trim_opt(self.post_hr).filter(|s| !s.is_empty()),
            ..self
        }
    }
}

#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, max = 50, message = "First name must be between 2 and 50 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 2, max = 50, message = "Last name must be between 2 and 50 characters"))]
    pub last_name: Option<String>,
    #[validate(length(min = 1, message = "Code is required"))]
    pub code: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
    pub post_hr: Option<String>,
    pub post: Option<users::Post>,
    pub affectation: Option<users::Affectation>,
    pub dept: Option<users::Dept>,
    // absent = inchangé, Some(None) = désaffecter, Some(Some(id)) = réaffecter
    pub project_id: Option<Option<i32>>,
    pub role: Option<users::Role>,
    pub active: Option<bool>,
}

impl UpdateUserRequest {
    pub fn trimmed(self) -> Self {
        Self {
            first_name: trim_opt(self.first_name),
            last_name: trim_opt(self.last_name),
            code: trim_opt(self.code),
            email: trim_opt(self.email).map(|e| e.to_lowercase()),
            post_hr: trim_opt(self.post_hr),
            ..self
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    #[serde(flatten)]
    pub user: users::Model,
    #[serde(rename = "projectDetails")]
    pub project_details: Option<project::Model>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: users::Model,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub code: String,
    pub email: String,
    pub post: users::Post,
}

impl From<&users::Model> for UserSummary {
    fn from(u: &users::Model) -> Self {
        Self {
            id: u.id,
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            code: u.code.clone(),
            email: u.email.clone(),
            post: u.post,
        }
    }
}

// ----------------------------------------------------------------------------
// Interventions
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateInterventionRequest {
    pub user_id: i32,
    pub project_id: i32,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[serde(rename = "type")]
    pub intervention_type: Option<InterventionType>,
    pub status: Option<InterventionStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInterventionRequest {
    pub user_id: Option<i32>,
    pub project_id: Option<i32>,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub intervention_type: Option<InterventionType>,
    pub status: Option<InterventionStatus>,
}

#[derive(Debug, Serialize)]
pub struct InterventionView {
    #[serde(flatten)]
    pub intervention: intervention::Model,
    pub user: Option<UserSummary>,
    pub project: Option<ProjectSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equipment_update_distinguishes_null_and_absent() {
        let absent: UpdateEquipmentRequest = serde_json::from_str(r#"{"module": "M1"}"#).unwrap();
        assert_eq!(absent.project, None);

        let cleared: UpdateEquipmentRequest = serde_json::from_str(r#"{"project": null}"#).unwrap();
        assert_eq!(cleared.project, Some(None));

        let moved: UpdateEquipmentRequest = serde_json::from_str(r#"{"project": 7}"#).unwrap();
        assert_eq!(moved.project, Some(Some(7)));
    }

    #[test]
    fn test_create_project_trimmed_then_validated() {
        let request: CreateProjectRequest = serde_json::from_str(
            r#"{"code": "  P1 ", "cmn": "C", "refTSK": "T", "qte": 5, "pin": " ", "sap1": "", "refS": "S"}"#,
        )
        .unwrap();
        let request = request.trimmed();

        assert_eq!(request.code, "P1");
        assert_eq!(request.sap1, None);
        // pin vide après trim => requis
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let request: CreateProjectRequest = serde_json::from_str(
            r#"{"code": "P1", "cmn": "C", "refTSK": "T", "qte": -1, "pin": "P", "refS": "S"}"#,
        )
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_invalid_intervention_type_rejected_by_serde() {
        let result: Result<CreateInterventionRequest, _> = serde_json::from_str(
            r#"{"userId": 1, "projectId": 2, "description": "x", "type": "painting"}"#,
        );
        assert!(result.is_err());
    }
}
