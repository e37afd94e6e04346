pub mod health;
pub mod users;
pub mod projects;
pub mod equipments;
pub mod interventions;

use actix_multipart::form::tempfile::TempFile;
use actix_multipart::form::{MultipartForm, MultipartFormConfig};
use actix_web::web;

use crate::error::AppError;
use crate::models::dto::DeleteAllQuery;
use crate::services::file_store::{self, MAX_UPLOAD_BYTES};
use crate::services::import::sheet::{self, SheetRow};

/// Jeton exigé par les suppressions en masse
pub const DELETE_ALL_TOKEN: &str = "DELETE_ALL";

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .configure(users::user_routes)
            .configure(projects::project_routes)
            .configure(equipments::equipment_routes)
            .configure(interventions::intervention_routes)
    );
}

/// Erreurs des extracteurs (body JSON, query, path, multipart) au format AppError
pub fn configure_extractors(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        AppError::validation(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        AppError::validation(err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _req| {
        AppError::validation(format!("Invalid id: {}", err)).into()
    }))
    .app_data(
        MultipartFormConfig::default()
            .total_limit(MAX_UPLOAD_BYTES)
            .error_handler(|err, _req| AppError::Upload(err.to_string()).into()),
    );
}

pub fn confirm_delete_all(query: &DeleteAllQuery) -> Result<(), AppError> {
    match query.confirm.as_deref() {
        Some(DELETE_ALL_TOKEN) => Ok(()),
        _ => Err(AppError::validation(
            "Confirmation required. Provide ?confirm=DELETE_ALL in the query.",
        )),
    }
}

/// Formulaire des imports: un classeur dans le champ `data`
#[derive(MultipartForm)]
pub struct ImportForm {
    pub data: Option<TempFile>,
}

/// Vérifie et lit le classeur. Le fichier temporaire est supprimé en sortie,
/// succès ou erreur
pub async fn read_workbook(form: ImportForm) -> Result<Vec<SheetRow>, AppError> {
    let upload = form
        .data
        .ok_or_else(|| AppError::Upload("No file uploaded".to_string()))?;
    file_store::check_workbook(&upload)?;

    sheet::read_rows(upload.file.path()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test as atest, App};
    use sea_orm::DatabaseConnection;

    fn app_data() -> web::Data<DatabaseConnection> {
        web::Data::new(DatabaseConnection::Disconnected)
    }

    #[test]
    fn test_confirm_token() {
        assert!(confirm_delete_all(&DeleteAllQuery { confirm: Some("DELETE_ALL".to_string()) }).is_ok());
        assert!(confirm_delete_all(&DeleteAllQuery { confirm: Some("delete_all".to_string()) }).is_err());
        assert!(confirm_delete_all(&DeleteAllQuery::default()).is_err());
    }

    #[actix_web::test]
    async fn test_delete_all_without_confirmation_is_rejected() {
        let app = atest::init_service(
            App::new()
                .app_data(app_data())
                .configure(configure_extractors)
                .configure(configure_routes),
        )
        .await;

        for path in ["/api/equipment/all", "/api/project/all", "/api/intervention/all"] {
            let req = atest::TestRequest::delete().uri(path).to_request();
            let resp = atest::call_service(&app, req).await;
            assert_eq!(resp.status(), 400, "{}", path);

            let body: serde_json::Value = atest::read_body_json(resp).await;
            assert_eq!(body["success"], false);
            assert!(body["message"].as_str().unwrap().contains("DELETE_ALL"));
        }
    }

    #[actix_web::test]
    async fn test_non_numeric_id_is_validation_error() {
        let app = atest::init_service(
            App::new()
                .app_data(app_data())
                .configure(configure_extractors)
                .configure(configure_routes),
        )
        .await;

        let req = atest::TestRequest::get().uri("/api/project/abc").to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }
}
