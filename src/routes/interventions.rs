use actix_multipart::form::MultipartForm;
use actix_web::{delete, get, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;

use crate::error::AppError;
use crate::models::dto::{
    CreateInterventionRequest, DeleteAllQuery, ListQuery, UpdateInterventionRequest,
};
use crate::routes::{confirm_delete_all, read_workbook, ImportForm};
use crate::services::import::{reconcile, targets::InterventionTarget};
use crate::services::intervention_service::InterventionService;
use crate::services::listing::ListRequest;

#[post("")]
pub async fn create_intervention(
    body: web::Json<CreateInterventionRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let intervention = InterventionService::create(db.get_ref(), body.into_inner()).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "data": intervention,
        "message": "Intervention created successfully"
    })))
}

/// GET /intervention - user et projet résumés joints
#[get("")]
pub async fn list_interventions(
    query: web::Query<ListQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let request = ListRequest::from_query(&query)?;
    let page = InterventionService::list(db.get_ref(), &request).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[get("/{id}")]
pub async fn get_intervention(
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let intervention = InterventionService::get(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": intervention
    })))
}

#[put("/{id}")]
pub async fn update_intervention(
    path: web::Path<i32>,
    body: web::Json<UpdateInterventionRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let intervention =
        InterventionService::update(db.get_ref(), path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": intervention,
        "message": "Intervention updated successfully"
    })))
}

#[delete("/one/{id}")]
pub async fn delete_intervention(
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    InterventionService::delete(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Intervention deleted successfully"
    })))
}

#[delete("/all")]
pub async fn delete_all_interventions(
    query: web::Query<DeleteAllQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    confirm_delete_all(&query)?;

    let deleted = InterventionService::delete_all(db.get_ref()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": { "deletedCount": deleted },
        "message": format!("Successfully deleted {} interventions", deleted)
    })))
}

#[post("/import")]
pub async fn import_interventions(
    MultipartForm(form): MultipartForm<ImportForm>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let rows = read_workbook(form).await?;

    let target = InterventionTarget::load(db.get_ref()).await?;
    let report = reconcile(&target, rows).await;
    let imported = report.imported.len();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": report.into_data("interventions"),
        "message": format!("Imported {} interventions successfully", imported)
    })))
}

pub fn intervention_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/intervention")
            .service(create_intervention)
            .service(import_interventions)
            .service(delete_all_interventions)
            .service(delete_intervention)
            .service(list_interventions)
            .service(get_intervention)
            .service(update_intervention)
    );
}
