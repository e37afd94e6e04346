use actix_multipart::form::MultipartForm;
use actix_web::{delete, get, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;

use crate::error::AppError;
use crate::models::dto::{CreateEquipmentRequest, DeleteAllQuery, ListQuery, UpdateEquipmentRequest};
use crate::routes::{confirm_delete_all, read_workbook, ImportForm};
use crate::services::equipment_service::EquipmentService;
use crate::services::import::{reconcile, targets::EquipmentTarget};
use crate::services::listing::ListRequest;

/// POST /equipment et /equipment/add
async fn create_equipment(
    body: web::Json<CreateEquipmentRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let equipment = EquipmentService::create(db.get_ref(), body.into_inner()).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "data": equipment,
        "message": "Equipment created successfully"
    })))
}

#[get("")]
pub async fn list_equipments(
    query: web::Query<ListQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let request = ListRequest::from_query(&query)?;
    let page = EquipmentService::list(db.get_ref(), &request).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[get("/{id}")]
pub async fn get_equipment(
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let equipment = EquipmentService::get(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": equipment
    })))
}

/// PUT /equipment/{id} - `project` absent: inchangé, null: désaffecté, id: réaffecté
#[put("/{id}")]
pub async fn update_equipment(
    path: web::Path<i32>,
    body: web::Json<UpdateEquipmentRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let equipment = EquipmentService::update(db.get_ref(), path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": equipment,
        "message": "Equipment updated successfully"
    })))
}

#[delete("/one/{id}")]
pub async fn delete_equipment(
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    EquipmentService::delete(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Equipment deleted successfully"
    })))
}

#[delete("/all")]
pub async fn delete_all_equipments(
    query: web::Query<DeleteAllQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    confirm_delete_all(&query)?;

    let deleted = EquipmentService::delete_all(db.get_ref()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": { "deletedCount": deleted },
        "message": format!("Successfully deleted {} equipments", deleted)
    })))
}

#[post("/import")]
pub async fn import_equipments(
    MultipartForm(form): MultipartForm<ImportForm>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let rows = read_workbook(form).await?;

    // Codes projet résolus une seule fois pour tout le fichier
    let target = EquipmentTarget::load(db.get_ref()).await?;
    let report = reconcile(&target, rows).await;
    let imported = report.imported.len();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": report.into_data("equipments"),
        "message": format!("Imported {} equipments successfully", imported)
    })))
}

pub fn equipment_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/equipment")
            .route("", web::post().to(create_equipment))
            .route("/add", web::post().to(create_equipment))
            .service(import_equipments)
            .service(delete_all_equipments)
            .service(delete_equipment)
            .service(list_equipments)
            .service(get_equipment)
            .service(update_equipment)
    );
}
