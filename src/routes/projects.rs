use actix_multipart::form::MultipartForm;
use actix_web::{delete, get, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;

use crate::error::AppError;
use crate::models::dto::{CreateProjectRequest, DeleteAllQuery, ListQuery, UpdateProjectRequest};
use crate::routes::{confirm_delete_all, read_workbook, ImportForm};
use crate::services::import::{reconcile, targets::ProjectTarget};
use crate::services::listing::ListRequest;
use crate::services::project_service::ProjectService;

/// POST /project et /project/add
async fn create_project(
    body: web::Json<CreateProjectRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let project = ProjectService::create(db.get_ref(), body.into_inner()).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "data": project,
        "message": "Project created successfully"
    })))
}

#[get("")]
pub async fn list_projects(
    query: web::Query<ListQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let request = ListRequest::from_query(&query)?;
    let page = ProjectService::list(db.get_ref(), &request).await?;
    Ok(HttpResponse::Ok().json(page))
}

/// GET /project/{id} - Projet avec ses équipements
#[get("/{id}")]
pub async fn get_project(
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let project = ProjectService::get_detail(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": project
    })))
}

#[put("/{id}")]
pub async fn update_project(
    path: web::Path<i32>,
    body: web::Json<UpdateProjectRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let project = ProjectService::update(db.get_ref(), path.into_inner(), body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": project,
        "message": "Project updated successfully"
    })))
}

#[delete("/one/{id}")]
pub async fn delete_project(
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    ProjectService::delete(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Project deleted successfully"
    })))
}

#[delete("/all")]
pub async fn delete_all_projects(
    query: web::Query<DeleteAllQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    confirm_delete_all(&query)?;

    let deleted = ProjectService::delete_all(db.get_ref()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": { "deletedCount": deleted },
        "message": format!("Successfully deleted {} projects", deleted)
    })))
}

#[post("/import")]
pub async fn import_projects(
    MultipartForm(form): MultipartForm<ImportForm>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let rows = read_workbook(form).await?;

    let target = ProjectTarget { db: db.get_ref() };
    let report = reconcile(&target, rows).await;
    let imported = report.imported.len();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": report.into_data("projects"),
        "message": format!("Imported {} projects successfully", imported)
    })))
}

pub fn project_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/project")
            .route("", web::post().to(create_project))
            .route("/add", web::post().to(create_project))
            .service(import_projects)
            .service(delete_all_projects)
            .service(delete_project)
            .service(list_projects)
            .service(get_project)
            .service(update_project)
    );
}
