use actix_web::{get, web, HttpResponse};
use sea_orm::DatabaseConnection;

use crate::models::health::HealthResponse;

/// GET /health - Liveness: le serveur répond, la BD est signalée à part
#[get("/health")]
pub async fn health_check(db: web::Data<DatabaseConnection>) -> HttpResponse {
    let database = match db.ping().await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Health check: database unreachable: {}", e);
            false
        }
    };

    HttpResponse::Ok().json(HealthResponse::new(database))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_health_reports_unreachable_database() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(DatabaseConnection::Disconnected))
                .service(health_check),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["database"], false);
    }
}
