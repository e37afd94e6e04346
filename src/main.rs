mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod services;
mod utils;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};

use crate::config::Config;
use crate::services::file_store::FileStore;
use crate::services::notifier::{LogNotifier, Notifier, SmtpNotifier};

fn build_notifier(config: &Config) -> std::io::Result<Arc<dyn Notifier>> {
    match &config.smtp {
        Some(smtp) => {
            let notifier = SmtpNotifier::new(smtp, &config.app_url)
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            log::info!("Account emails sent through {}", smtp.host);
            Ok(Arc::new(notifier))
        }
        None => {
            log::warn!("SMTP not configured, account emails will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(|e| std::io::Error::other(e.to_string()))?;

    log::info!("Connecting to database...");
    let db = db::establish_connection(&config.database_url)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to connect to database: {}", e)))?;
    db::run_migrations(&db)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to apply schema: {}", e)))?;
    log::info!("Database connected");

    let store = FileStore::new(&config.upload_dir);
    tokio::fs::create_dir_all(store.images_dir()).await?;

    let notifier = web::Data::from(build_notifier(&config)?);
    let bind = (config.host.clone(), config.port);
    let db = web::Data::new(db);
    let store = web::Data::new(store);
    let config = web::Data::new(config);

    log::info!("Starting server on http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(db.clone())
            .app_data(store.clone())
            .app_data(notifier.clone())
            .app_data(config.clone())
            .configure(routes::configure_extractors)
            .configure(routes::configure_routes)
    })
        .bind(bind)?
        .run()
        .await
}
