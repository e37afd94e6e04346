// connexion BD

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr};

const INIT_SCHEMA: &str = include_str!("../migrations/001_init.sql");

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Crée les tables si elles n'existent pas encore (script idempotent)
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute_unprepared(INIT_SCHEMA).await?;
    log::info!("Database schema is up to date");
    Ok(())
}
