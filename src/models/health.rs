use serde::Serialize;
use chrono::{DateTime, Utc};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub time: DateTime<Utc>,
}

impl HealthResponse {
    pub fn new(database: bool) -> Self {
        Self {
            status: if database { "ok" } else { "degraded" },
            database,
            time: Utc::now(),
        }
    }
}
