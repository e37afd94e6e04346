pub mod listing;
pub mod project_links;
pub mod file_store;
pub mod notifier;
pub mod import;

pub mod project_service;
pub mod equipment_service;
pub mod user_service;
pub mod intervention_service;
