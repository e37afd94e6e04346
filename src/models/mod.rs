// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque modèle correspond à une table PostgreSQL avec SeaORM.
//
// Liste des modules:
//   - health : Health check API
//   - users : Personnel (auth + fiche RH)
//   - project : Projets clients, avec le tableau des équipements affectés
//   - equipment : Bancs de test (clé métier: asset_number)
//   - intervention : Interventions de maintenance (user + projet)
//   - dto : Requêtes et vues retournées par l'API
//
// Points d'attention:
//   - Les enums sont stockés en VARCHAR (DeriveActiveEnum, rs_type String)
//   - Les références entre tables sont "faibles": pas de FK en base
//     (voir migrations/001_init.sql), l'intégrité est vérifiée par les services
//
// ============================================================================

pub mod health;
pub mod users;
pub mod project;
pub mod equipment;
pub mod intervention;
pub mod dto;

use sea_orm::{ActiveEnum, Iterable};

use crate::error::AppError;

/// Parse une valeur d'enum depuis sa représentation texte (import Excel, formulaires)
/// Le message liste les valeurs acceptées
pub fn parse_enum<E>(field: &str, raw: &str) -> Result<E, AppError>
where
    E: ActiveEnum<Value = String> + Iterable,
{
    let raw = raw.trim().to_string();
    E::try_from_value(&raw).map_err(|_| {
        let allowed: Vec<String> = E::iter().map(|v| v.to_value()).collect();
        AppError::validation(format!(
            "{} is not a valid {} (expected one of: {})",
            raw,
            field,
            allowed.join(", ")
        ))
    })
}
