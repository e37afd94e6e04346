// ============================================================================
// MODÈLE : PROJECTS
// ============================================================================
//
// Colonnes de la table projects:
//   - id (SERIAL, PRIMARY KEY)
//   - code (VARCHAR, UNIQUE) - clé métier
//   - cmn, ref_tsk, pin, ref_s (VARCHAR, NOT NULL)
//   - qte (INTEGER >= 0)
//   - sap1, sap2 (VARCHAR, NULL)
//   - status (VARCHAR) - planned / ongoing / completed / on-hold
//   - equipments (INTEGER[]) - ids des équipements, dans l'ordre d'ajout
//   - created_at, updated_at (TIMESTAMPTZ)
//
// Points d'attention:
//   - equipments n'est PAS une clé étrangère: le tableau est maintenu à la
//     main par services::project_links (cohérence avec equipments.project_id)
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum ProjectStatus {
    #[default]
    #[sea_orm(string_value = "planned")]
    #[serde(rename = "planned")]
    Planned,
    #[sea_orm(string_value = "ongoing")]
    #[serde(rename = "ongoing")]
    Ongoing,
    #[sea_orm(string_value = "completed")]
    #[serde(rename = "completed")]
    Completed,
    #[sea_orm(string_value = "on-hold")]
    #[serde(rename = "on-hold")]
    OnHold,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub code: String,
    pub cmn: String,
    #[serde(rename = "refTSK")]
    pub ref_tsk: String,
    pub qte: i32,
    pub pin: String,
    pub sap1: Option<String>,
    pub sap2: Option<String>,
    pub ref_s: String,
    pub status: ProjectStatus,
    pub equipments: Vec<i32>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::equipment::Entity")]
    Equipment,

    #[sea_orm(has_many = "super::intervention::Entity")]
    Intervention,

    #[sea_orm(has_many = "super::users::Entity")]
    Users,
}

impl Related<super::equipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Equipment.def()
    }
}

impl Related<super::intervention::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Intervention.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
