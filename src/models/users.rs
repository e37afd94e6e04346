use serde::{Serialize, Deserialize};
use sea_orm::entity::prelude::*;

/// Photo par défaut, jamais supprimée du disque
pub const DEFAULT_PICTURE: &str = "avatar.png";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum Affectation {
    #[sea_orm(string_value = "Administration")]
    Administration,
    #[default]
    #[sea_orm(string_value = "Indirect")]
    Indirect,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum Dept {
    #[default]
    #[sea_orm(string_value = "PPE")]
    #[serde(rename = "PPE")]
    Ppe,
    #[sea_orm(string_value = "CPE")]
    #[serde(rename = "CPE")]
    Cpe,
    #[sea_orm(string_value = "Qualite")]
    Qualite,
}

// Intitulés de poste tels qu'ils apparaissent dans la feuille RH
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(60))")]
pub enum Post {
    #[sea_orm(string_value = "Superviseur shift test system")]
    #[serde(rename = "Superviseur shift test system")]
    SuperviseurShiftTestSystem,
    #[sea_orm(string_value = "Agent Prototype")]
    #[serde(rename = "Agent Prototype")]
    AgentPrototype,
    #[sea_orm(string_value = "Ingénieur Product")]
    #[serde(rename = "Ingénieur Product")]
    IngenieurProduct,
    #[sea_orm(string_value = "Ingénieur Test")]
    #[serde(rename = "Ingénieur Test")]
    IngenieurTest,
    #[sea_orm(string_value = "Ingénieur Qualité")]
    #[serde(rename = "Ingénieur Qualité")]
    IngenieurQualite,
    #[sea_orm(string_value = "Technicien Test")]
    #[serde(rename = "Technicien Test")]
    TechnicienTest,
    #[sea_orm(string_value = "Technicien Qualité")]
    #[serde(rename = "Technicien Qualité")]
    TechnicienQualite,
    #[sea_orm(string_value = "Technicien Prototype")]
    #[serde(rename = "Technicien Prototype")]
    TechnicienPrototype,
    #[sea_orm(string_value = "Technicien process Equipements")]
    #[serde(rename = "Technicien process Equipements")]
    TechnicienProcessEquipements,
    #[sea_orm(string_value = "Technicien process Test")]
    #[serde(rename = "Technicien process Test")]
    TechnicienProcessTest,
    #[sea_orm(string_value = "Technicien process Qualité")]
    #[serde(rename = "Technicien process Qualité")]
    TechnicienProcessQualite,
    #[sea_orm(string_value = "Technicien process Prototype")]
    #[serde(rename = "Technicien process Prototype")]
    TechnicienProcessPrototype,
    #[sea_orm(string_value = "Technicien process Autres")]
    #[serde(rename = "Technicien process Autres")]
    TechnicienProcessAutres,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    #[sea_orm(unique)]
    pub code: String,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(rename = "post_hr")]
    pub post_hr: String,
    pub post: Post,
    pub affectation: Affectation,
    pub dept: Dept,
    pub project_id: Option<i32>,
    pub role: Role,
    #[serde(skip_serializing)] // Jamais exposé en JSON
    pub password_hash: String, // Format: pbkdf2:sha256:iterations$salt$hash
    pub picture: String,
    pub active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Fichier à supprimer du disque, None pour la photo par défaut
    pub fn stored_picture(&self) -> Option<&str> {
        stored_picture(&self.picture)
    }
}

pub fn stored_picture(picture: &str) -> Option<&str> {
    if picture.is_empty() || picture == DEFAULT_PICTURE {
        None
    } else {
        Some(picture)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id"
    )]
    Project,

    #[sea_orm(has_many = "super::intervention::Entity")]
    Intervention,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl Related<super::intervention::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Intervention.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_picture_is_never_stored() {
        assert_eq!(stored_picture(DEFAULT_PICTURE), None);
        assert_eq!(stored_picture(""), None);
        assert_eq!(stored_picture("3f2a.png"), Some("3f2a.png"));
    }

    #[test]
    fn test_post_serializes_with_accents() {
        let json = serde_json::to_string(&Post::IngenieurQualite).unwrap();
        assert_eq!(json, "\"Ingénieur Qualité\"");
    }
}
