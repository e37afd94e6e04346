// ============================================================================
// LIENS PROJET <-> ÉQUIPEMENT
// ============================================================================
//
// Description:
//   Maintient la cohérence entre equipments.project_id et le tableau
//   projects.equipments.
//
// Invariant:
//   equipment.project_id == Some(p)  <=>  equipment.id ∈ projects[p].equipments
//
// Points d'attention:
//   - Toutes les fonctions prennent un ConnectionTrait: les services les
//     appellent avec une DatabaseTransaction pour que l'écriture de
//     l'équipement et celle du tableau soient atomiques
//   - La ligne projet est verrouillée (SELECT ... FOR UPDATE) avant la
//     réécriture du tableau: deux requêtes concurrentes sur le même projet
//     sont sérialisées
//
// ============================================================================

use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, QuerySelect, Set};

use crate::error::AppError;
use crate::models::project;

/// Déplacement d'un équipement d'un projet vers un autre (ou vers/depuis "aucun")
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectMove {
    pub detach_from: Option<i32>,
    pub attach_to: Option<i32>,
}

impl ProjectMove {
    /// None si le projet demandé est identique au projet courant
    pub fn plan(current: Option<i32>, requested: Option<i32>) -> Option<Self> {
        if current == requested {
            return None;
        }
        Some(Self {
            detach_from: current,
            attach_to: requested,
        })
    }
}

/// Ajoute l'id en fin de tableau (sans doublon)
pub fn with_equipment(ids: &[i32], equipment_id: i32) -> Vec<i32> {
    let mut next = ids.to_vec();
    if !next.contains(&equipment_id) {
        next.push(equipment_id);
    }
    next
}

/// Retire toutes les occurrences de l'id
pub fn without_equipment(ids: &[i32], equipment_id: i32) -> Vec<i32> {
    ids.iter().copied().filter(|id| *id != equipment_id).collect()
}

pub async fn find_project<C: ConnectionTrait>(
    conn: &C,
    project_id: i32,
) -> Result<project::Model, AppError> {
    project::Entity::find_by_id(project_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))
}

/// Ajoute l'équipement au tableau du projet (NotFound si le projet n'existe pas)
pub async fn attach<C: ConnectionTrait>(
    conn: &C,
    project_id: i32,
    equipment_id: i32,
) -> Result<(), AppError> {
    let project = project::Entity::find_by_id(project_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("Project not found"))?;

    let next = with_equipment(&project.equipments, equipment_id);
    if next != project.equipments {
        let mut active: project::ActiveModel = project.into();
        active.equipments = Set(next);
        active.update(conn).await?;
    }

    Ok(())
}

/// Retire l'équipement du tableau du projet; projet absent = rien à faire
pub async fn detach<C: ConnectionTrait>(
    conn: &C,
    project_id: i32,
    equipment_id: i32,
) -> Result<(), AppError> {
    let Some(project) = project::Entity::find_by_id(project_id)
        .lock_exclusive()
        .one(conn)
        .await?
    else {
        log::warn!(
            "Project {} not found while detaching equipment {}",
            project_id,
            equipment_id
        );
        return Ok(());
    };

    let next = without_equipment(&project.equipments, equipment_id);
    if next != project.equipments {
        let mut active: project::ActiveModel = project.into();
        active.equipments = Set(next);
        active.update(conn).await?;
    }

    Ok(())
}

/// Applique un déplacement: retrait de l'ancien projet puis ajout au nouveau
pub async fn apply_move<C: ConnectionTrait>(
    conn: &C,
    equipment_id: i32,
    movement: ProjectMove,
) -> Result<(), AppError> {
    if let Some(old) = movement.detach_from {
        detach(conn, old, equipment_id).await?;
    }
    if let Some(new) = movement.attach_to {
        attach(conn, new, equipment_id).await?;
    }
    Ok(())
}

/// Vide le tableau de tous les projets (suppression de tous les équipements)
pub async fn clear_all<C: ConnectionTrait>(conn: &C) -> Result<u64, AppError> {
    let result = project::Entity::update_many()
        .col_expr(project::Column::Equipments, Expr::value(Vec::<i32>::new()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}
