// ============================================================================
// SERVICE : ÉQUIPEMENTS
// ============================================================================
//
// Points d'attention:
//   - Chaque écriture qui touche project_id passe par une transaction: la
//     ligne équipement et le tableau projects.equipments sont modifiés
//     ensemble ou pas du tout (voir services::project_links)
//   - Un projet cible inexistant => NotFound et rollback complet
//
// ============================================================================

use chrono::Utc;
use sea_orm::*;
use validator::Validate;

use crate::error::AppError;
use crate::models::dto::{CreateEquipmentRequest, EquipmentView, UpdateEquipmentRequest};
use crate::models::{equipment, project};
use crate::services::listing::{self, ListRequest, Page};
use crate::services::project_links::{self, ProjectMove};

pub const DUPLICATE_ASSET: &str = "Asset number already exists";

pub struct EquipmentService;

fn sort_column(field: &str) -> Option<equipment::Column> {
    match field {
        "createdAt" => Some(equipment::Column::CreatedAt),
        "updatedAt" => Some(equipment::Column::UpdatedAt),
        "number" => Some(equipment::Column::Number),
        "tableNumber" => Some(equipment::Column::TableNumber),
        "assetNumber" => Some(equipment::Column::AssetNumber),
        "module" => Some(equipment::Column::Module),
        "size" => Some(equipment::Column::Size),
        "nomPc" => Some(equipment::Column::NomPc),
        "id" => Some(equipment::Column::Id),
        _ => None,
    }
}

/// tableNumber, assetNumber, module, size ou le code du projet joint
fn search_condition(term: &str) -> Condition {
    let pattern = listing::like_pattern(term);
    Condition::any()
        .add(listing::contains(equipment::Entity, equipment::Column::TableNumber, &pattern))
        .add(listing::contains(equipment::Entity, equipment::Column::AssetNumber, &pattern))
        .add(listing::contains(equipment::Entity, equipment::Column::Module, &pattern))
        .add(listing::contains(equipment::Entity, equipment::Column::Size, &pattern))
        .add(listing::contains(project::Entity, project::Column::Code, &pattern))
}

fn view((equipment, project_details): (equipment::Model, Option<project::Model>)) -> EquipmentView {
    EquipmentView {
        equipment,
        project_details,
    }
}

impl EquipmentService {
    pub async fn create(
        db: &DatabaseConnection,
        request: CreateEquipmentRequest,
    ) -> Result<equipment::Model, AppError> {
        let request = request.trimmed();
        request.validate()?;

        let txn = db.begin().await?;

        // 1. Numéro d'inventaire déjà pris => DuplicateKey, rien n'est écrit
        if Self::exists_with_asset_number(&txn, &request.asset_number).await? {
            return Err(AppError::DuplicateKey(DUPLICATE_ASSET.to_string()));
        }

        // 2. Le projet doit exister avant toute écriture
        if let Some(project_id) = request.project {
            project_links::find_project(&txn, project_id).await?;
        }

        // 3. Insertion de l'équipement
        let now = Utc::now();
        let new_equipment = equipment::ActiveModel {
            project_id: Set(request.project),
            number: Set(request.number),
            table_number: Set(request.table_number),
            asset_number: Set(request.asset_number),
            module: Set(request.module),
            size: Set(request.size),
            version_win: Set(request.version_win),
            version_cswin: Set(request.version_cswin),
            version_dongle: Set(request.version_dongle),
            nom_pc: Set(request.nom_pc),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let saved = new_equipment
            .insert(&txn)
            .await
            .map_err(|e| AppError::from_db(e, DUPLICATE_ASSET))?;

        // 4. Ajout dans le tableau du projet
        if let Some(project_id) = saved.project_id {
            project_links::attach(&txn, project_id, saved.id).await?;
        }

        txn.commit().await?;
        log::info!("Equipment {} created (project: {:?})", saved.asset_number, saved.project_id);
        Ok(saved)
    }

    pub async fn list(
        db: &DatabaseConnection,
        request: &ListRequest,
    ) -> Result<Page<EquipmentView>, AppError> {
        let sort = request.sort_column(sort_column)?;
        let condition = request.search.as_deref().map(search_condition);

        // Le total refait la même jointure que la page
        let mut count_query = equipment::Entity::find().left_join(project::Entity);
        if let Some(condition) = condition.clone() {
            count_query = count_query.filter(condition);
        }
        let total = count_query.count(db).await?;

        let mut query = equipment::Entity::find().find_also_related(project::Entity);
        if let Some(condition) = condition {
            query = query.filter(condition);
        }
        let query = query
            .order_by(sort, listing::order(false))
            .order_by_asc(equipment::Column::Id);
        let rows = listing::Pagination::apply(request.pagination.as_ref(), query)
            .all(db)
            .await?;

        Ok(Page::new(
            rows.into_iter().map(view).collect(),
            total,
            request.pagination.as_ref(),
        ))
    }

    pub async fn get(db: &DatabaseConnection, id: i32) -> Result<EquipmentView, AppError> {
        equipment::Entity::find_by_id(id)
            .find_also_related(project::Entity)
            .one(db)
            .await?
            .map(view)
            .ok_or_else(|| AppError::not_found("Equipment not found"))
    }

    pub async fn update(
        db: &DatabaseConnection,
        id: i32,
        request: UpdateEquipmentRequest,
    ) -> Result<equipment::Model, AppError> {
        let request = request.trimmed();
        request.validate()?;

        let txn = db.begin().await?;

        let existing = equipment::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("Equipment not found"))?;

        // 1. Réaffectation éventuelle (absent = inchangé)
        let movement = request
            .project
            .and_then(|requested| ProjectMove::plan(existing.project_id, requested));

        let mut active: equipment::ActiveModel = existing.into();
        if let Some(movement) = movement {
            project_links::apply_move(&txn, id, movement).await?;
            active.project_id = Set(movement.attach_to);
        }

        // 2. Champs simples
        if let Some(number) = request.number {
            active.number = Set(number);
        }
        if let Some(table_number) = request.table_number {
            active.table_number = Set(table_number);
        }
        if let Some(asset_number) = request.asset_number {
            active.asset_number = Set(asset_number);
        }
        if let Some(module) = request.module {
            active.module = Set(module);
        }
        if let Some(size) = request.size {
            active.size = Set(size);
        }
        if let Some(version_win) = request.version_win {
            active.version_win = Set(version_win);
        }
        if let Some(version_cswin) = request.version_cswin {
            active.version_cswin = Set(version_cswin);
        }
        if let Some(version_dongle) = request.version_dongle {
            active.version_dongle = Set(version_dongle);
        }
        if let Some(nom_pc) = request.nom_pc {
            active.nom_pc = Set(nom_pc);
        }
        active.updated_at = Set(Utc::now());

        let updated = active
            .update(&txn)
            .await
            .map_err(|e| AppError::from_db(e, DUPLICATE_ASSET))?;

        txn.commit().await?;
        Ok(updated)
    }

    pub async fn delete(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
        let txn = db.begin().await?;

        let existing = equipment::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::not_found("Equipment not found"))?;

        if let Some(project_id) = existing.project_id {
            project_links::detach(&txn, project_id, existing.id).await?;
        }
        equipment::Entity::delete_by_id(existing.id).exec(&txn).await?;

        txn.commit().await?;
        log::info!("Equipment {} deleted", existing.asset_number);
        Ok(())
    }

    /// Vide tous les tableaux projet puis supprime tous les équipements
    pub async fn delete_all(db: &DatabaseConnection) -> Result<u64, AppError> {
        let txn = db.begin().await?;
        project_links::clear_all(&txn).await?;
        let result = equipment::Entity::delete_many().exec(&txn).await?;
        txn.commit().await?;

        log::warn!("Deleted all equipments ({} rows)", result.rows_affected);
        Ok(result.rows_affected)
    }

    pub async fn exists_with_asset_number<C: ConnectionTrait>(
        conn: &C,
        asset_number: &str,
    ) -> Result<bool, AppError> {
        let found = equipment::Entity::find()
            .filter(equipment::Column::AssetNumber.eq(asset_number))
            .one(conn)
            .await?;
        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_whitelist() {
        assert!(matches!(sort_column("assetNumber"), Some(equipment::Column::AssetNumber)));
        assert!(sort_column("project").is_none());
    }

    #[test]
    fn test_search_spans_project_code() {
        let sql = equipment::Entity::find()
            .find_also_related(project::Entity)
            .filter(search_condition("p1"))
            .build(DbBackend::Postgres)
            .to_string();

        assert!(sql.contains("LEFT JOIN \"projects\""), "{}", sql);
        assert!(sql.contains(r#"LOWER("equipments"."table_number") LIKE '%p1%'"#), "{}", sql);
        assert!(sql.contains(r#"LOWER("projects"."code") LIKE '%p1%'"#), "{}", sql);
    }

    fn equipment_model(id: i32, project_id: Option<i32>, asset_number: &str) -> equipment::Model {
        let now = Utc::now();
        equipment::Model {
            id,
            project_id,
            number: 1,
            table_number: "T1".to_string(),
            asset_number: asset_number.to_string(),
            module: "M".to_string(),
            size: "S".to_string(),
            version_win: "10".to_string(),
            version_cswin: "2".to_string(),
            version_dongle: "1".to_string(),
            nom_pc: "PC1".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn project_model(id: i32, code: &str, equipments: Vec<i32>) -> project::Model {
        let now = Utc::now();
        project::Model {
            id,
            code: code.to_string(),
            cmn: "CMN".to_string(),
            ref_tsk: "TSK".to_string(),
            qte: 1,
            pin: "PIN".to_string(),
            sap1: None,
            sap2: None,
            ref_s: "RS".to_string(),
            status: Default::default(),
            equipments,
            created_at: now,
            updated_at: now,
        }
    }

    fn create_request(asset_number: &str, project: Option<i32>) -> CreateEquipmentRequest {
        CreateEquipmentRequest {
            project,
            number: 1,
            table_number: "T1".to_string(),
            asset_number: asset_number.to_string(),
            module: "M".to_string(),
            size: "S".to_string(),
            version_win: "10".to_string(),
            version_cswin: "2".to_string(),
            version_dongle: "1".to_string(),
            nom_pc: "PC1".to_string(),
        }
    }

    /// Valeurs liées des UPDATE "projects", dans l'ordre d'exécution
    fn project_updates(log: &[Transaction]) -> Vec<Vec<Value>> {
        statements_starting_with(log, r#"UPDATE "projects""#)
    }

    fn statements_starting_with(log: &[Transaction], prefix: &str) -> Vec<Vec<Value>> {
        log.iter()
            .flat_map(|txn| txn.statements())
            .filter(|stmt| stmt.sql.starts_with(prefix))
            .map(|stmt| stmt.values.as_ref().map(|v| v.0.clone()).unwrap_or_default())
            .collect()
    }

    fn sql_of(txn: &Transaction) -> Vec<String> {
        txn.statements().iter().map(|stmt| stmt.sql.clone()).collect()
    }

    #[tokio::test]
    async fn test_create_on_project_appends_to_its_array() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // numéro d'inventaire libre
            .append_query_results([Vec::<equipment::Model>::new()])
            // projet P1 existe, vide
            .append_query_results([vec![project_model(1, "P1", vec![])]])
            .append_query_results([vec![equipment_model(11, Some(1), "A1")]])
            // attach: verrou puis réécriture du tableau
            .append_query_results([
                vec![project_model(1, "P1", vec![])],
                vec![project_model(1, "P1", vec![11])],
            ])
            // get_detail: projet puis ses équipements
            .append_query_results([vec![project_model(1, "P1", vec![11])]])
            .append_query_results([vec![equipment_model(11, Some(1), "A1")]])
            .into_connection();

        let created = EquipmentService::create(&db, create_request("A1", Some(1))).await.unwrap();
        assert_eq!(created.project_id, Some(1));

        let detail = crate::services::project_service::ProjectService::get_detail(&db, 1)
            .await
            .unwrap();
        assert_eq!(detail.equipments.len(), 1);
        assert_eq!(detail.equipments[0].asset_number, "A1");

        let log = db.into_transaction_log();
        let create = sql_of(&log[0]);
        assert_eq!(create.first().map(String::as_str), Some("BEGIN"));
        assert_eq!(create.last().map(String::as_str), Some("COMMIT"));
        assert!(create.iter().any(|sql| sql.starts_with(r#"INSERT INTO "equipments""#)));

        let updates = project_updates(&log);
        assert_eq!(updates.len(), 1);
        assert!(updates[0].contains(&Value::from(vec![11])), "{:?}", updates[0]);
    }

    #[tokio::test]
    async fn test_same_asset_number_twice_is_duplicate() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                Vec::<equipment::Model>::new(),
                vec![equipment_model(11, None, "A1")],
                vec![equipment_model(11, None, "A1")],
            ])
            .into_connection();

        let first = EquipmentService::create(&db, create_request("A1", None)).await;
        let second = EquipmentService::create(&db, create_request("A1", None)).await;

        assert_eq!(first.unwrap().asset_number, "A1");
        assert!(
            matches!(&second, Err(AppError::DuplicateKey(message)) if message == DUPLICATE_ASSET),
            "{:?}",
            second
        );

        // La seconde transaction n'a rien inséré
        let log = db.into_transaction_log();
        let rejected = sql_of(&log[1]);
        assert!(!rejected.iter().any(|sql| sql.starts_with("INSERT")), "{:?}", rejected);
        assert_eq!(rejected.last().map(String::as_str), Some("ROLLBACK"));
    }

    #[tokio::test]
    async fn test_reassignment_moves_id_between_arrays() {
        // A = [10, 11], B = [20]; l'équipement 11 passe de A à B
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![equipment_model(11, Some(1), "A1")]])
            .append_query_results([
                vec![project_model(1, "A", vec![10, 11])],
                vec![project_model(1, "A", vec![10])],
                vec![project_model(2, "B", vec![20])],
                vec![project_model(2, "B", vec![20, 11])],
            ])
            .append_query_results([vec![equipment_model(11, Some(2), "A1")]])
            .into_connection();

        let request = UpdateEquipmentRequest {
            project: Some(Some(2)),
            ..Default::default()
        };
        let updated = EquipmentService::update(&db, 11, request).await.unwrap();
        assert_eq!(updated.project_id, Some(2));

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);

        let updates = project_updates(&log);
        assert_eq!(updates.len(), 2);
        assert!(updates[0].contains(&Value::from(vec![10])), "{:?}", updates[0]);
        assert!(updates[1].contains(&Value::from(vec![20, 11])), "{:?}", updates[1]);

        let equipment_update = statements_starting_with(&log, r#"UPDATE "equipments""#);
        assert!(equipment_update[0].contains(&Value::from(Some(2))), "{:?}", equipment_update);
    }

    #[tokio::test]
    async fn test_unassign_only_detaches() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![equipment_model(11, Some(1), "A1")]])
            .append_query_results([
                vec![project_model(1, "A", vec![11])],
                vec![project_model(1, "A", vec![])],
            ])
            .append_query_results([vec![equipment_model(11, None, "A1")]])
            .into_connection();

        let request: UpdateEquipmentRequest = serde_json::from_str(r#"{"project": null}"#).unwrap();
        let updated = EquipmentService::update(&db, 11, request).await.unwrap();
        assert_eq!(updated.project_id, None);

        let log = db.into_transaction_log();
        let updates = project_updates(&log);
        assert_eq!(updates.len(), 1);
        assert!(updates[0].contains(&Value::from(Vec::<i32>::new())), "{:?}", updates[0]);

        let equipment_update = statements_starting_with(&log, r#"UPDATE "equipments""#);
        assert!(equipment_update[0].contains(&Value::Int(None)), "{:?}", equipment_update);
    }

    #[tokio::test]
    async fn test_absent_project_leaves_arrays_alone() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                vec![equipment_model(11, Some(1), "A1")],
                vec![equipment_model(11, Some(1), "A1")],
            ])
            .into_connection();

        let request = UpdateEquipmentRequest {
            module: Some("M2".to_string()),
            ..Default::default()
        };
        EquipmentService::update(&db, 11, request).await.unwrap();

        assert!(project_updates(&db.into_transaction_log()).is_empty());
    }

    #[tokio::test]
    async fn test_delete_prunes_project_array() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![equipment_model(11, Some(1), "A1")]])
            .append_query_results([
                vec![project_model(1, "A", vec![10, 11])],
                vec![project_model(1, "A", vec![10])],
            ])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        EquipmentService::delete(&db, 11).await.unwrap();

        let log = db.into_transaction_log();
        let updates = project_updates(&log);
        assert_eq!(updates.len(), 1);
        assert!(updates[0].contains(&Value::from(vec![10])), "{:?}", updates[0]);

        let sql = sql_of(&log[0]);
        assert!(sql.iter().any(|s| s.starts_with(r#"DELETE FROM "equipments""#)), "{:?}", sql);
        assert_eq!(sql.last().map(String::as_str), Some("COMMIT"));
    }

    #[test]
    fn test_view_keeps_missing_project_as_null() {
        let equipment = equipment_model(4, Some(99), "A1");

        let json = serde_json::to_value(view((equipment, None))).unwrap();
        assert_eq!(json["assetNumber"], "A1");
        assert_eq!(json["project"], 99);
        assert!(json["projectDetails"].is_null());
    }
}
