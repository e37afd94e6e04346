// ============================================================================
// IMPORT EXCEL
// ============================================================================
//
// Description:
//   Rapproche les lignes d'une feuille avec la base, pour une entité donnée
//   (projets, équipements, utilisateurs, interventions):
//   1. lecture positionnelle de la ligne (layout.rs)
//   2. conversion en entité + résolution des codes (ImportTarget::build)
//   3. ligne ignorée si sa clé métier existe déjà (pas d'écrasement)
//   4. insertion, puis effet de bord (email, ...)
//
// Points d'attention:
//   - Les lignes sont traitées une par une, dans l'ordre: un doublon à
//     l'intérieur du même fichier est détecté par la ligne suivante
//   - Une ligne en erreur n'arrête jamais l'import; seul un fichier
//     illisible fait échouer la requête
//   - Pas de transaction globale: les lignes déjà insérées restent
//
// ============================================================================

pub mod layout;
pub mod sheet;
pub mod targets;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppError;
use layout::{Layout, Record};
use sheet::SheetRow;

/// Résultat d'une insertion: le résumé de la ligne et l'issue de l'effet de bord
pub struct Persisted<S> {
    pub summary: S,
    pub follow_up: Result<(), AppError>,
}

impl<S> Persisted<S> {
    pub fn done(summary: S) -> Self {
        Self {
            summary,
            follow_up: Ok(()),
        }
    }
}

#[async_trait]
pub trait ImportTarget: Send + Sync {
    type Row: Send;
    type Summary: Serialize + Send;

    /// Nom singulier pour les messages ("project", "equipment", ...)
    fn entity(&self) -> &'static str;

    fn layout(&self) -> &'static Layout;

    /// Convertit la ligne lue en entité (enums, codes -> ids)
    fn build(&self, record: &Record) -> Result<Self::Row, AppError>;

    /// Message si la clé métier existe déjà, None sinon
    async fn duplicate(&self, row: &Self::Row) -> Result<Option<String>, AppError>;

    async fn persist(&self, row: Self::Row) -> Result<Persisted<Self::Summary>, AppError>;
}

#[derive(Debug, Serialize)]
pub struct ImportReport<S> {
    pub imported: Vec<S>,
    pub errors: Vec<String>,
}

impl<S: Serialize> ImportReport<S> {
    /// {imported, <collection>, errors?}
    pub fn into_data(self, collection: &str) -> serde_json::Value {
        let mut data = serde_json::Map::new();
        data.insert("imported".to_string(), serde_json::json!(self.imported.len()));
        data.insert(collection.to_string(), serde_json::json!(self.imported));
        if !self.errors.is_empty() {
            data.insert("errors".to_string(), serde_json::json!(self.errors));
        }
        serde_json::Value::Object(data)
    }
}

pub async fn reconcile<T: ImportTarget>(target: &T, rows: Vec<SheetRow>) -> ImportReport<T::Summary> {
    let mut report = ImportReport {
        imported: Vec::new(),
        errors: Vec::new(),
    };
    let entity = target.entity();

    for row in rows {
        let key = target.layout().key_of(&row.cells);
        let failed = |e: AppError| format!("Error importing {} {} (row {}): {}", entity, key, row.number, e);

        // 1. Lecture + conversion
        let built = match target.layout().read(&row.cells).and_then(|record| target.build(&record)) {
            Ok(built) => built,
            Err(e) => {
                report.errors.push(failed(e));
                continue;
            }
        };

        // 2. Doublon sur la clé métier
        match target.duplicate(&built).await {
            Ok(Some(message)) => {
                report.errors.push(format!("{} (row {})", message, row.number));
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                report.errors.push(failed(e));
                continue;
            }
        }

        // 3. Insertion puis effet de bord
        match target.persist(built).await {
            Ok(persisted) => {
                if let Err(e) = persisted.follow_up {
                    log::warn!("{} {} imported but follow-up failed: {}", entity, key, e);
                    report.errors.push(format!("{} {} (row {}) imported but: {}", entity, key, row.number, e));
                }
                report.imported.push(persisted.summary);
            }
            Err(e) => report.errors.push(failed(e)),
        }
    }

    log::info!(
        "Import {}: {} imported, {} error(s)",
        entity,
        report.imported.len(),
        report.errors.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Cible en mémoire: clé = colonne 1, valeur = colonne 2 (entier)
    struct MemoryTarget {
        codes: Mutex<HashSet<String>>,
        fail_follow_up_for: Option<&'static str>,
    }

    static MEMORY_LAYOUT: Layout = Layout {
        fields: &[
            layout::Field { column: 1, name: "code", parser: layout::Parser::Required },
            layout::Field { column: 2, name: "qte", parser: layout::Parser::Integer { default: Some(0) } },
        ],
        key: &["code"],
    };

    impl MemoryTarget {
        fn with_codes(codes: &[&str]) -> Self {
            Self {
                codes: Mutex::new(codes.iter().map(|c| c.to_string()).collect()),
                fail_follow_up_for: None,
            }
        }
    }

    #[async_trait]
    impl ImportTarget for MemoryTarget {
        type Row = (String, i32);
        type Summary = String;

        fn entity(&self) -> &'static str {
            "project"
        }

        fn layout(&self) -> &'static Layout {
            &MEMORY_LAYOUT
        }

        fn build(&self, record: &Record) -> Result<Self::Row, AppError> {
            Ok((record.text("code")?, record.integer("qte")?))
        }

        async fn duplicate(&self, row: &Self::Row) -> Result<Option<String>, AppError> {
            let exists = self.codes.lock().unwrap().contains(&row.0);
            Ok(exists.then(|| format!("Project with code {} already exists", row.0)))
        }

        async fn persist(&self, row: Self::Row) -> Result<Persisted<Self::Summary>, AppError> {
            self.codes.lock().unwrap().insert(row.0.clone());
            let follow_up = match self.fail_follow_up_for {
                Some(code) if code == row.0 => Err(AppError::internal("smtp down")),
                _ => Ok(()),
            };
            Ok(Persisted { summary: row.0, follow_up })
        }
    }

    fn rows(data: &[&[&str]]) -> Vec<SheetRow> {
        data.iter()
            .enumerate()
            .map(|(i, cells)| SheetRow {
                number: i + 2,
                cells: cells.iter().map(|c| c.to_string()).collect(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_three_rows_with_existing_code_in_row_two() {
        let target = MemoryTarget::with_codes(&["P2"]);
        let report = reconcile(&target, rows(&[&["P1", "1"], &["P2", "2"], &["P3", "3"]])).await;

        assert_eq!(report.imported, vec!["P1", "P3"]);
        assert_eq!(
            report.errors,
            vec!["Project with code P2 already exists (row 3)".to_string()]
        );
    }

    #[tokio::test]
    async fn test_n_rows_with_k_duplicates() {
        // 6 lignes: 1 doublon avec la base, 2 doublons internes au fichier
        let target = MemoryTarget::with_codes(&["OLD"]);
        let report = reconcile(
            &target,
            rows(&[&["A"], &["OLD"], &["B"], &["A"], &["C"], &["B"]]),
        )
        .await;

        assert_eq!(report.imported.len(), 3);
        assert_eq!(report.errors.len(), 3);
        for (error, row) in report.errors.iter().zip([3, 5, 7]) {
            assert!(error.ends_with(&format!("already exists (row {})", row)), "{}", error);
        }
    }

    #[tokio::test]
    async fn test_invalid_row_does_not_stop_import() {
        let target = MemoryTarget::with_codes(&[]);
        let report = reconcile(&target, rows(&[&["P1", "abc"], &["", "2"], &["P3", "3"]])).await;

        assert_eq!(report.imported, vec!["P3"]);
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[0].starts_with("Error importing project P1 (row 2)"), "{}", report.errors[0]);
        assert!(report.errors[1].contains("code is required"), "{}", report.errors[1]);
    }

    #[tokio::test]
    async fn test_failed_follow_up_keeps_row_imported() {
        let target = MemoryTarget {
            codes: Mutex::new(HashSet::new()),
            fail_follow_up_for: Some("P1"),
        };
        let report = reconcile(&target, rows(&[&["P1"], &["P2"]])).await;

        assert_eq!(report.imported, vec!["P1", "P2"]);
        assert_eq!(report.errors, vec!["project P1 (row 2) imported but: smtp down".to_string()]);
    }

    #[test]
    fn test_report_json_omits_empty_errors() {
        let report = ImportReport { imported: vec!["P1"], errors: Vec::new() };
        let data = report.into_data("projects");
        assert_eq!(data["imported"], 1);
        assert_eq!(data["projects"][0], "P1");
        assert!(data.get("errors").is_none());

        let report: ImportReport<&str> = ImportReport { imported: vec![], errors: vec!["x".to_string()] };
        let data = report.into_data("projects");
        assert_eq!(data["imported"], 0);
        assert_eq!(data["errors"][0], "x");
    }
}
