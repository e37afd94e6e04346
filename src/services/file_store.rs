// ============================================================================
// STOCKAGE DES FICHIERS UPLOADÉS
// ============================================================================
//
// Description:
//   - Vérifie le type MIME des uploads (photos / classeurs Excel)
//   - Copie une photo temporaire vers <upload_dir>/images/<uuid>.<ext>
//   - Supprime une photo stockée (fichier absent = pas une erreur)
//
// Points d'attention:
//   - Les fichiers temporaires sont des TempFile actix-multipart: ils sont
//     supprimés du disque quand la valeur est droppée, quel que soit le
//     chemin de sortie du handler
//   - Le nom stocké est seulement le nom de fichier, jamais un chemin
//
// ============================================================================

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use actix_multipart::form::tempfile::TempFile;
use uuid::Uuid;

use crate::error::AppError;

/// Taille maximale d'un upload
pub const MAX_UPLOAD_BYTES: usize = 5_000_000;

const PICTURE_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpeg"),
    ("image/jpg", "jpg"),
    ("image/webp", "webp"),
];

const WORKBOOK_TYPES: &[(&str, &str)] = &[
    ("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet", "xlsx"),
    ("application/vnd.ms-excel", "xls"),
    ("application/vnd.ms-excel.sheet.macroEnabled.12", "xlsm"),
];

fn extension_for(table: &[(&str, &'static str)], content_type: Option<&str>) -> Option<&'static str> {
    let content_type = content_type?;
    table
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(content_type))
        .map(|(_, ext)| *ext)
}

fn content_type_of(upload: &TempFile) -> Option<&str> {
    upload.content_type.as_ref().map(|m| m.essence_str())
}

/// Extension de la photo, UploadError si le type n'est pas une image acceptée
pub fn picture_extension(content_type: Option<&str>) -> Result<&'static str, AppError> {
    extension_for(PICTURE_TYPES, content_type)
        .ok_or_else(|| AppError::Upload("Invalid file type!".to_string()))
}

/// Vérifie que l'upload est un classeur Excel
pub fn check_workbook(upload: &TempFile) -> Result<(), AppError> {
    extension_for(WORKBOOK_TYPES, content_type_of(upload))
        .map(|_| ())
        .ok_or_else(|| AppError::Upload("Invalid file type!".to_string()))
}

#[derive(Debug, Clone)]
pub struct FileStore {
    images_dir: PathBuf,
}

impl FileStore {
    pub fn new(upload_dir: &Path) -> Self {
        Self {
            images_dir: upload_dir.join("images"),
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    /// Déplace la photo uploadée vers le stockage permanent et retourne son nom
    pub async fn store_picture(&self, upload: &TempFile) -> Result<String, AppError> {
        let ext = picture_extension(content_type_of(upload))?;
        self.place(upload.file.path(), ext).await
    }

    /// Copie un fichier temporaire sous un nom unique. Le temporaire reste à la
    /// charge de l'appelant (TempFile le supprime au drop)
    pub async fn place(&self, temp_path: &Path, ext: &str) -> Result<String, AppError> {
        tokio::fs::create_dir_all(&self.images_dir)
            .await
            .map_err(|e| AppError::internal(format!("Failed to create upload dir: {}", e)))?;

        let filename = format!("{}.{}", Uuid::new_v4(), ext);
        let final_path = self.images_dir.join(&filename);

        tokio::fs::copy(temp_path, &final_path)
            .await
            .map_err(|e| AppError::internal(format!("Failed to store file: {}", e)))?;

        log::debug!("Stored upload as {}", final_path.display());
        Ok(filename)
    }

    /// Supprime un fichier stocké; un fichier déjà absent n'est pas une erreur
    pub async fn remove(&self, filename: &str) -> Result<(), AppError> {
        // Seulement le nom: pas de sortie du dossier images
        let Some(name) = Path::new(filename).file_name() else {
            return Ok(());
        };

        match tokio::fs::remove_file(self.images_dir.join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::internal(format!("Failed to remove file {}: {}", filename, e))),
        }
    }

    /// Variante "best effort": logue l'échec au lieu de le propager
    pub async fn remove_quietly(&self, filename: &str) {
        if let Err(e) = self.remove(filename).await {
            log::error!("Failed to cleanup file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_picture_extension() {
        assert_eq!(picture_extension(Some("image/png")).unwrap(), "png");
        assert_eq!(picture_extension(Some("IMAGE/JPEG")).unwrap(), "jpeg");
        assert!(matches!(picture_extension(Some("application/pdf")), Err(AppError::Upload(_))));
        assert!(matches!(picture_extension(None), Err(AppError::Upload(_))));
    }

    #[test]
    fn test_workbook_types() {
        assert_eq!(
            extension_for(WORKBOOK_TYPES, Some("application/vnd.ms-excel")),
            Some("xls")
        );
        assert_eq!(extension_for(WORKBOOK_TYPES, Some("image/png")), None);
    }

    #[tokio::test]
    async fn test_place_then_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let mut temp = tempfile::NamedTempFile::new().unwrap();
        temp.write_all(b"fake-png").unwrap();

        let filename = store.place(temp.path(), "png").await.unwrap();
        assert!(filename.ends_with(".png"));
        let stored = store.images_dir().join(&filename);
        assert_eq!(std::fs::read(&stored).unwrap(), b"fake-png");

        store.remove(&filename).await.unwrap();
        assert!(!stored.exists());
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.remove("does-not-exist.png").await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_ignores_directories_in_name() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("keep.png");
        std::fs::write(&outside, b"x").unwrap();

        let store = FileStore::new(dir.path());
        store.remove("../keep.png").await.unwrap();

        assert!(outside.exists());
    }
}
