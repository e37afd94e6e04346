// ============================================================================
// SERVICE : UTILISATEURS
// ============================================================================
//
// Description:
//   - Création (inscription / import) avec mot de passe fourni ou généré
//   - Connexion: compte désactivé => 403, identifiants faux => 401
//   - Mise à jour du profil, changement de mot de passe, activation
//   - Suppression avec nettoyage de la photo stockée
//
// Points d'attention:
//   - La photo est déjà copiée dans le stockage quand le service est appelé;
//     en cas d'erreur c'est à la route de la supprimer
//   - L'email "compte créé" est envoyé APRÈS l'insertion; son échec ne
//     supprime jamais l'utilisateur
//
// ============================================================================

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::*;
use validator::Validate;

use crate::error::AppError;
use crate::models::dto::{
    ChangePasswordRequest, CreateUserRequest, LoginRequest, UpdateUserRequest, UserView,
};
use crate::models::{project, users};
use crate::services::file_store::FileStore;
use crate::services::listing::{self, ListRequest, Page};
use crate::services::notifier::{AccountNotice, Notifier};
use crate::utils::password;

pub const DUPLICATE_USER: &str = "Email or code already exists";
const DEFAULT_POST_HR: &str = "Sampling";

pub struct UserService;

/// Utilisateur créé + mot de passe en clair (pour l'email uniquement)
#[derive(Debug)]
pub struct CreatedUser {
    pub user: users::Model,
    pub password: String,
}

impl CreatedUser {
    pub fn notice(&self) -> AccountNotice {
        AccountNotice {
            email: self.user.email.clone(),
            first_name: self.user.first_name.clone(),
            last_name: self.user.last_name.clone(),
            role: self.user.role,
            password: self.password.clone(),
        }
    }
}

fn sort_column(field: &str) -> Option<users::Column> {
    match field {
        "createdAt" => Some(users::Column::CreatedAt),
        "updatedAt" => Some(users::Column::UpdatedAt),
        "firstName" => Some(users::Column::FirstName),
        "lastName" => Some(users::Column::LastName),
        "code" => Some(users::Column::Code),
        "email" => Some(users::Column::Email),
        "post" => Some(users::Column::Post),
        "dept" => Some(users::Column::Dept),
        "id" => Some(users::Column::Id),
        _ => None,
    }
}

fn search_condition(term: &str) -> Condition {
    let pattern = listing::like_pattern(term);
    Condition::any()
        .add(listing::contains(users::Entity, users::Column::FirstName, &pattern))
        .add(listing::contains(users::Entity, users::Column::LastName, &pattern))
        .add(listing::contains(users::Entity, users::Column::Code, &pattern))
        .add(listing::contains(users::Entity, users::Column::Email, &pattern))
}

fn hash(plain: &str) -> Result<String, AppError> {
    password::hash_password(plain).map_err(AppError::internal)
}

fn view((user, project_details): (users::Model, Option<project::Model>)) -> UserView {
    UserView {
        user,
        project_details,
    }
}

async fn ensure_project<C: ConnectionTrait>(conn: &C, project_id: Option<i32>) -> Result<(), AppError> {
    if let Some(project_id) = project_id {
        crate::services::project_links::find_project(conn, project_id).await?;
    }
    Ok(())
}

impl UserService {
    /// Insère l'utilisateur. `picture` est le nom du fichier déjà stocké
    pub async fn create(
        db: &DatabaseConnection,
        request: CreateUserRequest,
        picture: Option<String>,
    ) -> Result<CreatedUser, AppError> {
        let request = request.trimmed();
        request.validate()?;

        // 1. Références
        ensure_project(db, request.project_id).await?;

        // 2. Mot de passe fourni ou généré
        let plain = request.password.clone().unwrap_or_else(password::generate_password);
        let password_hash = hash(&plain)?;

        // 3. Insertion
        let now = Utc::now();
        let new_user = users::ActiveModel {
            first_name: Set(request.first_name),
            last_name: Set(request.last_name),
            code: Set(request.code),
            email: Set(request.email),
            post_hr: Set(request.post_hr.unwrap_or_else(|| DEFAULT_POST_HR.to_string())),
            post: Set(request.post),
            affectation: Set(request.affectation.unwrap_or_default()),
            dept: Set(request.dept.unwrap_or_default()),
            project_id: Set(request.project_id),
            role: Set(request.role.unwrap_or_default()),
            password_hash: Set(password_hash),
            picture: Set(picture.unwrap_or_else(|| users::DEFAULT_PICTURE.to_string())),
            active: Set(request.active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let user = new_user
            .insert(db)
            .await
            .map_err(|e| AppError::from_db(e, DUPLICATE_USER))?;

        log::info!("User {} ({}) created", user.code, user.email);
        Ok(CreatedUser {
            user,
            password: plain,
        })
    }

    /// Envoie l'email de création; l'utilisateur reste créé quoi qu'il arrive
    pub async fn notify_created(notifier: &dyn Notifier, created: &CreatedUser) -> Result<(), AppError> {
        notifier.account_created(&created.notice()).await
    }

    pub async fn login(db: &DatabaseConnection, request: &LoginRequest) -> Result<users::Model, AppError> {
        let email = request.email.trim().to_lowercase();
        let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(db)
            .await?
            .ok_or_else(invalid)?;

        if !user.active {
            return Err(AppError::Forbidden("Account is deactivated".to_string()));
        }

        let is_valid = password::verify_password(&request.password, &user.password_hash)
            .map_err(AppError::internal)?;
        if !is_valid {
            return Err(invalid());
        }

        Ok(user)
    }

    pub async fn list(db: &DatabaseConnection, request: &ListRequest) -> Result<Page<UserView>, AppError> {
        let sort = request.sort_column(sort_column)?;
        let condition = request.search.as_deref().map(search_condition);

        let mut count_query = users::Entity::find();
        if let Some(condition) = condition.clone() {
            count_query = count_query.filter(condition);
        }
        let total = count_query.count(db).await?;

        let mut query = users::Entity::find().find_also_related(project::Entity);
        if let Some(condition) = condition {
            query = query.filter(condition);
        }
        let query = query
            .order_by(sort, listing::order(false))
            .order_by_asc(users::Column::Id);
        let rows = listing::Pagination::apply(request.pagination.as_ref(), query)
            .all(db)
            .await?;

        Ok(Page::new(
            rows.into_iter().map(view).collect(),
            total,
            request.pagination.as_ref(),
        ))
    }

    pub async fn find(db: &DatabaseConnection, id: i32) -> Result<users::Model, AppError> {
        users::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    pub async fn get(db: &DatabaseConnection, id: i32) -> Result<UserView, AppError> {
        users::Entity::find_by_id(id)
            .find_also_related(project::Entity)
            .one(db)
            .await?
            .map(view)
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    /// Met à jour le profil. Si une nouvelle photo est fournie, l'ancienne
    /// (non par défaut) est supprimée une fois la ligne mise à jour
    pub async fn update(
        db: &DatabaseConnection,
        store: &FileStore,
        id: i32,
        request: UpdateUserRequest,
        picture: Option<String>,
    ) -> Result<users::Model, AppError> {
        let request = request.trimmed();
        request.validate()?;

        let existing = Self::find(db, id).await?;
        ensure_project(db, request.project_id.flatten()).await?;

        let old_picture = existing.stored_picture().map(str::to_string);
        let mut active: users::ActiveModel = existing.into();

        if let Some(first_name) = request.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = request.last_name {
            active.last_name = Set(last_name);
        }
        if let Some(code) = request.code {
            active.code = Set(code);
        }
        if let Some(email) = request.email {
            active.email = Set(email);
        }
        if let Some(post_hr) = request.post_hr {
            active.post_hr = Set(post_hr);
        }
        if let Some(post) = request.post {
            active.post = Set(post);
        }
        if let Some(affectation) = request.affectation {
            active.affectation = Set(affectation);
        }
        if let Some(dept) = request.dept {
            active.dept = Set(dept);
        }
        if let Some(project_id) = request.project_id {
            active.project_id = Set(project_id);
        }
        if let Some(role) = request.role {
            active.role = Set(role);
        }
        if let Some(is_active) = request.active {
            active.active = Set(is_active);
        }
        let replaces_picture = picture.is_some();
        if let Some(picture) = picture {
            active.picture = Set(picture);
        }
        active.updated_at = Set(Utc::now());

        let updated = active
            .update(db)
            .await
            .map_err(|e| AppError::from_db(e, DUPLICATE_USER))?;

        if replaces_picture {
            if let Some(old) = old_picture {
                store.remove_quietly(&old).await;
            }
        }

        Ok(updated)
    }

    pub async fn change_password(
        db: &DatabaseConnection,
        id: i32,
        request: &ChangePasswordRequest,
    ) -> Result<(), AppError> {
        request.validate()?;
        let user = Self::find(db, id).await?;

        let matches = password::verify_password(&request.old_password, &user.password_hash)
            .map_err(AppError::internal)?;
        if !matches {
            return Err(AppError::validation("Incorrect old password"));
        }

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(hash(&request.new_password)?);
        active.updated_at = Set(Utc::now());
        active.update(db).await?;

        Ok(())
    }

    pub async fn toggle_active(db: &DatabaseConnection, id: i32) -> Result<users::Model, AppError> {
        let user = Self::find(db, id).await?;
        let next = !user.active;

        let mut active: users::ActiveModel = user.into();
        active.active = Set(next);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;

        log::info!("User {} active = {}", updated.code, updated.active);
        Ok(updated)
    }

    pub async fn delete(db: &DatabaseConnection, store: &FileStore, id: i32) -> Result<(), AppError> {
        let user = Self::find(db, id).await?;

        // Ligne d'abord: la photo n'est retirée que si l'utilisateur a disparu
        users::Entity::delete_by_id(user.id).exec(db).await?;
        if let Some(picture) = user.stored_picture() {
            store.remove_quietly(picture).await;
        }

        log::info!("User {} deleted", user.code);
        Ok(())
    }

    /// Supprime tous les utilisateurs et leurs photos stockées
    pub async fn delete_all(db: &DatabaseConnection, store: &FileStore) -> Result<u64, AppError> {
        let pictures: Vec<String> = users::Entity::find()
            .select_only()
            .column(users::Column::Picture)
            .into_tuple()
            .all(db)
            .await?;

        let result = users::Entity::delete_many().exec(db).await?;

        for picture in pictures.iter().filter_map(|p| users::stored_picture(p)) {
            store.remove_quietly(picture).await;
        }

        log::warn!("Deleted all users ({} rows)", result.rows_affected);
        Ok(result.rows_affected)
    }

    /// Map code -> id pour la résolution des codes utilisateur à l'import
    pub async fn code_map(db: &DatabaseConnection) -> Result<HashMap<String, i32>, AppError> {
        let rows: Vec<(String, i32)> = users::Entity::find()
            .select_only()
            .column(users::Column::Code)
            .column(users::Column::Id)
            .into_tuple()
            .all(db)
            .await?;
        Ok(rows.into_iter().collect())
    }

    pub async fn exists_with_code(db: &DatabaseConnection, code: &str) -> Result<bool, AppError> {
        let found = users::Entity::find()
            .filter(users::Column::Code.eq(code))
            .one(db)
            .await?;
        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::Post;

    fn request() -> CreateUserRequest {
        CreateUserRequest {
            first_name: " Amira ".to_string(),
            last_name: "Ben Salah".to_string(),
            code: "E042".to_string(),
            email: " Amira.BS@Example.com ".to_string(),
            password: None,
            post_hr: Some("  ".to_string()),
            post: Post::TechnicienTest,
            affectation: None,
            dept: None,
            project_id: None,
            role: None,
            active: None,
        }
    }

    #[test]
    fn test_create_request_normalized() {
        let request = request().trimmed();
        assert_eq!(request.first_name, "Amira");
        assert_eq!(request.email, "amira.bs@example.com");
        assert_eq!(request.post_hr, None);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_create_request_rejects_short_name_and_bad_email() {
        let mut short = request();
        short.first_name = "A".to_string();
        assert!(short.trimmed().validate().is_err());

        let mut bad_email = request();
        bad_email.email = "not-an-email".to_string();
        assert!(bad_email.trimmed().validate().is_err());

        let mut weak = request();
        weak.password = Some("12345".to_string());
        assert!(weak.trimmed().validate().is_err());
    }

    #[test]
    fn test_search_is_on_user_columns() {
        let sql = users::Entity::find()
            .filter(search_condition("ben"))
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#"LOWER("users"."first_name") LIKE '%ben%'"#), "{}", sql);
        assert!(sql.contains(r#"LOWER("users"."email") LIKE '%ben%'"#), "{}", sql);
    }

    #[test]
    fn test_notice_carries_plain_password() {
        let now = Utc::now();
        let created = CreatedUser {
            user: users::Model {
                id: 1,
                first_name: "Amira".to_string(),
                last_name: "Ben Salah".to_string(),
                code: "E042".to_string(),
                email: "amira@example.com".to_string(),
                post_hr: DEFAULT_POST_HR.to_string(),
                post: Post::TechnicienTest,
                affectation: Default::default(),
                dept: Default::default(),
                project_id: None,
                role: users::Role::User,
                password_hash: "pbkdf2:sha256:1$a$b".to_string(),
                picture: users::DEFAULT_PICTURE.to_string(),
                active: true,
                created_at: now,
                updated_at: now,
            },
            password: "aB3$xyz!".to_string(),
        };

        let notice = created.notice();
        assert_eq!(notice.password, "aB3$xyz!");
        assert_eq!(notice.email, "amira@example.com");
    }

    fn user_model(id: i32, picture: &str) -> users::Model {
        let now = Utc::now();
        users::Model {
            id,
            first_name: "Amira".to_string(),
            last_name: "Ben Salah".to_string(),
            code: format!("E{:03}", id),
            email: format!("user{}@example.com", id),
            post_hr: DEFAULT_POST_HR.to_string(),
            post: Post::TechnicienTest,
            affectation: Default::default(),
            dept: Default::default(),
            project_id: None,
            role: users::Role::User,
            password_hash: "pbkdf2:sha256:1$a$b".to_string(),
            picture: picture.to_string(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn store_with(files: &[&str]) -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        std::fs::create_dir_all(store.images_dir()).unwrap();
        for file in files {
            std::fs::write(store.images_dir().join(file), b"x").unwrap();
        }
        (dir, store)
    }

    fn deleted_row() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    #[tokio::test]
    async fn test_delete_removes_stored_picture() {
        let (_dir, store) = store_with(&["pic.png", "other.png", users::DEFAULT_PICTURE]);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_model(1, "pic.png")]])
            .append_exec_results([deleted_row()])
            .into_connection();

        UserService::delete(&db, &store, 1).await.unwrap();

        assert!(!store.images_dir().join("pic.png").exists());
        assert!(store.images_dir().join("other.png").exists());
        assert!(store.images_dir().join(users::DEFAULT_PICTURE).exists());
    }

    #[tokio::test]
    async fn test_delete_keeps_default_picture() {
        let (_dir, store) = store_with(&[users::DEFAULT_PICTURE]);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_model(2, users::DEFAULT_PICTURE)]])
            .append_exec_results([deleted_row()])
            .into_connection();

        UserService::delete(&db, &store, 2).await.unwrap();

        assert!(store.images_dir().join(users::DEFAULT_PICTURE).exists());
        let sql: Vec<String> = db
            .into_transaction_log()
            .iter()
            .flat_map(|txn| txn.statements())
            .map(|stmt| stmt.sql.clone())
            .collect();
        assert!(sql[1].starts_with(r#"DELETE FROM "users""#), "{:?}", sql);
    }

    #[tokio::test]
    async fn test_failed_row_delete_keeps_picture() {
        let (_dir, store) = store_with(&["pic.png"]);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user_model(1, "pic.png")]])
            .append_exec_errors([DbErr::Custom("connection lost".to_string())])
            .into_connection();

        assert!(UserService::delete(&db, &store, 1).await.is_err());
        assert!(store.images_dir().join("pic.png").exists());
    }

    #[tokio::test]
    async fn test_update_can_unassign_project() {
        let (_dir, store) = store_with(&[]);
        let mut assigned = user_model(3, users::DEFAULT_PICTURE);
        assigned.project_id = Some(7);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![assigned], vec![user_model(3, users::DEFAULT_PICTURE)]])
            .into_connection();

        let request = UpdateUserRequest {
            project_id: Some(None),
            ..Default::default()
        };
        let updated = UserService::update(&db, &store, 3, request, None).await.unwrap();
        assert_eq!(updated.project_id, None);

        let log = db.into_transaction_log();
        let update = log
            .iter()
            .flat_map(|txn| txn.statements())
            .find(|stmt| stmt.sql.starts_with(r#"UPDATE "users""#))
            .unwrap();
        let values = update.values.as_ref().unwrap();
        assert!(values.0.contains(&Value::Int(None)), "{:?}", values);
    }
}
