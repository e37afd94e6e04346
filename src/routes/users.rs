// ============================================================================
// ROUTES : UTILISATEURS
// ============================================================================
//
// Création et mise à jour arrivent en multipart (champ `picture` optionnel
// + champs texte). La photo est copiée dans le stockage AVANT l'écriture en
// base; si l'écriture échoue, la copie est supprimée. Le fichier temporaire
// (TempFile) disparaît de toute façon à la fin de la requête.
//
// ============================================================================

use actix_multipart::form::tempfile::TempFile;
use actix_multipart::form::text::Text;
use actix_multipart::form::MultipartForm;
use actix_web::{delete, get, post, put, web, HttpResponse};
use sea_orm::DatabaseConnection;

use crate::config::Config;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::dto::{
    AuthResponse, ChangePasswordRequest, CreateUserRequest, DeleteAllQuery, ListQuery,
    LoginRequest, UpdateUserRequest,
};
use crate::models::parse_enum;
use crate::routes::{confirm_delete_all, read_workbook, ImportForm};
use crate::services::file_store::FileStore;
use crate::services::import::{reconcile, targets::UserTarget};
use crate::services::listing::ListRequest;
use crate::services::notifier::Notifier;
use crate::services::user_service::UserService;
use crate::utils::jwt;

#[derive(MultipartForm)]
pub struct UserForm {
    pub picture: Option<TempFile>,
    #[multipart(rename = "firstName")]
    pub first_name: Option<Text<String>>,
    #[multipart(rename = "lastName")]
    pub last_name: Option<Text<String>>,
    pub code: Option<Text<String>>,
    pub email: Option<Text<String>>,
    pub password: Option<Text<String>>,
    pub post_hr: Option<Text<String>>,
    pub post: Option<Text<String>>,
    pub affectation: Option<Text<String>>,
    pub dept: Option<Text<String>>,
    #[multipart(rename = "projectId")]
    pub project_id: Option<Text<String>>,
    pub role: Option<Text<String>>,
    pub active: Option<Text<String>>,
}

/// Valeur texte d'un champ, None si absent ou vide
fn text(field: Option<Text<String>>) -> Option<String> {
    field
        .map(Text::into_inner)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(field: Option<Text<String>>, name: &str) -> Result<String, AppError> {
    text(field).ok_or_else(|| AppError::validation(format!("{} is required", name)))
}

fn parse_project_id(raw: Option<String>) -> Result<Option<i32>, AppError> {
    raw.map(|value| {
        value
            .parse::<i32>()
            .map_err(|_| AppError::validation(format!("Invalid project id: {}", value)))
    })
    .transpose()
}

/// Champ projectId d'une mise à jour: absent => inchangé, vide ou "null" => désaffecté
fn parse_project_change(field: Option<Text<String>>) -> Result<Option<Option<i32>>, AppError> {
    match field.map(|value| value.into_inner().trim().to_string()) {
        None => Ok(None),
        Some(value) if value.is_empty() || value == "null" => Ok(Some(None)),
        Some(value) => parse_project_id(Some(value)).map(Some),
    }
}

fn parse_bool(raw: Option<String>) -> Result<Option<bool>, AppError> {
    raw.map(|value| match value.to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(AppError::validation(format!("Invalid active value: {}", value))),
    })
    .transpose()
}

fn parse_optional_enum<E>(field: &str, raw: Option<String>) -> Result<Option<E>, AppError>
where
    E: sea_orm::ActiveEnum<Value = String> + sea_orm::Iterable,
{
    raw.map(|value| parse_enum::<E>(field, &value)).transpose()
}

/// Sépare la photo des champs texte
fn split_form(mut form: UserForm) -> (Option<TempFile>, UserForm) {
    let picture = form.picture.take();
    (picture, form)
}

fn create_request(form: UserForm) -> Result<CreateUserRequest, AppError> {
    Ok(CreateUserRequest {
        first_name: required(form.first_name, "firstName")?,
        last_name: required(form.last_name, "lastName")?,
        code: required(form.code, "code")?,
        email: required(form.email, "email")?,
        password: text(form.password),
        post_hr: text(form.post_hr),
        post: parse_enum("post", &required(form.post, "post")?)?,
        affectation: parse_optional_enum("affectation", text(form.affectation))?,
        dept: parse_optional_enum("dept", text(form.dept))?,
        project_id: parse_project_id(text(form.project_id))?,
        role: parse_optional_enum("role", text(form.role))?,
        active: parse_bool(text(form.active))?,
    })
}

fn update_request(form: UserForm) -> Result<UpdateUserRequest, AppError> {
    Ok(UpdateUserRequest {
        first_name: text(form.first_name),
        last_name: text(form.last_name),
        code: text(form.code),
        email: text(form.email),
        post_hr: text(form.post_hr),
        post: parse_optional_enum("post", text(form.post))?,
        affectation: parse_optional_enum("affectation", text(form.affectation))?,
        dept: parse_optional_enum("dept", text(form.dept))?,
        project_id: parse_project_change(form.project_id)?,
        role: parse_optional_enum("role", text(form.role))?,
        active: parse_bool(text(form.active))?,
    })
}

async fn store_optional_picture(
    store: &FileStore,
    picture: Option<TempFile>,
) -> Result<Option<String>, AppError> {
    match picture {
        // Un champ fichier vide (pas de sélection côté client) compte comme absent
        Some(upload) if upload.size > 0 => Ok(Some(store.store_picture(&upload).await?)),
        _ => Ok(None),
    }
}

/// POST /user/register et POST /user
async fn create_user(
    MultipartForm(form): MultipartForm<UserForm>,
    db: web::Data<DatabaseConnection>,
    store: web::Data<FileStore>,
    notifier: web::Data<dyn Notifier>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let (picture, fields) = split_form(form);
    let request = create_request(fields)?;

    // 1. Photo copiée dans le stockage
    let stored = store_optional_picture(&store, picture).await?;

    // 2. Insertion (la photo copiée est supprimée en cas d'échec)
    let created = match UserService::create(db.get_ref(), request, stored.clone()).await {
        Ok(created) => created,
        Err(e) => {
            if let Some(filename) = stored {
                store.remove_quietly(&filename).await;
            }
            return Err(e);
        }
    };

    // 3. Email: un échec n'annule pas la création
    if let Err(e) = UserService::notify_created(notifier.get_ref(), &created).await {
        log::error!("Account email for {} failed: {}", created.user.email, e);
    }

    // 4. Token
    let token = jwt::generate_token(&created.user, &config.jwt_secret).map_err(AppError::internal)?;
    let data = AuthResponse { user: created.user, token };

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "data": data,
        "message": "User created successfully"
    })))
}

#[post("/login")]
pub async fn login(
    body: web::Json<LoginRequest>,
    db: web::Data<DatabaseConnection>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let user = UserService::login(db.get_ref(), &body).await?;
    let token = jwt::generate_token(&user, &config.jwt_secret).map_err(AppError::internal)?;
    let data = AuthResponse { user, token };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": data,
        "message": "Login successful"
    })))
}

/// GET /user/me - Utilisateur du token (PROTÉGÉE)
#[get("/me")]
pub async fn me(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let user = UserService::get(db.get_ref(), auth_user.user_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": user
    })))
}

#[get("")]
pub async fn list_users(
    query: web::Query<ListQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let request = ListRequest::from_query(&query)?;
    let page = UserService::list(db.get_ref(), &request).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[get("/activatestatus/{id}")]
pub async fn toggle_active(
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let user = UserService::toggle_active(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": user,
        "message": "User updated successfully"
    })))
}

#[get("/{id}")]
pub async fn get_user(
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    let user = UserService::get(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": user
    })))
}

#[put("/{id}")]
pub async fn update_user(
    path: web::Path<i32>,
    MultipartForm(form): MultipartForm<UserForm>,
    db: web::Data<DatabaseConnection>,
    store: web::Data<FileStore>,
) -> Result<HttpResponse, AppError> {
    let (picture, fields) = split_form(form);
    let request = update_request(fields)?;

    let stored = store_optional_picture(&store, picture).await?;

    match UserService::update(db.get_ref(), &store, path.into_inner(), request, stored.clone()).await {
        Ok(user) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "data": user,
            "message": "User updated successfully"
        }))),
        Err(e) => {
            if let Some(filename) = stored {
                store.remove_quietly(&filename).await;
            }
            Err(e)
        }
    }
}

#[post("/{id}/password")]
pub async fn change_password(
    path: web::Path<i32>,
    body: web::Json<ChangePasswordRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, AppError> {
    UserService::change_password(db.get_ref(), path.into_inner(), &body).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Password changed successfully"
    })))
}

#[delete("/one/{id}")]
pub async fn delete_user(
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
    store: web::Data<FileStore>,
) -> Result<HttpResponse, AppError> {
    UserService::delete(db.get_ref(), &store, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "User deleted successfully"
    })))
}

#[delete("/all")]
pub async fn delete_all_users(
    query: web::Query<DeleteAllQuery>,
    db: web::Data<DatabaseConnection>,
    store: web::Data<FileStore>,
) -> Result<HttpResponse, AppError> {
    confirm_delete_all(&query)?;

    let deleted = UserService::delete_all(db.get_ref(), &store).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": { "deletedCount": deleted },
        "message": format!("Successfully deleted {} users", deleted)
    })))
}

#[post("/import")]
pub async fn import_users(
    MultipartForm(form): MultipartForm<ImportForm>,
    db: web::Data<DatabaseConnection>,
    notifier: web::Data<dyn Notifier>,
) -> Result<HttpResponse, AppError> {
    let rows = read_workbook(form).await?;

    let target = UserTarget {
        db: db.get_ref(),
        notifier: notifier.get_ref(),
    };
    let report = reconcile(&target, rows).await;
    let imported = report.imported.len();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": report.into_data("users"),
        "message": format!("Imported {} users successfully", imported)
    })))
}

pub fn user_routes(cfg: &mut web::ServiceConfig) {
    // /me et /activatestatus avant /{id}
    cfg.service(
        web::scope("/user")
            .route("/register", web::post().to(create_user))
            .route("", web::post().to(create_user))
            .service(login)
            .service(import_users)
            .service(me)
            .service(list_users)
            .service(toggle_active)
            .service(delete_all_users)
            .service(delete_user)
            .service(get_user)
            .service(update_user)
            .service(change_password)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test as atest, App};

    fn form() -> UserForm {
        UserForm {
            picture: None,
            first_name: Some(Text("Amira".to_string())),
            last_name: Some(Text("Ben Salah".to_string())),
            code: Some(Text("E042".to_string())),
            email: Some(Text("amira@example.com".to_string())),
            password: Some(Text("".to_string())),
            post_hr: None,
            post: Some(Text("Ingénieur Test".to_string())),
            affectation: None,
            dept: Some(Text("CPE".to_string())),
            project_id: Some(Text("12".to_string())),
            role: None,
            active: Some(Text("false".to_string())),
        }
    }

    #[test]
    fn test_create_request_from_form() {
        let request = create_request(form()).unwrap();
        assert_eq!(request.password, None);
        assert_eq!(request.post, crate::models::users::Post::IngenieurTest);
        assert_eq!(request.dept, Some(crate::models::users::Dept::Cpe));
        assert_eq!(request.project_id, Some(12));
        assert_eq!(request.active, Some(false));
    }

    #[test]
    fn test_create_request_reports_missing_field() {
        let mut missing = form();
        missing.code = None;
        let err = create_request(missing).err().unwrap();
        assert_eq!(err.to_string(), "code is required");

        let mut bad_project = form();
        bad_project.project_id = Some(Text("abc".to_string()));
        assert!(matches!(create_request(bad_project), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_update_request_ignores_blank_fields() {
        let mut update = form();
        update.first_name = Some(Text("  ".to_string()));
        let request = update_request(update).unwrap();
        assert_eq!(request.first_name, None);
        assert_eq!(request.code, Some("E042".to_string()));
        assert_eq!(request.project_id, Some(Some(12)));
    }

    #[test]
    fn test_update_request_project_is_tri_state() {
        let mut absent = form();
        absent.project_id = None;
        assert_eq!(update_request(absent).unwrap().project_id, None);

        for cleared in ["", "  ", "null"] {
            let mut update = form();
            update.project_id = Some(Text(cleared.to_string()));
            assert_eq!(update_request(update).unwrap().project_id, Some(None), "{:?}", cleared);
        }

        let mut bad = form();
        bad.project_id = Some(Text("abc".to_string()));
        assert!(matches!(update_request(bad), Err(AppError::Validation(_))));
    }

    #[actix_web::test]
    async fn test_me_requires_token() {
        let config = Config::from_lookup(|name| match name {
            "DATABASE_URL" => Some("postgres://localhost/test".to_string()),
            "JWT_SECRET" => Some("secret".to_string()),
            _ => None,
        })
        .unwrap();

        let app = atest::init_service(
            App::new()
                .app_data(web::Data::new(DatabaseConnection::Disconnected))
                .app_data(web::Data::new(config))
                .configure(crate::routes::configure_routes),
        )
        .await;

        let req = atest::TestRequest::get().uri("/api/user/me").to_request();
        let resp = atest::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }
}
