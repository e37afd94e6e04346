// Taxonomie d'erreurs de l'API.
// Chaque handler retourne Result<HttpResponse, AppError>; la conversion en
// enveloppe JSON {success: false, message} se fait dans ResponseError.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    DuplicateKey(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Upload(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Database error: {0}")]
    Database(DbErr),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Traduit une violation d'unicité en DuplicateKey avec un message métier
    /// ("Asset number already exists", ...), sinon erreur BD brute
    pub fn from_db(err: DbErr, duplicate_message: &str) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                Self::DuplicateKey(duplicate_message.to_string())
            }
            _ => Self::Database(err),
        }
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => Self::DuplicateKey(detail),
            _ => Self::Database(err),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(first_validation_message(&errors))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::DuplicateKey(_) | Self::Upload(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            log::error!("{}", self);
        }
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "success": false,
            "message": self.to_string()
        }))
    }
}

/// Premier champ en échec, sous la forme "firstName: First name must be at least 2 characters"
fn first_validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by_key(|(name, _)| name.to_string());

    for (field, kind) in fields {
        if let ValidationErrorsKind::Field(list) = kind {
            if let Some(first) = list.first() {
                return match &first.message {
                    Some(message) => message.to_string(),
                    None => format!("{}: invalid value ({})", field, first.code),
                };
            }
        }
    }

    "Validation failed".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 2, message = "First name must be at least 2 characters"))]
        first_name: String,
        #[validate(email)]
        email: String,
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::DuplicateKey("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Upload("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::internal("x").status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_validation_message_uses_first_field() {
        let sample = Sample {
            first_name: "A".to_string(),
            email: "not-an-email".to_string(),
        };
        let err: AppError = sample.validate().unwrap_err().into();

        // "email" < "first_name" dans l'ordre alphabétique
        match err {
            AppError::Validation(msg) => assert_eq!(msg, "email: invalid value (email)"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_custom_db_error_is_not_duplicate() {
        let err = AppError::from_db(DbErr::Custom("boom".into()), "Asset number already exists");
        assert!(matches!(err, AppError::Database(_)));
    }
}
