use jsonwebtoken::{encode, decode, Header, Validation, EncodingKey, DecodingKey, Algorithm};
use serde::{Deserialize, Serialize};
use chrono::{Utc, Duration};

use crate::models::users;

/// Durée de validité d'un token
const TOKEN_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,        // user_id
    pub email: String,
    pub name: String,
    pub role: users::Role,
    pub picture: String,
    pub exp: i64,        // expiration timestamp
}

impl Claims {
    pub fn for_user(user: &users::Model) -> Result<Self, String> {
        let expiration = Utc::now()
            .checked_add_signed(Duration::hours(TOKEN_HOURS))
            .ok_or("Failed to calculate expiration")?
            .timestamp();

        Ok(Self {
            sub: user.id,
            email: user.email.clone(),
            name: user.full_name(),
            role: user.role,
            picture: user.picture.clone(),
            exp: expiration,
        })
    }
}

/// Génère un JWT token pour un utilisateur
pub fn generate_token(user: &users::Model, secret: &str) -> Result<String, String> {
    let claims = Claims::for_user(user)?;

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
        .map_err(|e| format!("Failed to generate token: {}", e))
}

/// Vérifie et décode un JWT token
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )
        .map(|data| data.claims)
        .map_err(|e| format!("Invalid token: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::{Affectation, Dept, Post, Role};

    fn sample_user() -> users::Model {
        users::Model {
            id: 123,
            first_name: "Amal".to_string(),
            last_name: "Ben Salah".to_string(),
            code: "E042".to_string(),
            email: "amal@example.com".to_string(),
            post_hr: "Sampling".to_string(),
            post: Post::TechnicienTest,
            affectation: Affectation::Indirect,
            dept: Dept::Ppe,
            project_id: None,
            role: Role::Admin,
            password_hash: String::new(),
            picture: users::DEFAULT_PICTURE.to_string(),
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_generate_and_verify_token() {
        let token = generate_token(&sample_user(), "test-secret").unwrap();
        let claims = verify_token(&token, "test-secret").unwrap();

        assert_eq!(claims.sub, 123);
        assert_eq!(claims.name, "Amal Ben Salah");
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = generate_token(&sample_user(), "test-secret").unwrap();
        assert!(verify_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_invalid_token() {
        let result = verify_token("invalid.token.here", "test-secret");
        assert!(result.is_err());
    }
}
