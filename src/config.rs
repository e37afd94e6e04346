// ============================================================================
// CONFIGURATION
// ============================================================================
//
// Description:
//   Configuration explicite de l'application, lue une seule fois au
//   démarrage (après dotenv) puis partagée via web::Data<Config>.
//   Aucun module ne relit les variables d'environnement ensuite.
//
// Variables:
//   - DATABASE_URL (obligatoire)
//   - JWT_SECRET (obligatoire)
//   - HOST / PORT (défaut 127.0.0.1:8080)
//   - UPLOAD_DIR (défaut "uploads")
//   - APP_URL (lien dans les emails)
//   - SMTP_HOST, SMTP_USERNAME, SMTP_PASSWORD, SMTP_FROM (optionnelles)
//
// ============================================================================

use std::env;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in .env file")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub app_url: String,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Construit la config à partir d'une fonction de lookup (testable sans toucher à l'env)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw,
            })?,
            None => 8080,
        };

        // SMTP seulement si les 4 variables sont présentes
        let smtp = match (
            lookup("SMTP_HOST"),
            lookup("SMTP_USERNAME"),
            lookup("SMTP_PASSWORD"),
            lookup("SMTP_FROM"),
        ) {
            (Some(host), Some(username), Some(password), Some(from)) => Some(SmtpConfig {
                host,
                username,
                password,
                from,
            }),
            _ => None,
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            upload_dir: PathBuf::from(lookup("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string())),
            app_url: lookup("APP_URL").unwrap_or_else(|| "http://localhost:5173/".to_string()),
            smtp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/tracker"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert!(config.smtp.is_none());
    }

    #[test]
    fn test_missing_secret() {
        let result = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://x")]));
        assert!(matches!(result, Err(ConfigError::Missing("JWT_SECRET"))));
    }

    #[test]
    fn test_invalid_port() {
        let result = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("PORT", "abc"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid { name: "PORT", .. })));
    }

    #[test]
    fn test_smtp_requires_all_fields() {
        let partial = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("SMTP_HOST", "smtp.example.com"),
        ]))
        .unwrap();
        assert!(partial.smtp.is_none());

        let full = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USERNAME", "bot"),
            ("SMTP_PASSWORD", "pw"),
            ("SMTP_FROM", "bot@example.com"),
        ]))
        .unwrap();
        assert_eq!(full.smtp.unwrap().host, "smtp.example.com");
    }
}
