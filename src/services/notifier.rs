// Notification "compte créé" envoyée après la création d'un utilisateur
// (inscription ou import). Un échec est remonté à l'appelant mais n'annule
// jamais la création.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::error::AppError;
use crate::models::users::Role;

#[derive(Debug, Clone)]
pub struct AccountNotice {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub password: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn account_created(&self, notice: &AccountNotice) -> Result<(), AppError>;
}

/// Envoi SMTP (relay TLS + identifiants)
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    app_url: String,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig, app_url: &str) -> Result<Self, AppError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| AppError::internal(format!("Invalid SMTP relay {}: {}", config.host, e)))?
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .build();

        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| AppError::internal(format!("Invalid SMTP_FROM address: {}", e)))?;

        Ok(Self {
            transport,
            from,
            app_url: app_url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn account_created(&self, notice: &AccountNotice) -> Result<(), AppError> {
        let to = notice
            .email
            .parse::<Mailbox>()
            .map_err(|e| AppError::internal(format!("Invalid recipient {}: {}", notice.email, e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject("New Account Created")
            .header(ContentType::TEXT_HTML)
            .body(render_account_email(notice, &self.app_url))
            .map_err(|e| AppError::internal(format!("Failed to build email: {}", e)))?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| AppError::internal(format!("Error sending account creation email: {}", e)))?;

        log::info!("Email sent to {}: {}", notice.email, response.code());
        Ok(())
    }
}

/// Sans SMTP configuré: la notification est seulement journalisée
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn account_created(&self, notice: &AccountNotice) -> Result<(), AppError> {
        log::info!(
            "SMTP not configured, account email for {} ({}) not sent",
            notice.email,
            notice.role.as_str()
        );
        Ok(())
    }
}

pub fn render_account_email(notice: &AccountNotice, app_url: &str) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; padding: 20px; background-color: #f5f5f5;">
  <div style="max-width: 600px; margin: 0 auto; background-color: white; border-radius: 10px; padding: 20px;">
    <h1 style="text-align: center; color: #3d3d3d; margin-bottom: 40px;">Welcome to Our App!</h1>
    <p style="font-size: 18px; color: #3d3d3d;">Dear {first} {last},</p>
    <p style="font-size: 18px; color: #3d3d3d;">
      Your new account has been successfully created in our App as a(n) <strong>{role}</strong>.
    </p>
    <p style="font-size: 18px; color: #3d3d3d;">
      Please keep your password in a safe place. You can change your password anytime by logging into your account.
    </p>
    <p style="font-size: 18px; color: #3d3d3d;">Here is your password: <strong>{password}</strong></p>
    <div style="text-align: center; margin-top: 40px;">
      <a href="{url}" style="display: inline-block; background-color: #0066ff; color: white; font-size: 18px; padding: 12px 30px; text-decoration: none; border-radius: 30px;">Check out our App</a>
    </div>
    <p style="font-size: 16px; color: #666; margin-top: 40px;">Thank you for using our App!</p>
  </div>
</div>"#,
        first = escape_html(&notice.first_name),
        last = escape_html(&notice.last_name),
        role = notice.role.as_str(),
        password = escape_html(&notice.password),
        url = app_url,
    )
}

fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notice() -> AccountNotice {
        AccountNotice {
            email: "sami@example.com".to_string(),
            first_name: "Sami".to_string(),
            last_name: "<Trabelsi>".to_string(),
            role: Role::User,
            password: "aB3$xyz!".to_string(),
        }
    }

    #[test]
    fn test_email_contains_credentials_and_link() {
        let html = render_account_email(&notice(), "http://localhost:5173/");
        assert!(html.contains("Dear Sami &lt;Trabelsi&gt;,"));
        assert!(html.contains("<strong>user</strong>"));
        assert!(html.contains("<strong>aB3$xyz!</strong>"));
        assert!(html.contains(r#"href="http://localhost:5173/""#));
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier.account_created(&notice()).await.is_ok());
    }
}
