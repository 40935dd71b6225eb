//! Notification gateway: transactional email over an HTTP mail API
//!
//! Sends verification, password-change, account-deletion, marketing, and
//! label-sharing mail through a Brevo-style JSON endpoint. Callers decide
//! whether a send failure is fatal; most flows log and move on.

use anyhow::Result;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody {
    sender: EmailAddress,
    to: Vec<EmailAddress>,
    subject: String,
    text_content: String,
}

/// Mail gateway configuration
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// HTTP endpoint of the mail provider
    pub api_url: String,
    /// Provider API key
    pub api_key: String,
    /// Sender address
    pub sender_email: String,
    /// Optional sender display name
    pub sender_name: Option<String>,
}

impl MailConfig {
    /// Create a new MailConfig from environment variables
    ///
    /// # Environment Variables
    /// - `MAIL_API_URL`: Provider endpoint (default: Brevo transactional API)
    /// - `MAIL_API_KEY`: Provider API key
    /// - `MAIL_SENDER_EMAIL`: Sender address
    /// - `MAIL_SENDER_NAME`: Sender display name (optional)
    pub fn from_env() -> Result<Self> {
        let api_url = std::env::var("MAIL_API_URL")
            .unwrap_or_else(|_| "https://api.brevo.com/v3/smtp/email".to_string());
        let api_key = std::env::var("MAIL_API_KEY")
            .map_err(|_| anyhow::anyhow!("MAIL_API_KEY environment variable not set"))?;
        let sender_email = std::env::var("MAIL_SENDER_EMAIL")
            .map_err(|_| anyhow::anyhow!("MAIL_SENDER_EMAIL environment variable not set"))?;
        let sender_name = std::env::var("MAIL_SENDER_NAME").ok();

        Ok(Self {
            api_url,
            api_key,
            sender_email,
            sender_name,
        })
    }
}

/// Mail gateway
#[derive(Clone)]
pub struct Mailer {
    http: reqwest::Client,
    config: MailConfig,
}

impl Mailer {
    /// Create a new mail gateway
    pub fn new(config: MailConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Send one plain-text email
    pub async fn send(&self, to: &str, subject: &str, text: &str) -> Result<()> {
        let body = SendEmailBody {
            sender: EmailAddress {
                email: self.config.sender_email.clone(),
                name: self.config.sender_name.clone(),
            },
            to: vec![EmailAddress {
                email: to.to_string(),
                name: None,
            }],
            subject: subject.to_string(),
            text_content: text.to_string(),
        };

        let response = self
            .http
            .post(&self.config.api_url)
            .header("api-key", &self.config.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Mail send failed (status={}): {}",
                status,
                detail
            ));
        }

        info!("Sent mail \"{}\" to {}", subject, to);
        Ok(())
    }
}

/// Verification mail sent on registration
pub fn verification_message(frontend_url: &str, email: &str, token: &str) -> (String, String) {
    let link = format!("{frontend_url}/verify?token={token}&email={email}");
    (
        "Email Verification".to_string(),
        format!("Click on the following link to verify your email: {link}"),
    )
}

/// Notification mail sent after a password change
pub fn password_changed_message() -> (String, String) {
    (
        "Password Changed".to_string(),
        "The password of your MoveOut account was just changed. If this was not you, contact support immediately.".to_string(),
    )
}

/// Confirmation-request mail for the two-phase account deletion
pub fn deletion_request_message(frontend_url: &str, email: &str, token: &str) -> (String, String) {
    let link = format!("{frontend_url}/confirm-delete?token={token}&email={email}");
    (
        "Confirm Account Deletion".to_string(),
        format!(
            "Click on the following link to permanently delete your MoveOut account and all of its labels: {link}"
        ),
    )
}

/// Final mail sent once an account has been deleted
pub fn deletion_done_message() -> (String, String) {
    (
        "Account Deleted".to_string(),
        "Your MoveOut account, labels, and media have been permanently deleted.".to_string(),
    )
}

/// Label-sharing mail, including the PIN for private labels
pub fn share_label_message(
    frontend_url: &str,
    label_id: i64,
    label_name: &str,
    pin: Option<&str>,
) -> (String, String) {
    let link = format!("{frontend_url}/description/{label_id}");
    let body = match pin {
        Some(pin) => format!(
            "A MoveOut label \"{label_name}\" was shared with you: {link}\nThis label is private; its PIN is {pin}."
        ),
        None => format!("A MoveOut label \"{label_name}\" was shared with you: {link}"),
    };
    ("A label was shared with you".to_string(), body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_matches_provider_contract() {
        let body = SendEmailBody {
            sender: EmailAddress {
                email: "noreply@moveout.example".to_string(),
                name: Some("MoveOut".to_string()),
            },
            to: vec![EmailAddress {
                email: "a@x.com".to_string(),
                name: None,
            }],
            subject: "Hello".to_string(),
            text_content: "World".to_string(),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["sender"]["email"], "noreply@moveout.example");
        assert_eq!(json["sender"]["name"], "MoveOut");
        assert_eq!(json["to"][0]["email"], "a@x.com");
        assert_eq!(json["subject"], "Hello");
        assert_eq!(json["textContent"], "World");
        // Absent names are omitted entirely
        assert!(json["to"][0].get("name").is_none());
    }

    #[test]
    fn test_verification_message_embeds_token_and_email() {
        let (subject, body) = verification_message("https://moveout.example", "a@x.com", "tok123");
        assert_eq!(subject, "Email Verification");
        assert!(body.contains("https://moveout.example/verify?token=tok123&email=a@x.com"));
    }

    #[test]
    fn test_share_message_includes_pin_only_for_private() {
        let (_, private_body) =
            share_label_message("https://moveout.example", 9, "Box1", Some("123456"));
        assert!(private_body.contains("https://moveout.example/description/9"));
        assert!(private_body.contains("123456"));

        let (_, public_body) = share_label_message("https://moveout.example", 9, "Box1", None);
        assert!(!public_body.contains("PIN"));
    }
}
