use crate::config::AppConfig;
use crate::utils::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Validity window printed in the verification email. Must match the code expiry.
pub const VERIFY_CODE_VALIDITY_TEXT: &str = "1 hour";

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

/// Result of a send attempt. Email failures never abort the caller.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct EmailOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EmailOutcome {
    pub fn sent(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            error: None,
        }
    }

    pub fn failed(message: &str, error: String) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            error: Some(error),
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers the email; returns the provider's message id.
    async fn send(&self, email: &OutgoingEmail) -> Result<String, String>;
}

#[derive(Debug, Deserialize)]
struct ResendSuccess {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ResendError {
    message: String,
}

/// Transactional email through the Resend HTTP API
#[derive(Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
}

impl ResendMailer {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<String, String> {
        if self.api_key.is_empty() {
            return Err("RESEND_API_KEY is not configured".to_string());
        }

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await
            .map_err(|e| format!("Failed to reach Resend: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ResendError>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(format!("Resend API error ({}): {}", status, message));
        }

        let sent: ResendSuccess = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse Resend response: {}", e))?;

        Ok(sent.id)
    }
}

pub async fn send_verification_email(
    mailer: &dyn Mailer,
    config: &AppConfig,
    email: &str,
    username: &str,
    otp: &str,
) -> EmailOutcome {
    log::info!("📧 Sending verification email to {} for user {}", email, username);

    let message = OutgoingEmail {
        from: config.email_from.clone(),
        to: vec![email.to_string()],
        subject: "Verify your Profession Predictor account".to_string(),
        html: render_verification_email(&config.frontend_url, username, otp),
        reply_to: None,
    };

    match mailer.send(&message).await {
        Ok(id) => {
            log::info!("✅ Verification email sent: {}", id);
            EmailOutcome::sent("Verification email sent successfully")
        }
        Err(e) => {
            log::error!("❌ Failed to send verification email to {}: {}", email, e);
            EmailOutcome::failed("Failed to send verification email", e)
        }
    }
}

#[derive(Debug, Deserialize, Clone, utoipa::ToSchema)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

/// Forwards a contact-form submission to the support inbox.
pub async fn send_contact_message(
    mailer: &dyn Mailer,
    config: &AppConfig,
    request: &ContactRequest,
) -> Result<String, AppError> {
    let name = request.name.trim();
    let email = request.email.trim();
    let body = request.message.trim();
    if name.is_empty() || email.is_empty() || body.is_empty() {
        return Err(AppError::validation("Missing required fields"));
    }

    let message = OutgoingEmail {
        from: config.email_from.clone(),
        to: vec![config.contact_inbox.clone()],
        subject: format!("New message from {}", name),
        html: format!(
            "<h1>New message from {}</h1>\n<p>Email: {}</p>\n<p>Message: {}</p>",
            escape_html(name),
            escape_html(email),
            escape_html(body)
        ),
        reply_to: Some(email.to_string()),
    };

    mailer
        .send(&message)
        .await
        .map_err(AppError::External)
}

pub fn render_verification_email(frontend_url: &str, username: &str, otp: &str) -> String {
    let name = escape_html(username);
    let verify_url = format!(
        "{}/verify/{}",
        frontend_url.trim_end_matches('/'),
        urlencoding::encode(username)
    );

    format!(
        r#"<!DOCTYPE html>
<html>
  <body style="background-color:#ffffff;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif">
    <div style="margin:0 auto;padding:20px 0 48px;width:580px">
      <h1 style="color:#333;font-size:24px;font-weight:bold">Welcome, {name}!</h1>
      <p style="color:#333;font-size:16px;line-height:26px">We're thrilled to have you on board. To get started, please verify your account using the code below:</p>
      <p style="text-align:center;font-size:36px;font-weight:bold;color:#0070f3;letter-spacing:4px">{otp}</p>
      <p style="color:#333;font-size:16px;line-height:26px">This code is valid for {validity}. Enter it on the verification page to activate your account.</p>
      <p style="padding:27px 0"><a href="{verify_url}" style="background-color:#0070f3;border-radius:3px;color:#fff;font-size:16px;text-decoration:none;display:block;width:170px;text-align:center">Verify Account</a></p>
      <p style="color:#333;font-size:16px;line-height:26px">If you didn't request this email, please ignore it.</p>
      <p style="color:#898989;font-size:14px;line-height:24px">Best regards,<br/>The Profession Predictor Team</p>
    </div>
  </body>
</html>"#,
        name = name,
        otp = escape_html(otp),
        validity = VERIFY_CODE_VALIDITY_TEXT,
        verify_url = verify_url,
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingMailer;
    use super::*;

    #[test]
    fn test_verification_email_contents() {
        let html = render_verification_email("http://localhost:3000/", "alice", "123456");
        assert!(html.contains("Welcome, alice!"));
        assert!(html.contains("123456"));
        assert!(html.contains("http://localhost:3000/verify/alice"));
        assert!(html.contains("valid for 1 hour"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>\"x\"&'y'</b>"), "&lt;b&gt;&quot;x&quot;&amp;&#39;y&#39;&lt;/b&gt;");
    }

    #[actix_rt::test]
    async fn test_send_verification_email_success() {
        let mailer = RecordingMailer::default();
        let config = AppConfig::for_tests();

        let outcome = send_verification_email(&mailer, &config, "a@example.com", "alice", "654321").await;

        assert!(outcome.success);
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["a@example.com".to_string()]);
        assert_eq!(sent[0].subject, "Verify your Profession Predictor account");
    }

    #[actix_rt::test]
    async fn test_send_verification_email_failure_is_reported() {
        let mailer = RecordingMailer {
            fail_with: Some("domain not verified".to_string()),
            ..Default::default()
        };
        let config = AppConfig::for_tests();

        let outcome = send_verification_email(&mailer, &config, "a@example.com", "alice", "654321").await;

        assert!(!outcome.success);
        assert_eq!(outcome.message, "Failed to send verification email");
        assert_eq!(outcome.error.as_deref(), Some("domain not verified"));
    }

    #[actix_rt::test]
    async fn test_contact_requires_all_fields() {
        let mailer = RecordingMailer::default();
        let config = AppConfig::for_tests();
        let request = ContactRequest {
            name: "Bob".to_string(),
            email: "".to_string(),
            message: "Hi".to_string(),
        };

        let result = send_contact_message(&mailer, &config, &request).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn test_contact_goes_to_inbox() {
        let mailer = RecordingMailer::default();
        let config = AppConfig::for_tests();
        let request = ContactRequest {
            name: "Bob".to_string(),
            email: "bob@example.com".to_string(),
            message: "<script>hi</script>".to_string(),
        };

        send_contact_message(&mailer, &config, &request).await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent[0].to, vec!["inbox@example.com".to_string()]);
        assert_eq!(sent[0].subject, "New message from Bob");
        assert_eq!(sent[0].reply_to.as_deref(), Some("bob@example.com"));
        assert!(!sent[0].html.contains("<script>"));
    }
}
