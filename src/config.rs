use crate::utils::AppError;
use std::env;

/// Credentials for one OAuth provider. `None` in `AppConfig` disables it.
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Runtime configuration, read once at startup from the environment (`.env` honored).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub production: bool,
    pub frontend_url: String,
    pub cors_allowed_origins: Vec<String>,
    pub openai_api_key: String,
    pub openai_model: String,
    pub resend_api_key: String,
    pub email_from: String,
    pub contact_inbox: String,
    pub google: Option<OAuthClientConfig>,
    pub github: Option<OAuthClientConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let frontend_url = var_or("FRONTEND_URL", "http://localhost:3000");
        let production = var_or("APP_ENV", "development").eq_ignore_ascii_case("production");

        let jwt_secret = var_or("JWT_SECRET", "default-secret-change-me");
        if production && jwt_secret == "default-secret-change-me" {
            return Err(AppError::Config("JWT_SECRET must be set in production".to_string()));
        }

        let port = var_or("PORT", "3000")
            .parse::<u16>()
            .map_err(|_| AppError::Config("PORT must be a valid port number".to_string()))?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| vec![frontend_url.clone()]);

        Ok(Self {
            host: var_or("HOST", "0.0.0.0"),
            port,
            database_url: require("DATABASE_URL")?,
            jwt_secret,
            jwt_issuer: var_or("JWT_ISSUER", "profession-predictor"),
            jwt_audience: var_or("JWT_AUDIENCE", "profession-predictor-web"),
            production,
            google: oauth_client("GOOGLE", &frontend_url, "google"),
            github: oauth_client("GITHUB", &frontend_url, "github"),
            frontend_url,
            cors_allowed_origins,
            openai_api_key: var_or("OPENAI_API_KEY", ""),
            openai_model: var_or("OPENAI_MODEL", "gpt-3.5-turbo"),
            resend_api_key: var_or("RESEND_API_KEY", ""),
            email_from: var_or("EMAIL_FROM", "Profession Predictor <onboarding@resend.dev>"),
            contact_inbox: var_or("CONTACT_INBOX", "support@profession-predictor.app"),
        })
    }

    /// Cookies carry the `Secure` attribute only in production.
    pub fn secure_cookies(&self) -> bool {
        self.production
    }
}

fn require(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::Config(format!("{} must be set", key)))
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn oauth_client(prefix: &str, frontend_url: &str, provider: &str) -> Option<OAuthClientConfig> {
    let client_id = env::var(format!("{}_CLIENT_ID", prefix)).ok()?;
    let client_secret = env::var(format!("{}_CLIENT_SECRET", prefix)).ok()?;
    let redirect_uri = env::var(format!("{}_REDIRECT_URI", prefix))
        .unwrap_or_else(|_| format!("{}/api/auth/callback/{}", frontend_url, provider));

    Some(OAuthClientConfig {
        client_id,
        client_secret,
        redirect_uri,
    })
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            database_url: "mongodb://localhost:27017/profession_predictor_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "profession-predictor".to_string(),
            jwt_audience: "profession-predictor-web".to_string(),
            production: false,
            frontend_url: "http://localhost:3000".to_string(),
            cors_allowed_origins: vec!["http://localhost:3000".to_string()],
            openai_api_key: String::new(),
            openai_model: "gpt-3.5-turbo".to_string(),
            resend_api_key: String::new(),
            email_from: "Profession Predictor <onboarding@resend.dev>".to_string(),
            contact_inbox: "inbox@example.com".to_string(),
            google: None,
            github: None,
        }
    }
}
