use crate::{
    config::{AppConfig, OAuthClientConfig},
    database::MongoDB,
    models::AuthProvider,
    services::auth_service::{self, OAuthProfile, SessionResponse},
    utils::AppError,
};
use lazy_static::lazy_static;
use std::time::Duration;
use uuid::Uuid;

const GOOGLE_AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

const GITHUB_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USER_URL: &str = "https://api.github.com/user";
const GITHUB_EMAILS_URL: &str = "https://api.github.com/user/emails";

// GitHub rejects API calls without a User-Agent
const USER_AGENT: &str = concat!("profession-predictor/", env!("CARGO_PKG_VERSION"));

lazy_static! {
    static ref HTTP_CLIENT: reqwest::Client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());
}

/// Credentials for `provider`, or an error when the provider is not configured.
pub fn client_for(config: &AppConfig, provider: AuthProvider) -> Result<&OAuthClientConfig, AppError> {
    let client = match provider {
        AuthProvider::Google => config.google.as_ref(),
        AuthProvider::Github => config.github.as_ref(),
        AuthProvider::Credentials => None,
    };

    client.ok_or_else(|| {
        AppError::NotFound(format!("{} sign-in is not configured", provider.as_str()))
    })
}

/// Random CSRF state carried through the provider round-trip.
pub fn new_state() -> String {
    Uuid::new_v4().to_string()
}

pub fn authorize_url(provider: AuthProvider, client: &OAuthClientConfig, state: &str) -> String {
    let (base, params): (&str, Vec<(&str, &str)>) = match provider {
        AuthProvider::Github => (
            GITHUB_AUTHORIZE_URL,
            vec![
                ("client_id", client.client_id.as_str()),
                ("redirect_uri", client.redirect_uri.as_str()),
                ("scope", "read:user user:email"),
                ("state", state),
            ],
        ),
        _ => (
            GOOGLE_AUTHORIZE_URL,
            vec![
                ("client_id", client.client_id.as_str()),
                ("redirect_uri", client.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
                ("prompt", "select_account"),
            ],
        ),
    };

    let query_string = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", base, query_string)
}

/// Exchanges the authorization code, fetches the profile and signs the user in.
pub async fn complete_sign_in(
    db: &MongoDB,
    config: &AppConfig,
    provider: AuthProvider,
    code: &str,
) -> Result<SessionResponse, AppError> {
    let client = client_for(config, provider)?;
    let access_token = exchange_code(provider, client, code).await?;
    let profile = fetch_profile(provider, &access_token).await?;

    auth_service::oauth_sign_in(db, config, provider, &profile).await
}

async fn exchange_code(
    provider: AuthProvider,
    client: &OAuthClientConfig,
    code: &str,
) -> Result<String, AppError> {
    let url = match provider {
        AuthProvider::Github => GITHUB_TOKEN_URL,
        _ => GOOGLE_TOKEN_URL,
    };

    let response = HTTP_CLIENT
        .post(url)
        .header("Accept", "application/json")
        .form(&[
            ("code", code),
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("redirect_uri", client.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        log::warn!("⚠️  {} token exchange returned {}", provider.as_str(), response.status());
        return Err(AppError::Unauthorized(
            "Failed to exchange authorization code".to_string(),
        ));
    }

    let tokens: serde_json::Value = response.json().await?;
    access_token_from(&tokens)
}

fn access_token_from(tokens: &serde_json::Value) -> Result<String, AppError> {
    if let Some(error) = tokens["error"].as_str() {
        return Err(AppError::Unauthorized(format!("OAuth error: {}", error)));
    }

    tokens["access_token"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| AppError::Unauthorized("No access token in response".to_string()))
}

async fn fetch_profile(provider: AuthProvider, access_token: &str) -> Result<OAuthProfile, AppError> {
    match provider {
        AuthProvider::Github => {
            let user: serde_json::Value = get_json(GITHUB_USER_URL, access_token).await?;
            let mut profile = profile_from_github(&user);

            // Users with a private email need the emails endpoint
            if profile.email.is_none() {
                let emails = get_json(GITHUB_EMAILS_URL, access_token).await?;
                profile.email = primary_github_email(&emails);
            }
            Ok(profile)
        }
        _ => {
            let user = get_json(GOOGLE_USERINFO_URL, access_token).await?;
            Ok(profile_from_google(&user))
        }
    }
}

async fn get_json(url: &str, access_token: &str) -> Result<serde_json::Value, AppError> {
    let response = HTTP_CLIENT
        .get(url)
        .bearer_auth(access_token)
        .header("Accept", "application/json")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(AppError::External(format!(
            "Profile request to {} failed with {}",
            url,
            response.status()
        )));
    }

    Ok(response.json().await?)
}

fn non_empty(value: &serde_json::Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn profile_from_google(user: &serde_json::Value) -> OAuthProfile {
    OAuthProfile {
        email: non_empty(&user["email"]),
        name: non_empty(&user["name"]),
    }
}

fn profile_from_github(user: &serde_json::Value) -> OAuthProfile {
    OAuthProfile {
        email: non_empty(&user["email"]),
        name: non_empty(&user["name"]).or_else(|| non_empty(&user["login"])),
    }
}

/// The primary verified address, falling back to any verified one.
fn primary_github_email(emails: &serde_json::Value) -> Option<String> {
    let emails = emails.as_array()?;
    let verified = || {
        emails
            .iter()
            .filter(|e| e["verified"].as_bool().unwrap_or(false))
    };

    verified()
        .find(|e| e["primary"].as_bool().unwrap_or(false))
        .or_else(|| verified().next())
        .and_then(|e| non_empty(&e["email"]))
}
