use crate::{
    config::AppConfig,
    database::MongoDB,
    models::{AuthProvider, User, UserInfo},
    services::{email_service, email_service::Mailer, validation},
    utils::{otp, AppError},
};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// How long an emailed verification code stays valid.
pub const VERIFY_CODE_TTL_MINUTES: i64 = 60;
pub const SESSION_TTL_DAYS: i64 = 7;

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub sub: String, // user _id (hex)
    pub username: String,
    pub email: String,
    pub is_verified: bool,
    pub provider: String,
    pub iat: usize,
    pub exp: usize,
    pub jti: String,
    pub aud: String,
    pub iss: String,
}

// Request/Response structures
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SignUpRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_error: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct VerifyCodeRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub code: String,
}

/// Outcome of comparing a submitted code against the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeCheck {
    Valid,
    Expired,
    Mismatch,
    AlreadyVerified,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SignInRequest {
    /// Email address or username
    #[serde(alias = "email", default)]
    pub identifier: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SessionResponse {
    pub success: bool,
    pub token: String,
    pub user: UserInfo,
}

/// Profile returned by an OAuth provider, reduced to what account provisioning needs.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthProfile {
    pub email: Option<String>,
    pub name: Option<String>,
}

// ==================== SESSION TOKENS ====================

pub fn generate_jwt(config: &AppConfig, user: &User) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id_hex(),
        username: user.username.clone(),
        email: user.email.clone(),
        is_verified: user.is_verified,
        provider: user.provider.as_str().to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::days(SESSION_TTL_DAYS)).timestamp() as usize,
        jti: Uuid::new_v4().to_string(),
        aud: config.jwt_audience.clone(),
        iss: config.jwt_issuer.clone(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_ref()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
}

pub fn verify_token(config: &AppConfig, token: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[config.jwt_audience.clone()]);

    let mut issuers = HashSet::new();
    issuers.insert(config.jwt_issuer.clone());
    validation.iss = Some(issuers);

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_ref()),
        &validation,
    )?;
    Ok(data.claims)
}

fn session_for(config: &AppConfig, user: &User) -> Result<SessionResponse, AppError> {
    Ok(SessionResponse {
        success: true,
        token: generate_jwt(config, user)?,
        user: UserInfo::from(user),
    })
}

// ==================== VERIFICATION CODES ====================

pub fn code_expiry_from(now_millis: i64) -> BsonDateTime {
    BsonDateTime::from_millis(now_millis + VERIFY_CODE_TTL_MINUTES * 60 * 1000)
}

/// Expiry is checked before the code itself, so a stale correct code reports `Expired`.
pub fn check_code(user: &User, code: &str, now_millis: i64) -> CodeCheck {
    if user.is_verified {
        return CodeCheck::AlreadyVerified;
    }

    let not_expired = user
        .verify_code_expires
        .map(|expires| expires.timestamp_millis() > now_millis)
        .unwrap_or(false);
    if !not_expired {
        return CodeCheck::Expired;
    }

    match &user.verify_code {
        Some(stored) if stored == code => CodeCheck::Valid,
        _ => CodeCheck::Mismatch,
    }
}

// ==================== SIGN UP ====================

pub async fn sign_up(
    db: &MongoDB,
    mailer: &dyn Mailer,
    config: &AppConfig,
    request: &SignUpRequest,
) -> Result<SignUpResponse, AppError> {
    let username = request.username.trim();
    let email = request.email.trim().to_lowercase();
    validation::validate_sign_up(username, &email, &request.password)?;

    let users = db.users();

    let taken = users
        .find_one(doc! { "username": username, "is_verified": true })
        .await?;
    if taken.is_some() {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }

    let existing = users.find_one(doc! { "email": &email }).await?;
    if existing.as_ref().is_some_and(|user| user.is_verified) {
        return Err(AppError::Conflict("Email already exists".to_string()));
    }

    // Only verified accounts own a username; a pending sign-up under another email gives it up
    let released = users
        .delete_many(doc! {
            "username": username,
            "is_verified": false,
            "email": { "$ne": &email },
        })
        .await?;
    if released.deleted_count > 0 {
        log::info!("♻️  Released username {} from unverified account", username);
    }

    let verify_code = otp::generate_otp();
    let now = BsonDateTime::now();
    let expires = code_expiry_from(now.timestamp_millis());
    let hashed_password = hash(&request.password, DEFAULT_COST)?;

    match existing {
        Some(existing) => {
            // Unverified account: take it over with the new details and a fresh code
            users
                .update_one(
                    doc! { "_id": existing.id },
                    doc! {
                        "$set": {
                            "username": username,
                            "password": &hashed_password,
                            "verify_code": &verify_code,
                            "verify_code_expires": expires,
                            "updated_at": now,
                        }
                    },
                )
                .await?;

            let outcome =
                email_service::send_verification_email(mailer, config, &email, username, &verify_code)
                    .await;
            if !outcome.success {
                return Err(AppError::External(outcome.message));
            }

            log::info!("✅ Re-registered unverified account: {}", email);
            Ok(SignUpResponse {
                success: true,
                message: "User registered successfully, please verify your email".to_string(),
                email_error: None,
            })
        }
        None => {
            let new_user = User {
                id: None,
                username: username.to_string(),
                email: email.clone(),
                password: hashed_password,
                verify_code: Some(verify_code.clone()),
                verify_code_expires: Some(expires),
                is_verified: false,
                is_accepting_messages: true,
                messages: Vec::new(),
                provider: AuthProvider::Credentials,
                created_at: Some(now),
                updated_at: Some(now),
            };
            users.insert_one(&new_user).await?;

            log::info!("✅ User registered: {} ({})", username, email);

            let outcome =
                email_service::send_verification_email(mailer, config, &email, username, &verify_code)
                    .await;
            if !outcome.success {
                // The account exists; the user can ask for a new code by signing up again
                return Ok(SignUpResponse {
                    success: true,
                    message: "User registered successfully, but there was an issue sending the verification email. Please contact support.".to_string(),
                    email_error: outcome.error,
                });
            }

            Ok(SignUpResponse {
                success: true,
                message: "User registered successfully, please verify your email".to_string(),
                email_error: None,
            })
        }
    }
}

// ==================== VERIFY CODE ====================

/// Returns the success message; every failure is an `AppError`.
pub async fn verify_code(db: &MongoDB, request: &VerifyCodeRequest) -> Result<String, AppError> {
    validation::validate_verification(&request.username, &request.code)?;

    let username = urlencoding::decode(&request.username)
        .map(|u| u.into_owned())
        .unwrap_or_else(|_| request.username.clone());

    let users = db.users();
    let user = users
        .find_one(doc! { "username": &username })
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    match check_code(&user, &request.code, Utc::now().timestamp_millis()) {
        CodeCheck::AlreadyVerified => Ok("Account is already verified".to_string()),
        CodeCheck::Expired => Err(AppError::validation("Verification code has expired")),
        CodeCheck::Mismatch => Err(AppError::validation("Invalid verification code")),
        CodeCheck::Valid => {
            users
                .update_one(
                    doc! { "_id": user.id },
                    doc! {
                        "$set": { "is_verified": true, "updated_at": BsonDateTime::now() },
                        "$unset": { "verify_code": "", "verify_code_expires": "" },
                    },
                )
                .await?;
            log::info!("✅ User verified: {}", username);
            Ok("User verified successfully".to_string())
        }
    }
}

// ==================== USERNAME CHECK ====================

pub async fn check_username_unique(db: &MongoDB, username: Option<&str>) -> Result<String, AppError> {
    validation::validate_username_query(username)?;
    let username = username.unwrap_or_default();

    let existing = db
        .users()
        .find_one(doc! { "username": username, "is_verified": true })
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }

    Ok("Username is unique and available".to_string())
}

// ==================== SIGN IN ====================

pub async fn sign_in(
    db: &MongoDB,
    config: &AppConfig,
    request: &SignInRequest,
) -> Result<SessionResponse, AppError> {
    let identifier = request.identifier.trim();
    if identifier.is_empty() || request.password.is_empty() {
        return Err(AppError::validation("Invalid credentials"));
    }

    let user = db
        .users()
        .find_one(doc! {
            "$or": [
                { "email": identifier.to_lowercase() },
                { "username": identifier },
            ]
        })
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    if !user.is_verified {
        return Err(AppError::Unauthorized("User not verified".to_string()));
    }

    if !verify(&request.password, &user.password)? {
        return Err(AppError::Unauthorized("Invalid password".to_string()));
    }

    session_for(config, &user)
}

// ==================== OAUTH ====================

/// Username derived from an OAuth display name: whitespace removed, lowercased.
pub fn username_from_profile(name: Option<&str>, now_millis: i64) -> String {
    name.map(|n| {
        n.chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase()
    })
    .filter(|n| !n.is_empty())
    .unwrap_or_else(|| format!("user_{}", now_millis))
}

/// Signs in (or provisions) the local account behind an OAuth identity.
/// Accounts created here are verified immediately.
pub async fn oauth_sign_in(
    db: &MongoDB,
    config: &AppConfig,
    provider: AuthProvider,
    profile: &OAuthProfile,
) -> Result<SessionResponse, AppError> {
    let email = profile
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| {
            AppError::Unauthorized(format!("{} account has no email address", provider.as_str()))
        })?;

    let users = db.users();

    if let Some(existing) = users.find_one(doc! { "email": &email }).await? {
        log::info!("✅ OAuth sign-in for existing user {} via {}", existing.username, provider.as_str());
        return session_for(config, &existing);
    }

    let base = username_from_profile(profile.name.as_deref(), Utc::now().timestamp_millis());
    let mut username = base.clone();
    let mut suffix = 1;
    while users.find_one(doc! { "username": &username }).await?.is_some() {
        username = format!("{}{}", base, suffix);
        suffix += 1;
    }

    let now = BsonDateTime::now();
    let mut new_user = User {
        id: Some(ObjectId::new()),
        username,
        email: email.clone(),
        password: hash(otp::random_secret(8), DEFAULT_COST)?,
        verify_code: None,
        verify_code_expires: None,
        is_verified: true,
        is_accepting_messages: true,
        messages: Vec::new(),
        provider,
        created_at: Some(now),
        updated_at: Some(now),
    };

    let inserted = users.insert_one(&new_user).await?;
    new_user.id = inserted.inserted_id.as_object_id().or(new_user.id);

    log::info!("✅ Created {} user {} ({})", provider.as_str(), new_user.username, email);

    session_for(config, &new_user)
}

// ==================== SESSION ====================

pub async fn get_current_user(db: &MongoDB, claims: &Claims) -> Result<UserInfo, AppError> {
    let id = ObjectId::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid session".to_string()))?;

    let user = db
        .users()
        .find_one(doc! { "_id": id })
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(UserInfo::from(&user))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(code: Option<&str>, expires_millis: Option<i64>, verified: bool) -> User {
        User {
            id: Some(ObjectId::new()),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "hash".to_string(),
            verify_code: code.map(str::to_string),
            verify_code_expires: expires_millis.map(BsonDateTime::from_millis),
            is_verified: verified,
            is_accepting_messages: true,
            messages: Vec::new(),
            provider: AuthProvider::Credentials,
            created_at: None,
            updated_at: None,
        }
    }

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_valid_code() {
        let u = user(Some("123456"), Some(NOW + 1000), false);
        assert_eq!(check_code(&u, "123456", NOW), CodeCheck::Valid);
    }

    #[test]
    fn test_mismatched_code() {
        let u = user(Some("123456"), Some(NOW + 1000), false);
        assert_eq!(check_code(&u, "654321", NOW), CodeCheck::Mismatch);
    }

    #[test]
    fn test_expired_code_reported_before_mismatch() {
        let u = user(Some("123456"), Some(NOW - 1), false);
        assert_eq!(check_code(&u, "123456", NOW), CodeCheck::Expired);
        assert_eq!(check_code(&u, "000000", NOW), CodeCheck::Expired);
        // expiry instant itself is already expired
        let u = user(Some("123456"), Some(NOW), false);
        assert_eq!(check_code(&u, "123456", NOW), CodeCheck::Expired);
    }

    #[test]
    fn test_missing_code_is_expired() {
        let u = user(None, None, false);
        assert_eq!(check_code(&u, "123456", NOW), CodeCheck::Expired);
    }

    #[test]
    fn test_already_verified() {
        let u = user(None, None, true);
        assert_eq!(check_code(&u, "123456", NOW), CodeCheck::AlreadyVerified);
    }

    #[test]
    fn test_code_expiry_is_one_hour() {
        assert_eq!(code_expiry_from(NOW).timestamp_millis(), NOW + 3_600_000);
    }

    #[test]
    fn test_jwt_round_trip() {
        let config = AppConfig::for_tests();
        let mut u = user(None, None, true);
        u.provider = AuthProvider::Github;

        let token = generate_jwt(&config, &u).unwrap();
        let claims = verify_token(&config, &token).unwrap();

        assert_eq!(claims.sub, u.id_hex());
        assert_eq!(claims.username, "alice");
        assert!(claims.is_verified);
        assert_eq!(claims.provider, "github");
        assert_eq!(claims.exp - claims.iat, (SESSION_TTL_DAYS * 24 * 3600) as usize);
    }

    #[test]
    fn test_jwt_rejects_other_secret() {
        let config = AppConfig::for_tests();
        let token = generate_jwt(&config, &user(None, None, true)).unwrap();

        let mut other = AppConfig::for_tests();
        other.jwt_secret = "another-secret".to_string();
        assert!(matches!(
            verify_token(&other, &token),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_jwt_rejects_other_audience() {
        let config = AppConfig::for_tests();
        let token = generate_jwt(&config, &user(None, None, true)).unwrap();

        let mut other = AppConfig::for_tests();
        other.jwt_audience = "someone-else".to_string();
        assert!(verify_token(&other, &token).is_err());
    }

    #[test]
    fn test_username_from_profile() {
        assert_eq!(username_from_profile(Some("Ada Lovelace"), NOW), "adalovelace");
        assert_eq!(username_from_profile(Some("   "), NOW), format!("user_{}", NOW));
        assert_eq!(username_from_profile(None, NOW), format!("user_{}", NOW));
    }

    #[test]
    fn test_sign_in_request_accepts_email_key() {
        let request: SignInRequest = serde_json::from_value(serde_json::json!({
            "email": "alice",
            "password": "Secret123"
        }))
        .unwrap();
        assert_eq!(request.identifier, "alice");
    }

    #[test]
    fn test_password_hash_verifies() {
        let hashed = hash("Secur3pass", 4).unwrap();
        assert!(verify("Secur3pass", &hashed).unwrap());
        assert!(!verify("wrong", &hashed).unwrap());
    }

    #[actix_rt::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_sign_up_verify_sign_in_flow() {
        use crate::services::email_service::testing::RecordingMailer;

        dotenv::dotenv().ok();
        let config = AppConfig::for_tests();
        let db = MongoDB::new(&config.database_url).await.unwrap();
        let mailer = RecordingMailer::default();

        let username = format!("flow{}", Utc::now().timestamp_millis() % 1_000_000);
        let email = format!("{}@example.com", username);
        db.users().delete_many(doc! { "email": &email }).await.unwrap();

        let response = sign_up(
            &db,
            &mailer,
            &config,
            &SignUpRequest {
                username: username.clone(),
                email: email.clone(),
                password: "Secur3pass".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(response.success);
        assert!(response.email_error.is_none());

        // Not verified yet
        let attempt = sign_in(
            &db,
            &config,
            &SignInRequest {
                identifier: email.clone(),
                password: "Secur3pass".to_string(),
            },
        )
        .await;
        assert!(matches!(attempt, Err(AppError::Unauthorized(ref m)) if m == "User not verified"));

        let stored = db
            .users()
            .find_one(doc! { "email": &email })
            .await
            .unwrap()
            .unwrap();
        let code = stored.verify_code.unwrap();

        let message = verify_code(
            &db,
            &VerifyCodeRequest {
                username: username.clone(),
                code,
            },
        )
        .await
        .unwrap();
        assert_eq!(message, "User verified successfully");

        let session = sign_in(
            &db,
            &config,
            &SignInRequest {
                identifier: username.clone(),
                password: "Secur3pass".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(session.user.email, email);
        assert!(verify_token(&config, &session.token).is_ok());

        db.users().delete_many(doc! { "email": &email }).await.unwrap();
    }

    #[actix_rt::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_rejected_sign_up_keeps_pending_account() {
        use crate::services::email_service::testing::RecordingMailer;

        dotenv::dotenv().ok();
        let config = AppConfig::for_tests();
        let db = MongoDB::new(&config.database_url).await.unwrap();
        let mailer = RecordingMailer::default();

        let suffix = Utc::now().timestamp_millis() % 1_000_000;
        let username = format!("alice{}", suffix);
        let pending_email = format!("pending{}@example.com", suffix);
        let verified_email = format!("verified{}@example.com", suffix);
        db.users()
            .delete_many(doc! { "email": { "$in": [&pending_email, &verified_email] } })
            .await
            .unwrap();

        let pending = sign_up(
            &db,
            &mailer,
            &config,
            &SignUpRequest {
                username: username.clone(),
                email: pending_email.clone(),
                password: "Secur3pass".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(pending.success);

        let now = BsonDateTime::now();
        db.users()
            .insert_one(&User {
                id: None,
                username: format!("other{}", suffix),
                email: verified_email.clone(),
                password: hash("Secur3pass", 4).unwrap(),
                verify_code: None,
                verify_code_expires: None,
                is_verified: true,
                is_accepting_messages: true,
                messages: Vec::new(),
                provider: AuthProvider::Credentials,
                created_at: Some(now),
                updated_at: Some(now),
            })
            .await
            .unwrap();

        let rejected = sign_up(
            &db,
            &mailer,
            &config,
            &SignUpRequest {
                username: username.clone(),
                email: verified_email.clone(),
                password: "Secur3pass".to_string(),
            },
        )
        .await;
        assert!(matches!(rejected, Err(AppError::Conflict(ref m)) if m == "Email already exists"));

        let still_pending = db
            .users()
            .find_one(doc! { "email": &pending_email })
            .await
            .unwrap();
        assert!(still_pending.is_some_and(|user| user.username == username && !user.is_verified));

        db.users()
            .delete_many(doc! { "email": { "$in": [&pending_email, &verified_email] } })
            .await
            .unwrap();
    }
}
