use crate::{
    config::AppConfig,
    database::MongoDB,
    models::{AuthProvider, UserInfo},
    services::{
        auth_service::{self, Claims, SessionResponse, SignInRequest, SignUpRequest, SignUpResponse, VerifyCodeRequest},
        email_service::Mailer,
        oauth_service, validation,
    },
    utils::{cookies, AppError},
};
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use serde::Deserialize;

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UsernameQuery {
    pub username: Option<String>,
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/signUp",
    tag = "Auth",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "User registered, verification email sent", body = SignUpResponse),
        (status = 400, description = "Invalid input, or username / email already taken"),
        (status = 500, description = "Verification email could not be re-sent")
    )
)]
pub async fn sign_up(
    db: web::Data<MongoDB>,
    mailer: web::Data<dyn Mailer>,
    config: web::Data<AppConfig>,
    request: web::Json<SignUpRequest>,
) -> HttpResponse {
    log::info!("📝 POST /api/signUp - username: {}, email: {}", request.username, request.email);

    match auth_service::sign_up(&db, mailer.get_ref(), &config, &request).await {
        Ok(response) => {
            if let Some(email_error) = &response.email_error {
                log::warn!("⚠️  Registered {} without verification email: {}", request.username, email_error);
            }
            HttpResponse::Created().json(response)
        }
        // The re-sent email failed; tell the client which step broke
        Err(AppError::External(message)) => {
            log::error!("❌ Sign-up failed for {}: {}", request.email, message);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "success": false,
                "message": message,
            }))
        }
        Err(e) => {
            log_failure("Sign-up", &request.username, &e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/verifyCode",
    tag = "Auth",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Account verified"),
        (status = 400, description = "Invalid input, expired or wrong code"),
        (status = 404, description = "User not found")
    )
)]
pub async fn verify_code(
    db: web::Data<MongoDB>,
    request: web::Json<VerifyCodeRequest>,
) -> HttpResponse {
    log::info!("🔑 POST /api/verifyCode - username: {}", request.username);

    if let Err(AppError::Validation(errors)) =
        validation::validate_verification(&request.username, &request.code)
    {
        log::warn!("❌ Invalid verification input: {:?}", errors);
        return HttpResponse::BadRequest().json(serde_json::json!({
            "success": false,
            "message": "Invalid input",
            "errors": errors,
        }));
    }

    match auth_service::verify_code(&db, &request).await {
        Ok(message) => {
            log::info!("✅ {}: {}", message, request.username);
            HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "message": message,
            }))
        }
        Err(e) => {
            log_failure("Verification", &request.username, &e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/checkUsernameUnique",
    tag = "Auth",
    params(UsernameQuery),
    responses(
        (status = 200, description = "Username is available"),
        (status = 400, description = "Invalid or taken username")
    )
)]
pub async fn check_username_unique(
    db: web::Data<MongoDB>,
    query: web::Query<UsernameQuery>,
) -> HttpResponse {
    let username = query.username.as_deref();
    log::debug!("🔍 GET /api/checkUsernameUnique - username: {:?}", username);

    match auth_service::check_username_unique(&db, username).await {
        Ok(message) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "message": message,
        })),
        Err(e) => {
            log_failure("Username check", username.unwrap_or_default(), &e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/signin",
    tag = "Auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in; session cookie set", body = SessionResponse),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Unknown user, unverified account or wrong password")
    )
)]
pub async fn sign_in(
    db: web::Data<MongoDB>,
    config: web::Data<AppConfig>,
    request: web::Json<SignInRequest>,
) -> HttpResponse {
    log::info!("🔐 POST /api/auth/signin - identifier: {}", request.identifier);

    match auth_service::sign_in(&db, &config, &request).await {
        Ok(session) => {
            log::info!("✅ Sign-in successful: {}", session.user.username);
            HttpResponse::Ok()
                .cookie(cookies::session_cookie(&session.token, config.secure_cookies()))
                .json(session)
        }
        Err(e) => {
            log_failure("Sign-in", &request.identifier, &e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/signout",
    tag = "Auth",
    responses((status = 200, description = "Session cookie cleared"))
)]
pub async fn sign_out() -> HttpResponse {
    log::info!("👋 POST /api/auth/signout");

    HttpResponse::Ok()
        .cookie(cookies::removal_cookie(cookies::SESSION_COOKIE))
        .json(serde_json::json!({
            "success": true,
            "message": "Signed out successfully",
        }))
}

#[utoipa::path(
    get,
    path = "/api/auth/session",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = UserInfo),
        (status = 401, description = "No valid session")
    ),
    security(("bearer_auth" = []))
)]
pub async fn session(db: web::Data<MongoDB>, claims: web::ReqData<Claims>) -> HttpResponse {
    log::info!("👤 GET /api/auth/session - user: {}", claims.username);

    match auth_service::get_current_user(&db, &claims).await {
        Ok(user) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "user": user,
        })),
        Err(e) => {
            log_failure("Session lookup", &claims.username, &e);
            e.error_response()
        }
    }
}

/// Redirects the browser to the provider's consent screen.
#[utoipa::path(
    get,
    path = "/api/auth/oauth/{provider}",
    tag = "Auth",
    params(("provider" = String, Path, description = "google or github")),
    responses(
        (status = 302, description = "Redirect to the provider"),
        (status = 404, description = "Unknown or unconfigured provider")
    )
)]
pub async fn oauth_start(config: web::Data<AppConfig>, path: web::Path<String>) -> HttpResponse {
    let provider_name = path.into_inner();
    log::info!("🔐 GET /api/auth/oauth/{}", provider_name);

    let Some(provider) = AuthProvider::oauth_from_str(&provider_name) else {
        log::warn!("❌ Unknown OAuth provider: {}", provider_name);
        return AppError::NotFound(format!("Unknown provider: {}", provider_name)).error_response();
    };

    let client = match oauth_service::client_for(&config, provider) {
        Ok(client) => client,
        Err(e) => {
            log::warn!("❌ OAuth start rejected: {}", e);
            return e.error_response();
        }
    };

    let state = oauth_service::new_state();
    let url = oauth_service::authorize_url(provider, client, &state);

    HttpResponse::Found()
        .cookie(cookies::oauth_state_cookie(&state, config.secure_cookies()))
        .append_header(("Location", url))
        .finish()
}

pub async fn oauth_callback(
    db: web::Data<MongoDB>,
    config: web::Data<AppConfig>,
    path: web::Path<String>,
    query: web::Query<CallbackQuery>,
    req: HttpRequest,
) -> HttpResponse {
    let provider_name = path.into_inner();
    log::info!("🔐 GET /api/auth/callback/{} - Processing OAuth", provider_name);

    let redirect_error = |error: &str| {
        HttpResponse::Found()
            .cookie(cookies::removal_cookie(cookies::OAUTH_STATE_COOKIE))
            .append_header((
                "Location",
                format!("{}/sign-in?error={}", config.frontend_url, urlencoding::encode(error)),
            ))
            .finish()
    };

    let Some(provider) = AuthProvider::oauth_from_str(&provider_name) else {
        log::warn!("❌ Unknown OAuth provider: {}", provider_name);
        return redirect_error("unknown_provider");
    };

    if let Some(error) = &query.error {
        log::error!("❌ OAuth error from {}: {}", provider_name, error);
        return redirect_error(error);
    }

    let expected_state = req.cookie(cookies::OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    if expected_state.is_none() || expected_state != query.state {
        log::warn!("❌ OAuth state mismatch for {}", provider_name);
        return redirect_error("invalid_state");
    }

    let Some(code) = &query.code else {
        log::error!("❌ No authorization code provided");
        return redirect_error("no_code");
    };

    match oauth_service::complete_sign_in(&db, &config, provider, code).await {
        Ok(session) => {
            log::info!("✅ {} OAuth successful: {}", provider.as_str(), session.user.username);
            HttpResponse::Found()
                .cookie(cookies::removal_cookie(cookies::OAUTH_STATE_COOKIE))
                .cookie(cookies::session_cookie(&session.token, config.secure_cookies()))
                .append_header(("Location", config.frontend_url.clone()))
                .finish()
        }
        Err(e) => {
            log::error!("❌ {} OAuth failed: {}", provider.as_str(), e);
            redirect_error(&e.client_message())
        }
    }
}

/// Client mistakes are warnings, server-side failures are errors.
pub(crate) fn log_failure(action: &str, subject: &str, e: &AppError) {
    if e.status_code().is_server_error() {
        log::error!("❌ {} failed: {} - {}", action, subject, e);
    } else {
        log::warn!("❌ {} failed: {} - {}", action, subject, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OAuthClientConfig;
    use crate::services::email_service::testing::RecordingMailer;
    use actix_web::{http::StatusCode, test as actix_test, App};
    use mongodb::bson::doc;
    use std::sync::Arc;

    fn app_config() -> AppConfig {
        let mut config = AppConfig::for_tests();
        config.google = Some(OAuthClientConfig {
            client_id: "client-123".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:3000/api/auth/callback/google".to_string(),
        });
        config
    }

    #[actix_web::test]
    async fn test_sign_out_clears_cookie() {
        let app = actix_test::init_service(
            App::new().route("/api/auth/signout", web::post().to(sign_out)),
        )
        .await;

        let req = actix_test::TestRequest::post().uri("/api/auth/signout").to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);

        let cookie = res
            .response()
            .cookies()
            .find(|c| c.name() == cookies::SESSION_COOKIE)
            .unwrap();
        assert_eq!(cookie.value(), "");
    }

    #[actix_web::test]
    async fn test_oauth_start_redirects_with_state() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(app_config()))
                .route("/api/auth/oauth/{provider}", web::get().to(oauth_start)),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/api/auth/oauth/google").to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::FOUND);

        let location = res.headers().get("Location").unwrap().to_str().unwrap();
        let state = res
            .response()
            .cookies()
            .find(|c| c.name() == cookies::OAUTH_STATE_COOKIE)
            .unwrap()
            .value()
            .to_string();
        assert!(location.starts_with("https://accounts.google.com/"));
        assert!(location.contains(&format!("state={}", state)));
    }

    #[actix_web::test]
    async fn test_oauth_start_unknown_or_unconfigured_provider() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(app_config()))
                .route("/api/auth/oauth/{provider}", web::get().to(oauth_start)),
        )
        .await;

        for uri in ["/api/auth/oauth/myspace", "/api/auth/oauth/github"] {
            let req = actix_test::TestRequest::get().uri(uri).to_request();
            let res = actix_test::call_service(&app, req).await;
            assert_eq!(res.status(), StatusCode::NOT_FOUND, "{}", uri);
        }
    }

    macro_rules! sign_up_app {
        ($db:expr, $mailer:expr) => {
            actix_test::init_service(
                App::new()
                    .app_data(web::Data::new($db.clone()))
                    .app_data(web::Data::from($mailer))
                    .app_data(web::Data::new(AppConfig::for_tests()))
                    .route("/api/signUp", web::post().to(sign_up)),
            )
            .await
        };
    }

    fn failing_mailer() -> Arc<dyn Mailer> {
        Arc::new(RecordingMailer {
            fail_with: Some("domain not verified".to_string()),
            ..Default::default()
        })
    }

    #[actix_web::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_sign_up_with_failed_email_is_still_created() {
        let config = AppConfig::for_tests();
        let db = MongoDB::new(&config.database_url).await.unwrap();
        let username = format!("mailfail{}", chrono::Utc::now().timestamp_millis() % 1_000_000);
        let email = format!("{}@example.com", username);
        db.users().delete_many(doc! { "email": &email }).await.unwrap();

        let app = sign_up_app!(db, failing_mailer());
        let req = actix_test::TestRequest::post()
            .uri("/api/signUp")
            .set_json(serde_json::json!({
                "username": &username,
                "email": &email,
                "password": "Secur3pass"
            }))
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CREATED);

        let body: serde_json::Value = actix_test::read_body_json(res).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["emailError"], "domain not verified");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("issue sending the verification email"));

        let stored = db.users().find_one(doc! { "email": &email }).await.unwrap();
        assert!(stored.is_some_and(|user| !user.is_verified));

        db.users().delete_many(doc! { "email": &email }).await.unwrap();
    }

    #[actix_web::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_re_sign_up_with_failed_email_is_server_error() {
        let config = AppConfig::for_tests();
        let db = MongoDB::new(&config.database_url).await.unwrap();
        let username = format!("resend{}", chrono::Utc::now().timestamp_millis() % 1_000_000);
        let email = format!("{}@example.com", username);
        db.users().delete_many(doc! { "email": &email }).await.unwrap();

        let body = serde_json::json!({
            "username": &username,
            "email": &email,
            "password": "Secur3pass"
        });

        // First registration goes through
        let mailer: Arc<dyn Mailer> = Arc::new(RecordingMailer::default());
        let app = sign_up_app!(db, mailer);
        let req = actix_test::TestRequest::post()
            .uri("/api/signUp")
            .set_json(&body)
            .to_request();
        assert_eq!(actix_test::call_service(&app, req).await.status(), StatusCode::CREATED);

        // Same unverified email again, but the mailer is down
        let app = sign_up_app!(db, failing_mailer());
        let req = actix_test::TestRequest::post()
            .uri("/api/signUp")
            .set_json(&body)
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response: serde_json::Value = actix_test::read_body_json(res).await;
        assert_eq!(
            response,
            serde_json::json!({ "success": false, "message": "Failed to send verification email" })
        );

        db.users().delete_many(doc! { "email": &email }).await.unwrap();
    }
}
