use crate::config::AppConfig;
use crate::services::auth_service::{self, Claims};
use crate::utils::{cookies, AppError};
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, FromRequest, HttpMessage, HttpRequest,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};

/// Who is making the request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestIdentity {
    User(Claims),
    Guest(String),
    Anonymous,
}

/// Session token from the `session_token` cookie, or a `Bearer` Authorization header.
pub fn session_token(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(cookies::SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// A valid user session wins over a guest cookie; an invalid token is ignored.
pub fn resolve_identity(req: &HttpRequest, config: &AppConfig) -> RequestIdentity {
    if let Some(token) = session_token(req) {
        match auth_service::verify_token(config, &token) {
            Ok(claims) => return RequestIdentity::User(claims),
            Err(e) => log::debug!("Ignoring invalid session token: {}", e),
        }
    }

    match req.cookie(cookies::GUEST_COOKIE) {
        Some(cookie) if !cookie.value().is_empty() => {
            RequestIdentity::Guest(cookie.value().to_string())
        }
        _ => RequestIdentity::Anonymous,
    }
}

impl FromRequest for RequestIdentity {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let identity = match req.app_data::<web::Data<AppConfig>>() {
            Some(config) => Ok(resolve_identity(req, config)),
            None => Err(Error::from(AppError::Config(
                "AppConfig is not registered".to_string(),
            ))),
        };
        ready(identity)
    }
}

/// Rejects requests without a valid user session and exposes the `Claims`
/// to handlers through `web::ReqData<Claims>`.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService { service }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let config = match req.app_data::<web::Data<AppConfig>>() {
            Some(config) => config.clone(),
            None => {
                return Box::pin(async move {
                    Err(Error::from(AppError::Config(
                        "AppConfig is not registered".to_string(),
                    )))
                })
            }
        };

        let token = match session_token(req.request()) {
            Some(token) => token,
            None => {
                return Box::pin(async move {
                    Err(Error::from(AppError::Unauthorized(
                        "Missing session".to_string(),
                    )))
                })
            }
        };

        match auth_service::verify_token(&config, &token) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
                let fut = self.service.call(req);
                Box::pin(async move {
                    let res = fut.await?;
                    Ok(res)
                })
            }
            Err(e) => {
                log::warn!("❌ Rejected session: {}", e);
                Box::pin(async move {
                    Err(Error::from(AppError::Unauthorized(
                        "Invalid or expired session".to_string(),
                    )))
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthProvider, User};
    use actix_web::{test as actix_test, web::Bytes, App, HttpResponse};
    use mongodb::bson::oid::ObjectId;

    fn token(config: &AppConfig) -> String {
        let user = User {
            id: Some(ObjectId::new()),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "hash".to_string(),
            verify_code: None,
            verify_code_expires: None,
            is_verified: true,
            is_accepting_messages: true,
            messages: Vec::new(),
            provider: AuthProvider::Credentials,
            created_at: None,
            updated_at: None,
        };
        auth_service::generate_jwt(config, &user).unwrap()
    }

    #[actix_web::test]
    async fn test_resolve_prefers_user_session() {
        let config = AppConfig::for_tests();
        let req = actix_test::TestRequest::default()
            .cookie(cookies::guest_cookie("g1", false))
            .insert_header(("Authorization", format!("Bearer {}", token(&config))))
            .to_http_request();

        match resolve_identity(&req, &config) {
            RequestIdentity::User(claims) => assert_eq!(claims.username, "alice"),
            other => panic!("expected user, got {:?}", other),
        }
    }

    #[actix_web::test]
    async fn test_resolve_falls_back_to_guest_on_bad_token() {
        let config = AppConfig::for_tests();
        let req = actix_test::TestRequest::default()
            .cookie(cookies::guest_cookie("g1", false))
            .cookie(cookies::session_cookie("not-a-jwt", false))
            .to_http_request();

        assert_eq!(
            resolve_identity(&req, &config),
            RequestIdentity::Guest("g1".to_string())
        );
    }

    #[actix_web::test]
    async fn test_resolve_anonymous() {
        let config = AppConfig::for_tests();
        let req = actix_test::TestRequest::default().to_http_request();
        assert_eq!(resolve_identity(&req, &config), RequestIdentity::Anonymous);
    }

    async fn whoami(claims: web::ReqData<Claims>) -> HttpResponse {
        HttpResponse::Ok().body(claims.username.clone())
    }

    #[actix_web::test]
    async fn test_middleware_accepts_session_cookie() {
        let config = AppConfig::for_tests();
        let jwt = token(&config);
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .service(
                    web::scope("/private")
                        .wrap(AuthMiddleware)
                        .route("", web::get().to(whoami)),
                ),
        )
        .await;

        let req = actix_test::TestRequest::get()
            .uri("/private")
            .cookie(cookies::session_cookie(&jwt, false))
            .to_request();
        let body = actix_test::call_and_read_body(&app, req).await;
        assert_eq!(body, Bytes::from_static(b"alice"));
    }

    #[actix_web::test]
    async fn test_middleware_rejects_missing_session() {
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::new(AppConfig::for_tests()))
                .service(
                    web::scope("/private")
                        .wrap(AuthMiddleware)
                        .route("", web::get().to(whoami)),
                ),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/private").to_request();
        let res = actix_test::try_call_service(&app, req).await;
        let status = match res {
            Ok(res) => res.status(),
            Err(e) => e.as_response_error().status_code(),
        };
        assert_eq!(status, actix_web::http::StatusCode::UNAUTHORIZED);
    }
}
