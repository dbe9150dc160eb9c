use crate::{
    api::auth::log_failure,
    config::AppConfig,
    database::MongoDB,
    middleware::RequestIdentity,
    services::guest_service::{self, GuestCheckResponse, GuestHistory, PredictionsCountResponse},
    utils::cookies,
};
use actix_web::{web, HttpResponse, ResponseError};

#[utoipa::path(
    post,
    path = "/api/guest-login",
    tag = "Guest",
    responses(
        (status = 200, description = "Guest session started or resumed; guestId cookie set"),
        (status = 400, description = "Already signed in")
    )
)]
pub async fn guest_login(
    db: web::Data<MongoDB>,
    config: web::Data<AppConfig>,
    identity: RequestIdentity,
) -> HttpResponse {
    log::info!("👤 POST /api/guest-login");

    match guest_service::create_session(&db, &identity).await {
        Ok(session) => {
            let message = if session.created {
                "Guest session created"
            } else {
                "Guest session resumed"
            };
            HttpResponse::Ok()
                .cookie(cookies::guest_cookie(&session.guest_id, config.secure_cookies()))
                .json(serde_json::json!({
                    "success": true,
                    "message": message,
                    "guestId": session.guest_id,
                }))
        }
        Err(e) => {
            log_failure("Guest login", "-", &e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/guest-check",
    tag = "Guest",
    responses((status = 200, description = "Whether the request carries a guest session", body = GuestCheckResponse))
)]
pub async fn guest_check(identity: RequestIdentity) -> HttpResponse {
    HttpResponse::Ok().json(guest_service::check(&identity))
}

#[utoipa::path(
    post,
    path = "/api/guest-logout",
    tag = "Guest",
    responses((status = 200, description = "guestId cookie cleared"))
)]
pub async fn guest_logout(identity: RequestIdentity) -> HttpResponse {
    if let RequestIdentity::Guest(guest_id) = &identity {
        log::info!("👋 Guest session ended: {}", guest_id);
    }

    HttpResponse::Ok()
        .cookie(cookies::removal_cookie(cookies::GUEST_COOKIE))
        .json(serde_json::json!({
            "success": true,
            "message": "Guest session ended",
        }))
}

#[utoipa::path(
    get,
    path = "/api/predictions-count",
    tag = "Guest",
    responses((status = 200, description = "Predictions used by this guest", body = PredictionsCountResponse))
)]
pub async fn predictions_count(db: web::Data<MongoDB>, identity: RequestIdentity) -> HttpResponse {
    match guest_service::predictions_count(&db, &identity).await {
        Ok(count) => HttpResponse::Ok().json(PredictionsCountResponse { count }),
        Err(e) => {
            log_failure("Predictions count", "-", &e);
            e.error_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/guest/predictions",
    tag = "Guest",
    responses(
        (status = 200, description = "Past predictions of this guest", body = GuestHistory),
        (status = 401, description = "No guest session"),
        (status = 404, description = "Guest session not found")
    )
)]
pub async fn guest_history(db: web::Data<MongoDB>, identity: RequestIdentity) -> HttpResponse {
    log::info!("📜 GET /api/guest/predictions");

    match guest_service::history(&db, &identity).await {
        Ok(history) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "predictions": history.predictions,
            "remainingPredictions": history.remaining_predictions,
        })),
        Err(e) => {
            log_failure("Guest history", "-", &e);
            e.error_response()
        }
    }
}
