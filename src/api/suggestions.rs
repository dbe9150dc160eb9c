use crate::{
    api::auth::log_failure,
    database::MongoDB,
    middleware::RequestIdentity,
    models::{CareerResult, ProfileAnswers},
    services::{llm_client::CompletionProvider, suggestion_service},
    utils::AppError,
};
use actix_web::{web, HttpResponse, ResponseError};

#[utoipa::path(
    post,
    path = "/api/suggestProfession",
    tag = "Suggestions",
    request_body = ProfileAnswers,
    responses(
        (status = 200, description = "Estimated IQ and the three best-matching professions", body = CareerResult),
        (status = 400, description = "A required questionnaire answer is missing"),
        (status = 403, description = "Guest prediction limit reached"),
        (status = 500, description = "The AI call failed")
    )
)]
pub async fn suggest_profession(
    db: web::Data<MongoDB>,
    llm: web::Data<dyn CompletionProvider>,
    identity: RequestIdentity,
    answers: web::Json<ProfileAnswers>,
) -> HttpResponse {
    let who = match &identity {
        RequestIdentity::User(claims) => claims.username.clone(),
        RequestIdentity::Guest(guest_id) => format!("guest {}", guest_id),
        RequestIdentity::Anonymous => "anonymous".to_string(),
    };
    log::info!("🧭 POST /api/suggestProfession - {}", who);

    let result = suggestion_service::suggest(&db, llm.get_ref(), &identity, &answers).await;
    suggestion_response(&who, result)
}

fn suggestion_response(who: &str, result: Result<CareerResult, AppError>) -> HttpResponse {
    match result {
        Ok(result) => {
            log::info!("✅ Suggestions ready for {}: {:?}", who, result.professions);
            HttpResponse::Ok().json(result)
        }
        Err(AppError::LimitReached(message)) => {
            log::warn!("🚫 Suggestion refused for {}: {}", who, message);
            HttpResponse::Forbidden().json(serde_json::json!({
                "error": message,
                "limitReached": true,
            }))
        }
        Err(e @ AppError::Validation(_)) => {
            log_failure("Suggestion", who, &e);
            e.error_response()
        }
        Err(e) => {
            log::error!("❌ Suggestion failed for {}: {}", who, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to process request",
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::guest_service::LIMIT_REACHED_MESSAGE;
    use actix_web::{body::to_bytes, http::StatusCode};

    async fn json_body(res: HttpResponse) -> serde_json::Value {
        let bytes = to_bytes(res.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[actix_rt::test]
    async fn test_limit_reached_is_forbidden() {
        let res = suggestion_response(
            "guest g1",
            Err(AppError::LimitReached(LIMIT_REACHED_MESSAGE.to_string())),
        );
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let body = json_body(res).await;
        assert_eq!(body["limitReached"], true);
        assert_eq!(body["error"], LIMIT_REACHED_MESSAGE);
    }

    #[actix_rt::test]
    async fn test_ai_failure_is_generic() {
        let res = suggestion_response(
            "alice",
            Err(AppError::External("OpenAI API error (401): bad key".to_string())),
        );
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(res).await,
            serde_json::json!({ "error": "Failed to process request" })
        );
    }

    #[actix_rt::test]
    async fn test_missing_answer_is_bad_request() {
        let res = suggestion_response("alice", Err(AppError::validation("hobbies is required")));
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["message"], "hobbies is required");
    }

    #[actix_rt::test]
    async fn test_success_returns_result() {
        let result = CareerResult {
            iq: 115,
            professions: vec!["Pilot".to_string()],
            details: Vec::new(),
        };
        let res = suggestion_response("alice", Ok(result));
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["iq"], 115);
    }
}
