use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Profession Predictor API",
        version = "1.0.0",
        description = "Career guidance backend. \n\n**Authentication:** email + password accounts verified by a one-time code, Google / GitHub sign-in, or a cookie-based guest session limited to 3 predictions.\n\n**Features:**\n- Sign-up with email verification\n- Session cookies (JWT) and Bearer tokens\n- AI career suggestions from a profile questionnaire\n- Guest prediction history\n- Contact form",
        contact(
            name = "Profession Predictor Team",
            email = "support@profession-predictor.app"
        )
    ),
    paths(
        // Auth
        crate::api::auth::sign_up,
        crate::api::auth::verify_code,
        crate::api::auth::check_username_unique,
        crate::api::auth::sign_in,
        crate::api::auth::sign_out,
        crate::api::auth::session,
        crate::api::auth::oauth_start,

        // Guest
        crate::api::guest::guest_login,
        crate::api::guest::guest_check,
        crate::api::guest::guest_logout,
        crate::api::guest::predictions_count,
        crate::api::guest::guest_history,

        // Suggestions
        crate::api::suggestions::suggest_profession,

        // Contact & Health
        crate::api::contact::contact,
        crate::api::health::health_check,
    ),
    components(
        schemas(
            crate::services::auth_service::SignUpRequest,
            crate::services::auth_service::SignUpResponse,
            crate::services::auth_service::VerifyCodeRequest,
            crate::services::auth_service::SignInRequest,
            crate::services::auth_service::SessionResponse,
            crate::models::UserInfo,

            crate::services::guest_service::GuestCheckResponse,
            crate::services::guest_service::PredictionsCountResponse,
            crate::services::guest_service::GuestHistory,
            crate::models::PredictionView,

            crate::models::ProfileAnswers,
            crate::models::CareerResult,
            crate::models::CareerDetail,

            crate::services::email_service::ContactRequest,
            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Sign-up, email verification, sign-in and OAuth endpoints."),
        (name = "Guest", description = "Cookie-based guest sessions with a capped number of predictions."),
        (name = "Suggestions", description = "AI career suggestions from questionnaire answers."),
        (name = "Contact", description = "Contact form forwarding."),
        (name = "Health", description = "Service and database health."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Session JWT; the session_token cookie works too"))
                        .build(),
                ),
            );
        }
    }
}
