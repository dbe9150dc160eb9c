use crate::{
    api::auth::log_failure,
    config::AppConfig,
    services::email_service::{self, ContactRequest, Mailer},
};
use actix_web::{web, HttpResponse, ResponseError};

#[utoipa::path(
    post,
    path = "/api/contact",
    tag = "Contact",
    request_body = ContactRequest,
    responses(
        (status = 200, description = "Message forwarded to the support inbox"),
        (status = 400, description = "Missing required fields"),
        (status = 500, description = "Email could not be sent")
    )
)]
pub async fn contact(
    mailer: web::Data<dyn Mailer>,
    config: web::Data<AppConfig>,
    request: web::Json<ContactRequest>,
) -> HttpResponse {
    log::info!("✉️  POST /api/contact - from: {}", request.email);

    match email_service::send_contact_message(mailer.get_ref(), &config, &request).await {
        Ok(id) => {
            log::info!("✅ Contact message forwarded: {}", id);
            HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "message": "Email sent successfully",
            }))
        }
        Err(e) => {
            log_failure("Contact message", &request.email, &e);
            e.error_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::email_service::testing::RecordingMailer;
    use actix_web::{http::StatusCode, test as actix_test, App};
    use std::sync::Arc;

    #[actix_web::test]
    async fn test_contact_forwards_to_inbox() {
        let mailer = Arc::new(RecordingMailer::default());
        let as_dyn: Arc<dyn Mailer> = mailer.clone();
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::from(as_dyn))
                .app_data(web::Data::new(AppConfig::for_tests()))
                .route("/api/contact", web::post().to(contact)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/api/contact")
            .set_json(serde_json::json!({
                "name": "Sam",
                "email": "sam@example.com",
                "message": "Hello <there>"
            }))
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["inbox@example.com".to_string()]);
        assert_eq!(sent[0].reply_to.as_deref(), Some("sam@example.com"));
        assert!(sent[0].html.contains("Hello &lt;there&gt;"));
    }

    #[actix_web::test]
    async fn test_contact_requires_all_fields() {
        let mailer: Arc<dyn Mailer> = Arc::new(RecordingMailer::default());
        let app = actix_test::init_service(
            App::new()
                .app_data(web::Data::from(mailer))
                .app_data(web::Data::new(AppConfig::for_tests()))
                .route("/api/contact", web::post().to(contact)),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/api/contact")
            .set_json(serde_json::json!({ "name": "Sam", "email": "", "message": "Hi" }))
            .to_request();
        let res = actix_test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = actix_test::read_body_json(res).await;
        assert_eq!(body["message"], "Missing required fields");
    }
}
