mod api;
mod config;
mod database;
mod middleware;
mod models;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use services::{
    email_service::{Mailer, ResendMailer},
    llm_client::{CompletionProvider, OpenAiClient},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = config::AppConfig::from_env().expect("Invalid configuration");

    log::info!("🚀 Starting Profession Predictor...");
    log::info!("🌍 Environment: {}", if config.production { "production" } else { "development" });

    if config.openai_api_key.is_empty() {
        log::warn!("⚠️  OPENAI_API_KEY is not set; suggestions will fail");
    }
    if config.resend_api_key.is_empty() {
        log::warn!("⚠️  RESEND_API_KEY is not set; emails will fail");
    }
    for (name, enabled) in [("Google", config.google.is_some()), ("GitHub", config.github.is_some())] {
        if enabled {
            log::info!("🔐 {} sign-in enabled", name);
        }
    }

    // Initialize MongoDB connection
    let db = database::MongoDB::new(&config.database_url)
        .await
        .expect("Failed to connect to MongoDB");
    log::info!("✅ MongoDB connected successfully");

    let mailer: Arc<dyn Mailer> = Arc::new(ResendMailer::new(config.resend_api_key.clone()));
    let llm: Arc<dyn CompletionProvider> = Arc::new(OpenAiClient::new(
        config.openai_api_key.clone(),
        config.openai_model.clone(),
    ));

    let db_data = web::Data::new(db);
    let mailer_data = web::Data::from(mailer);
    let llm_data = web::Data::from(llm);

    let bind_address = (config.host.clone(), config.port);
    log::info!("🌐 Server starting on {}:{}", config.host, config.port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", config.host, config.port);
    log::info!("📄 OpenAPI document at: http://{}:{}/api-docs/openapi.json", config.host, config.port);

    let config_data = web::Data::new(config);

    // Start HTTP server
    HttpServer::new(move || {
        let cors = config_data
            .cors_allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .supports_credentials()
            .max_age(3600);

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(db_data.clone())
            .app_data(config_data.clone())
            .app_data(mailer_data.clone())
            .app_data(llm_data.clone())
            .app_data(web::JsonConfig::default().error_handler(api::json_error_handler))
            .wrap(cors)
            .wrap(middleware::SecurityHeaders)
            .wrap(Logger::default())
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
            // Health check
            .route("/health", web::get().to(api::health::health_check))
            // Session-protected auth endpoints
            .service(
                web::scope("/api/auth/session")
                    .wrap(middleware::AuthMiddleware)
                    .route("", web::get().to(api::auth::session)),
            )
            .service(
                web::scope("/api")
                    // Accounts
                    .route("/signUp", web::post().to(api::auth::sign_up))
                    .route("/verifyCode", web::post().to(api::auth::verify_code))
                    .route("/checkUsernameUnique", web::get().to(api::auth::check_username_unique))
                    .route("/auth/signin", web::post().to(api::auth::sign_in))
                    .route("/auth/signout", web::post().to(api::auth::sign_out))
                    .route("/auth/oauth/{provider}", web::get().to(api::auth::oauth_start))
                    .route("/auth/callback/{provider}", web::get().to(api::auth::oauth_callback))
                    // Guest sessions
                    .route("/guest-login", web::post().to(api::guest::guest_login))
                    .route("/guest-check", web::get().to(api::guest::guest_check))
                    .route("/guest-logout", web::post().to(api::guest::guest_logout))
                    .route("/predictions-count", web::get().to(api::guest::predictions_count))
                    .route("/guest/predictions", web::get().to(api::guest::guest_history))
                    // Suggestions
                    .route("/suggestProfession", web::post().to(api::suggestions::suggest_profession))
                    // Contact
                    .route("/contact", web::post().to(api::contact::contact)),
            )
    })
    .bind(bind_address)?
    .run()
    .await
}
