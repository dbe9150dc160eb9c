pub mod auth_service;
pub mod email_service;
pub mod guest_service;
pub mod llm_client;
pub mod oauth_service;
pub mod suggestion_service;
pub mod validation;
