pub mod auth;
pub mod contact;
pub mod guest;
pub mod health;
pub mod suggestions;
pub mod swagger;

use crate::utils::AppError;
use actix_web::{error::JsonPayloadError, HttpRequest};

/// Malformed JSON bodies get the same `{ success, message }` envelope as other 400s.
pub fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    log::warn!("❌ Rejected JSON body on {}: {}", req.path(), err);
    AppError::validation(format!("Invalid request body: {}", err)).into()
}
