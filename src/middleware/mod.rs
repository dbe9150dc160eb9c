pub mod auth;
pub mod security_headers;

pub use auth::{AuthMiddleware, RequestIdentity};
pub use security_headers::SecurityHeaders;
