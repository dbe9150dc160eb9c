// Utility functions
pub mod cookies;
pub mod error;
pub mod otp;

pub use error::*;
