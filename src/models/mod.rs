pub mod career;
pub mod guest;
pub mod user;

pub use career::*;
pub use guest::*;
pub use user::*;
