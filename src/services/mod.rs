pub mod secret_manager;
pub mod tokens;

pub use secret_manager::{get_secret, set_secret};
pub use tokens::{Secret, Token, Tokens};
