//! Stateless CSRF protection for axum.
//!
//! A random secret lives in a client-side cookie. Handlers obtain a token
//! derived from it through the [`CsrfContext`] extractor and embed it in forms
//! or headers. Requests using a verified method (PATCH, POST, PUT and DELETE by
//! default) must echo a token that verifies against the cookie's secret, or
//! they are rejected with `403` and the code `EBADCSRFTOKEN`.

pub mod config;
pub mod error;
pub mod middleware;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

pub use config::{CookieConfig, CookieOptions, CsrfConfig, CsrfOptions, SameSitePolicy};
pub use error::{ConfigError, CsrfError, INVALID_TOKEN_CODE, INVALID_TOKEN_MESSAGE};
pub use middleware::{csrf_middleware, csurf, Csrf, CsrfContext};
pub use services::{Secret, Token, Tokens};
