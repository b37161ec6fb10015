pub mod csrf;

pub use csrf::{
    CookieConfig, CookieOptions, CsrfConfig, CsrfOptions, SameSitePolicy, DEFAULT_BODY_LIMIT,
    DEFAULT_COOKIE_NAME, DEFAULT_COOKIE_PATH, PAYLOAD_METHODS,
};
