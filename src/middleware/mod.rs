pub mod csrf;

pub use csrf::{
    csrf_middleware, csurf, extract_submitted_token, Csrf, CsrfContext, CSRF_FIELD, CSRF_HEADERS,
};
