//! Persistence of the CSRF secret in a client-side cookie.
//!
//! Nothing is stored on the server. The secret travels in the configured
//! cookie and is written back through the response's cookie jar only when it
//! was freshly minted.

use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::{config::CookieConfig, services::tokens::Secret};

/// Read the secret from the configured cookie. Empty values count as absent.
pub fn get_secret(jar: &CookieJar, config: &CookieConfig) -> Option<Secret> {
    jar.get(&config.name)
        .map(Cookie::value)
        .filter(|value| !value.is_empty())
        .map(Secret::new)
}

/// Queue the secret as an outbound cookie.
///
/// The returned jar must be part of the response for the `Set-Cookie` header
/// to be emitted. A later call for the same name replaces the earlier one.
pub fn set_secret(jar: CookieJar, secret: &Secret, config: &CookieConfig) -> CookieJar {
    jar.add(config.build_cookie(secret.expose().to_string()))
}
