use std::{collections::HashMap, env};

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use csurf::{
    test_utils::test_helpers, ConfigError, Csrf, CsrfConfig, CsrfOptions, SameSitePolicy,
};
use serial_test::serial;
use tower::ServiceExt;

const CSRF_VARS: [&str; 9] = [
    "CSRF_VERIFIED_METHODS",
    "CSRF_COOKIE_NAME",
    "CSRF_COOKIE_PATH",
    "CSRF_COOKIE_DOMAIN",
    "CSRF_COOKIE_SECURE",
    "CSRF_COOKIE_HTTP_ONLY",
    "CSRF_COOKIE_SAME_SITE",
    "CSRF_COOKIE_MAX_AGE",
    "CSRF_BODY_LIMIT",
];

#[derive(Default)]
struct EnvGuard {
    original: HashMap<String, Option<String>>,
}

impl EnvGuard {
    /// Start from a clean slate for every CSRF variable
    fn clean() -> Self {
        let mut guard = Self::default();
        for key in CSRF_VARS {
            guard.remove(key);
        }
        guard
    }

    fn set(&mut self, key: &str, value: impl Into<String>) {
        self.original
            .entry(key.to_string())
            .or_insert_with(|| env::var(key).ok());
        env::set_var(key, value.into());
    }

    fn remove(&mut self, key: &str) {
        self.original
            .entry(key.to_string())
            .or_insert_with(|| env::var(key).ok());
        env::remove_var(key);
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in self.original.drain() {
            match value {
                Some(v) => env::set_var(&key, v),
                None => env::remove_var(&key),
            }
        }
    }
}

#[test]
#[serial]
fn empty_environment_yields_defaults() {
    let _env_guard = EnvGuard::clean();

    let options = CsrfOptions::from_env().expect("options to load");
    assert_eq!(options, CsrfOptions::default());

    let config = CsrfConfig::from_options(options).expect("defaults to resolve");
    assert_eq!(config, CsrfConfig::default());
}

#[test]
#[serial]
fn environment_overrides_cookie_and_methods() {
    let mut env_guard = EnvGuard::clean();
    env_guard.set("CSRF_VERIFIED_METHODS", "post, put");
    env_guard.set("CSRF_COOKIE_NAME", "__Host-csrf");
    env_guard.set("CSRF_COOKIE_SECURE", "true");
    env_guard.set("CSRF_COOKIE_HTTP_ONLY", "1");
    env_guard.set("CSRF_COOKIE_SAME_SITE", "Strict");
    env_guard.set("CSRF_COOKIE_MAX_AGE", "3600");
    env_guard.set("CSRF_BODY_LIMIT", "4096");

    let config = CsrfConfig::from_options(CsrfOptions::from_env().unwrap()).unwrap();

    assert_eq!(config.verified_methods, vec![Method::POST, Method::PUT]);
    assert_eq!(config.cookie.name, "__Host-csrf");
    assert_eq!(config.cookie.path, "/", "unset path keeps the default");
    assert!(config.cookie.secure);
    assert!(config.cookie.http_only);
    assert_eq!(config.cookie.same_site, Some(SameSitePolicy::Strict));
    assert_eq!(config.cookie.max_age, Some(time::Duration::hours(1)));
    assert_eq!(config.body_limit, 4096);
}

#[test]
#[serial]
fn invalid_flag_is_reported() {
    let mut env_guard = EnvGuard::clean();
    env_guard.set("CSRF_COOKIE_SECURE", "maybe");

    assert_eq!(
        CsrfOptions::from_env(),
        Err(ConfigError::InvalidEnv {
            key: "CSRF_COOKIE_SECURE".to_string(),
            value: "maybe".to_string(),
        })
    );
}

#[test]
#[serial]
fn invalid_method_is_reported() {
    let mut env_guard = EnvGuard::clean();
    env_guard.set("CSRF_VERIFIED_METHODS", "POST,BAD METHOD");

    let options = CsrfOptions::from_env().unwrap();
    assert_eq!(
        CsrfConfig::from_options(options),
        Err(ConfigError::InvalidMethod("BAD METHOD".to_string()))
    );
}

#[tokio::test]
#[serial]
async fn environment_configured_middleware_uses_renamed_cookie() {
    let mut env_guard = EnvGuard::clean();
    env_guard.set("CSRF_COOKIE_NAME", "foo");

    let csrf = Csrf::from_options(CsrfOptions::from_env().unwrap()).unwrap();
    let app = test_helpers::create_test_app(csrf);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .expect("router to respond");

    let set_cookies = test_helpers::set_cookies(&response);
    assert_eq!(set_cookies.len(), 1);
    assert_eq!(set_cookies[0].name(), "foo");

    let cookies = test_helpers::cookies(&response);
    let token = test_helpers::body_string(response).await;

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/login")
                .header("cookie", cookies)
                .header("csrf-token", token)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("router to respond");

    assert_eq!(response.status(), StatusCode::OK);
}
