use std::{env, str::FromStr};

use axum::http::Method;
use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::Deserialize;
use time::Duration;

use crate::error::{ConfigError, Result};

pub const DEFAULT_COOKIE_NAME: &str = "_csrf";
pub const DEFAULT_COOKIE_PATH: &str = "/";
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Methods whose request body may carry a submitted token
pub const PAYLOAD_METHODS: [Method; 4] =
    [Method::PATCH, Method::POST, Method::PUT, Method::DELETE];

/// Cookie SameSite attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

impl FromStr for SameSitePolicy {
    type Err = ();

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "strict" => Ok(SameSitePolicy::Strict),
            "lax" => Ok(SameSitePolicy::Lax),
            "none" => Ok(SameSitePolicy::None),
            _ => Err(()),
        }
    }
}

impl From<SameSitePolicy> for SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Strict => SameSite::Strict,
            SameSitePolicy::Lax => SameSite::Lax,
            SameSitePolicy::None => SameSite::None,
        }
    }
}

/// User-supplied cookie options. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CookieOptions {
    pub name: Option<String>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: Option<bool>,
    #[serde(alias = "httpOnly")]
    pub http_only: Option<bool>,
    #[serde(alias = "sameSite")]
    pub same_site: Option<SameSitePolicy>,
    /// Lifetime in seconds
    #[serde(alias = "maxAge")]
    pub max_age: Option<i64>,
}

/// User-supplied middleware options. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CsrfOptions {
    #[serde(alias = "verifiedMethods")]
    pub verified_methods: Option<Vec<String>>,
    pub cookie: Option<CookieOptions>,
    #[serde(alias = "bodyLimit")]
    pub body_limit: Option<usize>,
}

impl CsrfOptions {
    /// Read options from `CSRF_*` environment variables.
    ///
    /// Unset variables stay `None` so the defaults apply when the options are
    /// resolved with [`CsrfConfig::from_options`].
    pub fn from_env() -> Result<Self> {
        let verified_methods = env_var("CSRF_VERIFIED_METHODS").map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|method| !method.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
        });

        let cookie = CookieOptions {
            name: env_var("CSRF_COOKIE_NAME"),
            path: env_var("CSRF_COOKIE_PATH"),
            domain: env_var("CSRF_COOKIE_DOMAIN"),
            secure: env_parse("CSRF_COOKIE_SECURE", parse_flag)?,
            http_only: env_parse("CSRF_COOKIE_HTTP_ONLY", parse_flag)?,
            same_site: env_parse("CSRF_COOKIE_SAME_SITE", |value| value.parse().ok())?,
            max_age: env_parse("CSRF_COOKIE_MAX_AGE", |value| value.parse().ok())?,
        };

        let cookie = (cookie != CookieOptions::default()).then_some(cookie);

        Ok(Self {
            verified_methods,
            cookie,
            body_limit: env_parse("CSRF_BODY_LIMIT", |value| value.parse().ok())?,
        })
    }
}

/// Resolved cookie attributes used when persisting the secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieConfig {
    pub name: String,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSitePolicy>,
    pub max_age: Option<Duration>,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            path: DEFAULT_COOKIE_PATH.to_string(),
            domain: None,
            secure: false,
            http_only: false,
            same_site: None,
            max_age: None,
        }
    }
}

impl CookieConfig {
    /// Build the outbound cookie carrying `value` with the configured attributes
    pub fn build_cookie(&self, value: String) -> Cookie<'static> {
        let mut builder = Cookie::build((self.name.clone(), value))
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only);

        if let Some(ref domain) = self.domain {
            builder = builder.domain(domain.clone());
        }

        if let Some(same_site) = self.same_site {
            builder = builder.same_site(same_site.into());
        }

        if let Some(max_age) = self.max_age {
            builder = builder.max_age(max_age);
        }

        builder.build()
    }
}

/// CSRF protection configuration
///
/// Immutable once handed to the middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfConfig {
    /// Methods subject to token verification
    pub verified_methods: Vec<Method>,

    /// Secret cookie attributes
    pub cookie: CookieConfig,

    /// Maximum number of body bytes buffered while looking for a token
    pub body_limit: usize,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            verified_methods: PAYLOAD_METHODS.to_vec(),
            cookie: CookieConfig::default(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl CsrfConfig {
    /// Resolve user options over the defaults.
    ///
    /// Scalar fields replace the default when present. `verified_methods`
    /// replaces the default list wholesale and is never appended to it.
    pub fn from_options(options: CsrfOptions) -> Result<Self> {
        let mut config = Self::default();

        if let Some(methods) = options.verified_methods {
            config.verified_methods = methods
                .iter()
                .map(|method| parse_method(method))
                .collect::<Result<Vec<_>>>()?;
        }

        if let Some(cookie) = options.cookie {
            if let Some(name) = cookie.name {
                config.cookie.name = name;
            }
            if let Some(path) = cookie.path {
                config.cookie.path = path;
            }
            if cookie.domain.is_some() {
                config.cookie.domain = cookie.domain;
            }
            if let Some(secure) = cookie.secure {
                config.cookie.secure = secure;
            }
            if let Some(http_only) = cookie.http_only {
                config.cookie.http_only = http_only;
            }
            if cookie.same_site.is_some() {
                config.cookie.same_site = cookie.same_site;
            }
            if let Some(seconds) = cookie.max_age {
                config.cookie.max_age = Some(Duration::seconds(seconds));
            }
        }

        if let Some(body_limit) = options.body_limit {
            config.body_limit = body_limit;
        }

        if config.cookie.name.trim().is_empty() {
            return Err(ConfigError::EmptyCookieName);
        }

        Ok(config)
    }

    /// Case-insensitive check of `method` against the verified set
    pub fn is_verified_method(&self, method: &Method) -> bool {
        self.verified_methods
            .iter()
            .any(|verified| verified.as_str().eq_ignore_ascii_case(method.as_str()))
    }

    pub fn with_verified_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.verified_methods = methods.into_iter().collect();
        self
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie.name = name.into();
        self
    }

    pub fn with_cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie.path = path.into();
        self
    }

    pub fn with_cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie.domain = Some(domain.into());
        self
    }

    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie.secure = secure;
        self
    }

    pub fn with_cookie_http_only(mut self, http_only: bool) -> Self {
        self.cookie.http_only = http_only;
        self
    }

    pub fn with_cookie_same_site(mut self, same_site: SameSitePolicy) -> Self {
        self.cookie.same_site = Some(same_site);
        self
    }

    pub fn with_cookie_max_age(mut self, max_age: Duration) -> Self {
        self.cookie.max_age = Some(max_age);
        self
    }

    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }
}

pub(crate) fn is_payload_method(method: &Method) -> bool {
    PAYLOAD_METHODS
        .iter()
        .any(|payload| payload.as_str().eq_ignore_ascii_case(method.as_str()))
}

fn parse_method(method: &str) -> Result<Method> {
    let normalized = method.trim().to_ascii_uppercase();
    if normalized.is_empty() {
        return Err(ConfigError::InvalidMethod(method.to_string()));
    }

    Method::from_bytes(normalized.as_bytes())
        .map_err(|_| ConfigError::InvalidMethod(method.to_string()))
}

fn env_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str, parse: impl Fn(&str) -> Option<T>) -> Result<Option<T>> {
    match env_var(key) {
        Some(value) => parse(value.trim())
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidEnv {
                key: key.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
