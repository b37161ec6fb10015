use std::sync::{Arc, OnceLock};

use axum::{
    body::{Body, Bytes},
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use futures_util::{stream, StreamExt};
use http_body_util::BodyExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    config::{csrf::is_payload_method, CsrfConfig, CsrfOptions},
    error::{CsrfError, Result},
    services::{get_secret, set_secret, Secret, Token, Tokens},
};

/// Body field and query parameter carrying the submitted token
pub const CSRF_FIELD: &str = "_csrf";

/// Headers checked for the submitted token, in order
pub const CSRF_HEADERS: [&str; 4] = ["csrf-token", "xsrf-token", "x-csrf-token", "x-xsrf-token"];

/// CSRF protection middleware state
///
/// Cheap to clone: configuration and token service are shared behind `Arc`s
/// by every request handled through this instance.
///
/// ```rust,no_run
/// use axum::{middleware, routing::get, Router};
/// use csurf::{csrf_middleware, Csrf, CsrfConfig, CsrfContext};
///
/// let csrf = Csrf::new(CsrfConfig::default().with_cookie_name("foo"));
///
/// let app: Router = Router::new()
///     .route("/", get(|ctx: CsrfContext| async move { ctx.token().into_string() }))
///     .layer(middleware::from_fn_with_state(csrf, csrf_middleware));
/// ```
#[derive(Debug, Clone)]
pub struct Csrf {
    config: Arc<CsrfConfig>,
    tokens: Arc<Tokens>,
}

impl Csrf {
    pub fn new(config: CsrfConfig) -> Self {
        Self {
            config: Arc::new(config),
            tokens: Arc::new(Tokens::new()),
        }
    }

    /// Resolve partial options over the defaults and build the middleware state
    pub fn from_options(options: CsrfOptions) -> Result<Self> {
        Ok(Self::new(CsrfConfig::from_options(options)?))
    }

    pub fn config(&self) -> &CsrfConfig {
        &self.config
    }
}

/// Build the middleware state from partial options
pub fn csurf(options: CsrfOptions) -> Result<Csrf> {
    Csrf::from_options(options)
}

/// Request-scoped token accessor
///
/// Installed as a request extension by [`csrf_middleware`] and extractable in
/// handlers. The token is derived on the first call to [`CsrfContext::token`]
/// and every later call in the same request returns the identical value.
#[derive(Debug, Clone)]
pub struct CsrfContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    tokens: Arc<Tokens>,
    secret: Secret,
    token: OnceLock<Token>,
}

impl CsrfContext {
    fn new(tokens: Arc<Tokens>, secret: Secret) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                tokens,
                secret,
                token: OnceLock::new(),
            }),
        }
    }

    pub fn token(&self) -> Token {
        let inner = &self.inner;
        inner
            .token
            .get_or_init(|| inner.tokens.create(&inner.secret))
            .clone()
    }
}

impl<S> FromRequestParts<S> for CsrfContext
where
    S: Send + Sync,
{
    type Rejection = CsrfError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CsrfContext>()
            .cloned()
            .ok_or(CsrfError::MissingContext)
    }
}

/// Middleware issuing the CSRF secret and verifying submitted tokens
///
/// Wire it with `axum::middleware::from_fn_with_state(csrf, csrf_middleware)`.
/// Requests with a method outside the verified set always pass through. The
/// `Set-Cookie` for a freshly minted secret rides on whichever response is
/// produced, including a rejection.
pub async fn csrf_middleware(
    State(csrf): State<Csrf>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let (jar, secret) = match get_secret(&jar, &csrf.config.cookie) {
        Some(secret) => (jar, secret),
        None => {
            debug!(cookie = %csrf.config.cookie.name, "Issuing new CSRF secret");
            let secret = csrf.tokens.generate_secret();
            (set_secret(jar, &secret, &csrf.config.cookie), secret)
        }
    };

    request
        .extensions_mut()
        .insert(CsrfContext::new(csrf.tokens.clone(), secret.clone()));

    // Safe methods skip verification
    if !csrf.config.is_verified_method(request.method()) {
        return (jar, next.run(request).await).into_response();
    }

    let (request, submitted) = extract_submitted_token(request, csrf.config.body_limit).await;

    let verified = submitted
        .as_deref()
        .is_some_and(|value| csrf.tokens.verify(&secret, value));

    if !verified {
        warn!(
            method = %request.method(),
            path = %request.uri().path(),
            submitted = submitted.is_some(),
            "CSRF token verification failed"
        );
        return (jar, CsrfError::InvalidToken).into_response();
    }

    (jar, next.run(request).await).into_response()
}

/// Find the submitted token, returning the request with its body restored.
///
/// Sources in order, first non-empty value wins: the `_csrf` body field
/// (PATCH/POST/PUT/DELETE only), the `_csrf` query parameter, then the
/// [`CSRF_HEADERS`].
///
/// Only JSON, urlencoded and untyped bodies are buffered, and only up to
/// `body_limit` bytes. Anything else leaves the body untouched and the body
/// source absent.
pub async fn extract_submitted_token(
    request: Request,
    body_limit: usize,
) -> (Request, Option<String>) {
    let format = if is_payload_method(request.method()) {
        body_format(request.headers(), body_limit)
    } else {
        None
    };

    let (request, from_body) = match format {
        Some(format) => {
            let (parts, body) = request.into_parts();
            match buffer_body(body, body_limit).await {
                Ok(bytes) => {
                    let value = body_field(format, &bytes);
                    (Request::from_parts(parts, Body::from(bytes)), value)
                }
                Err(replay) => (Request::from_parts(parts, replay), None),
            }
        }
        None => (request, None),
    };

    let submitted = from_body
        .or_else(|| query_field(request.uri()))
        .or_else(|| header_field(request.headers()));

    (request, submitted)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFormat {
    Json,
    Form,
    Untyped,
}

/// Decide whether the body is worth buffering, and how to parse it
fn body_format(headers: &HeaderMap, body_limit: usize) -> Option<BodyFormat> {
    let declared_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());

    match declared_length {
        Some(0) => return None,
        Some(length) if length > body_limit as u64 => return None,
        _ => {}
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        });

    match content_type.as_deref() {
        None | Some("") => Some(BodyFormat::Untyped),
        Some(mime) if mime == "application/json" || mime.ends_with("+json") => {
            Some(BodyFormat::Json)
        }
        Some("application/x-www-form-urlencoded") => Some(BodyFormat::Form),
        Some(_) => None,
    }
}

/// Read the whole body if it fits in `limit` bytes.
///
/// When it does not fit, or the transport fails mid-read, the returned body
/// replays the bytes already read followed by the rest of the original stream
/// (or the transport error), so the handler still sees the full request.
async fn buffer_body(mut body: Body, limit: usize) -> std::result::Result<Bytes, Body> {
    let mut buffered = Vec::new();

    loop {
        match body.frame().await {
            None => return Ok(Bytes::from(buffered)),
            Some(Ok(frame)) => {
                // Trailers carry no token
                let Ok(data) = frame.into_data() else {
                    continue;
                };

                buffered.extend_from_slice(&data);
                if buffered.len() > limit {
                    debug!(limit, "Request body exceeds CSRF body limit, skipping body field");
                    let prefix = Bytes::from(buffered);
                    let head = stream::once(async move { Ok::<_, axum::Error>(prefix) });
                    return Err(Body::from_stream(head.chain(body.into_data_stream())));
                }
            }
            Some(Err(error)) => {
                debug!("Failed to read request body for CSRF check: {}", error);
                let replay = stream::iter([Ok(Bytes::from(buffered)), Err(error)]);
                return Err(Body::from_stream(replay));
            }
        }
    }
}

fn body_field(format: BodyFormat, body: &Bytes) -> Option<String> {
    if body.is_empty() {
        return None;
    }

    match format {
        BodyFormat::Json => json_field(body),
        BodyFormat::Form => form_field(body),
        BodyFormat::Untyped => json_field(body).or_else(|| form_field(body)),
    }
}

fn json_field(body: &[u8]) -> Option<String> {
    let json: Value = serde_json::from_slice(body).ok()?;

    match json.get(CSRF_FIELD)? {
        Value::String(value) if value.is_empty() => None,
        Value::String(value) => Some(value.clone()),
        Value::Null | Value::Bool(false) => None,
        Value::Number(number) if number.as_f64() == Some(0.0) => None,
        // Present but not a string: keep it so it fails verification
        other => Some(other.to_string()),
    }
}

fn form_field(body: &[u8]) -> Option<String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body).ok()?;
    first_field(pairs)
}

fn query_field(uri: &Uri) -> Option<String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(uri.query()?).ok()?;
    first_field(pairs)
}

fn first_field(pairs: Vec<(String, String)>) -> Option<String> {
    pairs
        .into_iter()
        .find(|(key, value)| key == CSRF_FIELD && !value.is_empty())
        .map(|(_, value)| value)
}

fn header_field(headers: &HeaderMap) -> Option<String> {
    CSRF_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(String::from)
    })
}
