pub mod test_helpers {
    use axum::{
        body::{Body, Bytes},
        http::{header, Response},
        middleware,
        routing::{any, get},
        Router,
    };
    use axum_extra::extract::cookie::Cookie;

    use crate::{csrf_middleware, Csrf, CsrfContext};

    /// Router mirroring a typical protected application:
    ///
    /// - `GET /` returns a fresh token as text
    /// - `GET /twice` calls the accessor twice and returns both values joined by `|`
    /// - `/login` answers `ok` for any method
    /// - `/echo` returns the request body unchanged
    pub fn create_test_app(csrf: Csrf) -> Router {
        Router::new()
            .route("/", get(token_handler))
            .route("/twice", get(twice_handler))
            .route("/login", any(|| async { "ok" }))
            .route("/echo", any(|body: Bytes| async move { body }))
            .layer(middleware::from_fn_with_state(csrf, csrf_middleware))
    }

    async fn token_handler(csrf: CsrfContext) -> String {
        csrf.token().into_string()
    }

    async fn twice_handler(csrf: CsrfContext) -> String {
        format!("{}|{}", csrf.token(), csrf.token())
    }

    /// Parse every `Set-Cookie` header of a response
    pub fn set_cookies(response: &Response<Body>) -> Vec<Cookie<'static>> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| Cookie::parse(value.to_string()).ok())
            .collect()
    }

    /// Turn a response's `Set-Cookie` headers into a `Cookie` request header value
    pub fn cookies(response: &Response<Body>) -> String {
        set_cookies(response)
            .iter()
            .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Read a response body as UTF-8 text
    pub async fn body_string(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
