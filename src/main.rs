use csurf::{csrf_middleware, Csrf, CsrfContext, CsrfOptions};

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn token_handler(csrf: CsrfContext) -> impl IntoResponse {
    csrf.token().into_string()
}

async fn login_handler() -> impl IntoResponse {
    "ok"
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "csurf=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let csrf = Csrf::from_options(CsrfOptions::from_env()?)?;
    tracing::info!(
        cookie = %csrf.config().cookie.name,
        methods = ?csrf.config().verified_methods,
        "CSRF protection configured"
    );

    let app = Router::new()
        .route("/", get(token_handler))
        .route("/login", post(login_handler))
        .layer(middleware::from_fn_with_state(csrf, csrf_middleware))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
        .parse()?;

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
