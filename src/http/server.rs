//! HTTP server setup.

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use super::{handlers, middleware};
use crate::config::MarqueeConfig;
use crate::data::Models;
use crate::ratelimit::RateLimiterRegistry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MarqueeConfig>,
    pub models: Arc<Models>,
    pub limiter: Arc<RateLimiterRegistry>,
}

/// Build the router with every route and middleware layer.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let request_timeout = state.config.server.request_timeout();

    Router::new()
        .route("/", get(handlers::root))
        .route("/v1/health", get(handlers::health))
        .route(
            "/v1/movies",
            get(handlers::list_movies).post(handlers::create_movie),
        )
        .route(
            "/v1/movies/{id}",
            get(handlers::show_movie)
                .put(handlers::update_movie)
                .delete(handlers::delete_movie),
        )
        .route("/v1/users", post(handlers::register_user))
        .layer(from_fn_with_state(state.clone(), middleware::rate_limit))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// The HTTP API server.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: build_router(state),
        }
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}
