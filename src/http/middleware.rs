//! Per-client rate limiting in front of every route.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use super::server::AppState;
use crate::error::MarqueeError;

/// Admit or reject a request based on the caller's transport address.
///
/// A request without a peer address cannot be attributed to a client and
/// fails as an internal error rather than bypassing the limiter.
pub async fn rate_limit(State(state): State<AppState>, request: Request<Body>, next: Next) -> Response {
    let remote_addr = match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => addr.to_string(),
        None if !state.limiter.settings().enabled => return next.run(request).await,
        None => {
            return MarqueeError::InvalidClientIdentity("request has no peer address".into())
                .into_response()
        }
    };

    match state.limiter.admit(&remote_addr) {
        Ok(true) => next.run(request).await,
        Ok(false) => MarqueeError::RateLimited.into_response(),
        Err(err) => err.into_response(),
    }
}
