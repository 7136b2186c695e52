//! Authenticated operator surface.
//!
//! - `GET /admin/status`: current [`PipelineStatus`](crate::status::PipelineStatus)
//! - `POST /admin/retry`: re-arm account-chain forwarding after an error

pub mod auth;
pub mod handlers;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::{get_status, post_retry};
use crate::forwarding::EngineHandle;
use crate::status::StatusBoard;

/// Shared state for admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub board: StatusBoard,
    /// Absent when account-chain forwarding is disabled.
    pub engine: Option<EngineHandle>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/retry", post(post_retry))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin router until `shutdown` resolves.
pub async fn serve_admin(
    listener: TcpListener,
    state: AdminState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin server starting");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Admin server stopped");
    Ok(())
}
