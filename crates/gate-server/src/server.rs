//! Router assembly and the HTTP serve loop.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::{any, get};
use axum::{Extension, Router};
use gate_config::Config;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::admin;
use crate::admission::{AdmissionContext, admission_middleware};
use crate::error::ServerError;
use crate::state::AppState;

/// Default graceful shutdown timeout.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration =
    Duration::from_secs(gate_core::DEFAULT_SHUTDOWN_TIMEOUT_SECS);

/// Path of the forward-auth endpoint.
pub const ADMISSION_PATH: &str = "/v1/admission";

/// Forward-auth target: answers 204 once admission has passed.
async fn forward_auth(Extension(context): Extension<AdmissionContext>) -> StatusCode {
    debug!(user_id = %context.user.id, status = context.quota.status.as_str(), "forward auth admitted");
    StatusCode::NO_CONTENT
}

async fn healthz() -> &'static str {
    "ok"
}

/// Admission endpoint, admin API and health check.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(ADMISSION_PATH, any(forward_auth))
        .route_layer(from_fn_with_state(state.clone(), admission_middleware))
        .merge(admin::routes(state.clone()))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Serve until `shutdown` is cancelled, then drain in-flight requests for up
/// to `server.shutdown_timeout_secs`.
pub async fn run_with_shutdown(
    config: &Config,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let listen: SocketAddr = config
        .server
        .listen
        .parse()
        .map_err(|_| ServerError::Listen(config.server.listen.clone()))?;

    let rate_limiter = state.rate_limiter().clone();
    rate_limiter.start_cleanup_task(Duration::from_secs(config.rate_limit.cleanup_interval_secs));

    let app = build_router(state).into_make_service_with_connect_info::<SocketAddr>();
    let listener = TcpListener::bind(listen).await?;
    info!(address = %listen, "listening");

    let drain_timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    let signal = shutdown.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        signal.cancelled().await;
        info!("shutdown signal received, no longer accepting requests");
    });

    let serving = tokio::spawn(async move { server.await });
    let result = tokio::select! {
        joined = serving => joined,
        () = async {
            shutdown.cancelled().await;
            tokio::time::sleep(drain_timeout).await;
        } => {
            warn!(timeout_secs = drain_timeout.as_secs(), "shutdown timeout, abandoning in-flight requests");
            Ok(Ok(()))
        }
    };

    // Shutdown rate limiter cleanup task
    rate_limiter.shutdown();

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(ServerError::Io(e)),
        Err(e) => warn!(error = %e, "server task failed"),
    }
    info!("server stopped");
    Ok(())
}

/// Run the server (blocking until error, no graceful shutdown).
pub async fn run(config: &Config, state: AppState) -> Result<(), ServerError> {
    run_with_shutdown(config, state, CancellationToken::new()).await
}
