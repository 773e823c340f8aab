//! `productinfo-service` binary entry point.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise telemetry (JSON logs, optional OTLP spans).
//! 3. Load the TLS identity and build the mTLS server configuration.
//! 4. Assemble the call chain: token validator → call observer → handler.
//! 5. Bind the gRPC listener and serve until ctrl-c.

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info};

use productinfo_service::interceptor::StaticToken;
use productinfo_service::server::{router, state::AppState, tls};
use productinfo_service::{telemetry, Config, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_addr = %cfg.listen_addr,
        "productinfo-service starting"
    );

    // -----------------------------------------------------------------------
    // 3. TLS identity
    // -----------------------------------------------------------------------
    let identity = tls::load_identity(&cfg).map_err(|e| {
        error!(error = ?e, "cannot load TLS identity");
        e
    })?;
    let server_tls = identity.server_tls_config();

    // -----------------------------------------------------------------------
    // 4. Call chain
    // -----------------------------------------------------------------------
    let mut state = AppState::new(Arc::new(StaticToken::new(cfg.auth_token.clone())));
    state.limits = cfg.call_limits();
    let chain = router::build(&state);

    // -----------------------------------------------------------------------
    // 5. Listener
    // -----------------------------------------------------------------------
    let server = Server::bind(&cfg.listen_addr, server_tls, chain, state.limits).await?;
    server
        .serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for ctrl-c; shutting down");
            }
        })
        .await?;

    info!("productinfo-service stopped");
    telemetry::shutdown();
    Ok(())
}
