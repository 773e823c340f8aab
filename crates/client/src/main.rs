//! `productinfo-client` binary entry point.
//!
//! 1. Load [`Config`] from environment variables.
//! 2. Initialise logging.
//! 3. Open an mTLS gRPC channel to the service with a bearer credential.
//! 4. Add one product, then fetch it back by the returned id.

use std::process::ExitCode;

use anyhow::{Context, Result};
use common::protocol::Product;
use common::tls::IdentityMaterial;
use tracing::{error, info};

use productinfo_client::report::log_status;
use productinfo_client::{telemetry, BearerToken, Config, Endpoint};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cfg = Config::from_env().map_err(|e| {
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;
    telemetry::init(&cfg.log_level)?;

    let identity =
        IdentityMaterial::load(&cfg.tls_cert_path, &cfg.tls_key_path, &cfg.tls_ca_path)
            .context("failed to load client TLS identity")?;
    let tls = identity
        .client_tls_config(&cfg.server_name)
        .context("failed to build client TLS configuration")?;

    let client = match Endpoint::new(&cfg.server_addr, tls)
        .credentials(BearerToken::new(cfg.auth_token.clone()))
        .timeout(cfg.call_timeout())
        .connect()
        .await
    {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "could not connect");
            return Ok(ExitCode::FAILURE);
        }
    };

    let product = Product::new(
        cfg.product_name.clone(),
        cfg.product_description.clone(),
        cfg.product_price,
    );
    let id = match client.add_product(product).await {
        Ok(id) => id,
        Err(status) => {
            log_status("AddProduct", &status);
            return Ok(ExitCode::FAILURE);
        }
    };
    info!(product_id = %id.value, "product added successfully");

    match client.get_product(id).await {
        Ok(product) => {
            info!(
                id = %product.id,
                name = %product.name,
                description = %product.description,
                price = product.price,
                "product retrieved"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(status) => {
            log_status("GetProduct", &status);
            Ok(ExitCode::FAILURE)
        }
    }
}
