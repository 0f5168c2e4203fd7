//! Escrow Gateway: reverse proxy that stores POST responses server-side
//! behind single-use redirect tokens, making non-idempotent results
//! reload-safe, and rewrites submission/redirect URLs between an insecure
//! and secure domain pair.

mod config;
mod error;
mod escrow;
mod rewrite;
mod routes;
mod server;
mod store;

use std::sync::Arc;
use std::time::Duration;

use config::GatewayConfig;
use escrow::engine::EscrowEngine;
use rewrite::DomainRewriter;
use routes::RouteTable;
use server::AppState;
use store::MemoryStore;

fn main() -> anyhow::Result<()> {
    // Determine config path
    let config_path = {
        let args: Vec<String> = std::env::args().collect();
        // Check for --config flag first
        args.iter()
            .position(|a| a == "--config")
            .and_then(|i| args.get(i + 1).cloned())
            // Fall back to positional arg
            .or_else(|| args.get(1).filter(|a| !a.starts_with('-')).cloned())
            .or_else(|| std::env::var("ESCROW_GATEWAY_CONFIG").ok())
            .unwrap_or_else(|| "escrow-gateway.toml".to_string())
    };

    // Load configuration
    let config = GatewayConfig::load(&config_path)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        escrow_tracing::init_tracing(&config.tracing)?;

        tracing::info!(
            config_path = %config_path,
            listen_address = %config.server.listen_address,
            upstream_base = %config.upstream.base_url,
            routes = config.routes.len(),
            ttl_secs = config.escrow.ttl_secs,
            "Starting escrow-gateway"
        );

        run(config).await
    })
}

async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    // Downstream HTTP client; its timeout bounds every store-free blocking
    // call the gateway makes.
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.upstream.timeout_secs))
        .build()?;

    let rewriter = DomainRewriter::new(
        config.domains.insecure.clone(),
        config.domains.secure.clone(),
    );
    let engine = EscrowEngine::new(
        MemoryStore::new(),
        RouteTable::new(&config.routes),
        rewriter,
        &config.escrow,
    );

    let state = AppState {
        config,
        engine: Arc::new(engine),
        client,
    };

    server::run(state).await
}
