//!
//! attribute aggregation server binary
//! -----------------------------------
//! Command-line entry point. Settings come from CLI flags, then environment variables, then defaults.

use anyhow::Result;
use std::env;

use attribute_aggregation::config::ServerConfig;

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let args: Vec<String> = env::args().collect();

    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("aa_server\n\nUSAGE:\n  aa_server [--http-port N] [--authorities PATH]\n\nOPTIONS:\n  --http-port N         HTTP API port (env: AA_HTTP_PORT, default 8087)\n  --authorities PATH    Attribute authorities JSON (env: AA_AUTHORITIES_CONFIG, default attributeAuthorities.json)\n");
        return Ok(());
    }

    let cfg = ServerConfig::from_env_and_args(&args);
    println!("aa_server starting: http={}, authorities={}", cfg.http_port, cfg.authorities_path.display());
    tracing::info!(target: "startup", "Using port: http={}, authorities={}", cfg.http_port, cfg.authorities_path.display());
    attribute_aggregation::server::run(cfg).await
}
