//! grpc-http-proxy entry point
//!
//! Serves `POST /proxy/:service/:method` over HTTP and forwards each call to
//! the configured gRPC upstream.

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use proxy_lib::{ProxyBuilder, ProxyConfig};

async fn run_server() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grpc_http_proxy=info,proxy_lib=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = ProxyConfig::load().context("Failed to load configuration")?;
    tracing::info!("Starting grpc-http-proxy v{}", config.version);
    tracing::info!("Upstream target {}", config.client.target);

    let proxy = ProxyBuilder::from_config(&config)
        .build()
        .await
        .context("Failed to build proxy")?;

    let listener = TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.http_addr))?;
    tracing::info!(
        "HTTP proxy listening on {} (mount point {})",
        config.http_addr,
        config.mount_point
    );

    axum::serve(listener, proxy.into_router())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "run" => {}
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                std::process::exit(2);
            }
        }
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_server())
}

fn print_help() {
    println!("grpc-http-proxy v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("USAGE:");
    println!("    grpc-http-proxy [run|--help]");
    println!();
    println!("ENVIRONMENT:");
    println!("    PROXY_CONFIG                 JSON configuration file");
    println!("    PROXY_HTTP_ADDR              HTTP listen address (default 0.0.0.0:8080)");
    println!("    PROXY_MOUNT_POINT            Path prefix for the proxy routes (default /)");
    println!("    PROXY_DEBUG                  Log arguments, results and timings (true/false)");
    println!("    PROXY_STATUS_POLICY          compat (always 500) or mapped");
    println!("    PROXY_GRPC_TARGET            Upstream address (default http://[::1]:50051)");
    println!("    PROXY_DESCRIPTOR_SETS        Comma-separated FileDescriptorSet files");
    println!("    PROXY_REFLECTION             Fetch descriptors via server reflection");
    println!("    PROXY_SERVICES               Comma-separated services to expose");
    println!("    PROXY_CONNECT_TIMEOUT_SECS   Upstream connect timeout (default 5)");
    println!("    RUST_LOG                     Log filter (default grpc_http_proxy=info)");
}
