use anyhow::Result;
use clap::Parser;
use server::{build_app, CorpusManager};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Directory holding corpus snapshots
    #[arg(long, default_value = "./data")]
    data_dir: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Seconds a mutated index may stay dirty before the autosaver writes it
    #[arg(long, default_value_t = 300)]
    autosave_delay: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let manager = Arc::new(CorpusManager::new(
        &args.data_dir,
        Some(Duration::from_secs(args.autosave_delay)),
    ));
    let app = build_app(manager.clone());

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // flush anything still dirty before the process goes away
    manager.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "couldn't listen for shutdown signal");
    }
}
