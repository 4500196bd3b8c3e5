//! Planning-poker server.
//!
//! ```text
//! ESTIMA_BIND_ADDR=0.0.0.0:8080 \
//! ESTIMA_ALLOWED_ORIGINS=https://poker.example \
//! RUST_LOG=info cargo run -p planning-poker
//! ```

use estima::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info")?;

    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        origins = ?config.allowed_origins,
        idle_timeout_secs = config.idle_timeout_secs,
        "starting planning-poker server"
    );

    let server = EstimaServer::builder().config(config).build().await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    tracing::info!("planning-poker server stopped");
    Ok(())
}
