mod config;

use std::sync::Arc;

use tracing::info;

use framecast_stream::{FileSource, SenderConfig, StopSignal, TracingLogger, bind_listener, serve};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "framecast_server=info,framecast_stream=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = ServerConfig::from_env(&args)?;

    let listener = bind_listener(config.bind_addr)?;
    info!("Frame stream server listening on {}", config.bind_addr);
    info!("Frame rate: {} fps", config.fps);
    info!("Payload file: {}", config.payload_path.display());
    info!("Waiting for clients...");

    let sender_config = SenderConfig {
        fps: config.fps,
        chunk_size: config.chunk_size,
        backpressure_timeout: config.backpressure_timeout,
        logger: Arc::new(TracingLogger),
        ..Default::default()
    };
    let source = FileSource::new(config.payload_path.clone());
    let stop = StopSignal::new();

    let loop_stop = stop.clone();
    let mut accept_loop =
        tokio::task::spawn_blocking(move || serve(listener, &source, &sender_config, &loop_stop));

    let served = tokio::select! {
        result = &mut accept_loop => result??,
        _ = shutdown_signal() => {
            stop.stop();
            accept_loop.await??
        }
    };
    info!("Server shut down after {} connection(s)", served);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
