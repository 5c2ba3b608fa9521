mod config;

use tracing::{error, info};

use framecast_stream::{
    DirectorySink, NullSink, PayloadSink, ReceiverConfig, StopSignal, connect,
    run_receiver_session,
};

use crate::config::ClientConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "framecast_client=info,framecast_stream=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = ClientConfig::from_env(&args)?;

    let mut sink: Box<dyn PayloadSink> = if config.save_frames {
        let sink = DirectorySink::create(&config.output_dir)?;
        info!("Saving frames to {}", sink.dir().display());
        Box::new(sink)
    } else {
        Box::new(NullSink)
    };

    info!("Connecting to {}...", config.server_addr);
    let stream = connect(config.server_addr, Some(config.read_timeout))?;
    info!("Connected, receiving frame stream");

    let receiver_config = ReceiverConfig {
        max_frames: config.max_frames,
        ..Default::default()
    };
    let stop = StopSignal::new();
    let session_stop = stop.clone();
    let peer = config.server_addr.to_string();

    let mut session = tokio::task::spawn_blocking(move || {
        run_receiver_session(stream, &peer, sink.as_mut(), &receiver_config, &session_stop)
    });

    let result = tokio::select! {
        result = &mut session => result?,
        _ = shutdown_signal() => {
            stop.stop();
            session.await?
        }
    };

    match result {
        Ok(summary) => {
            info!("Receive complete ({:?})", summary.end);
            info!("Total frames: {}", summary.frames);
            info!("Total time: {:.2} s", summary.elapsed.as_secs_f64());
            info!("Average frame rate: {:.2} fps", summary.fps());
            if summary.gaps > 0 {
                info!("Sequence gaps: {}", summary.gaps);
            }
            Ok(())
        }
        Err(e) => {
            error!("Receive failed: {}", e);
            Err(e.into())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, stopping..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, stopping..."),
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, stopping...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, stopping...");
    }
}
