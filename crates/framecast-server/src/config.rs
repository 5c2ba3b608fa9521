use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

use framecast_stream::CHUNK_SIZE;

/// Server configuration, read once at start-up.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub payload_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub fps: u32,
    pub chunk_size: usize,
    pub backpressure_timeout: Option<Duration>,
}

const USAGE: &str = "usage: framecast-server <payload_file> [port]";

/// Command-line overrides for the environment.
#[derive(Debug, Default, PartialEq)]
struct ServerArgs {
    payload: Option<String>,
    port: Option<u16>,
}

impl ServerArgs {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        match args {
            [] => Ok(Self::default()),
            [payload] => Ok(Self {
                payload: Some(payload.clone()),
                port: None,
            }),
            [payload, port] => {
                let port = port
                    .parse::<u16>()
                    .with_context(|| format!("invalid port {}", port))?;
                Ok(Self {
                    payload: Some(payload.clone()),
                    port: Some(port),
                })
            }
            _ => bail!("unexpected arguments\n{}", USAGE),
        }
    }
}

impl ServerConfig {
    /// Load from `FRAMECAST_*` environment variables. Positional arguments
    /// `<payload_file> [port]` override `FRAMECAST_PAYLOAD` and `FRAMECAST_PORT`.
    pub fn from_env(args: &[String]) -> anyhow::Result<Self> {
        let args = ServerArgs::parse(args)?;
        let payload_path: PathBuf =
            match args.payload.or_else(|| std::env::var("FRAMECAST_PAYLOAD").ok()) {
                Some(p) if !p.is_empty() => p.into(),
                _ => bail!("{} (or set FRAMECAST_PAYLOAD)", USAGE),
            };

        let host = std::env::var("FRAMECAST_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = match args.port {
            Some(port) => port,
            None => std::env::var("FRAMECAST_PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .context("FRAMECAST_PORT")?,
        };
        let bind_addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("FRAMECAST_HOST")?;

        let fps: u32 = std::env::var("FRAMECAST_FPS")
            .unwrap_or_else(|_| "15".into())
            .parse()
            .context("FRAMECAST_FPS")?;
        if fps == 0 {
            bail!("FRAMECAST_FPS must be greater than zero");
        }

        let chunk_size: usize = std::env::var("FRAMECAST_CHUNK_SIZE")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("FRAMECAST_CHUNK_SIZE")?
            .unwrap_or(CHUNK_SIZE);

        let backpressure_timeout = std::env::var("FRAMECAST_BACKPRESSURE_TIMEOUT_MS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("FRAMECAST_BACKPRESSURE_TIMEOUT_MS")?
            .map(Duration::from_millis);

        Ok(Self {
            payload_path,
            bind_addr,
            fps,
            chunk_size,
            backpressure_timeout,
        })
    }
}
