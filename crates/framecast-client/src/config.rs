use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

use framecast_stream::READ_POLL_INTERVAL;

/// Client configuration, read once at start-up.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: SocketAddr,
    /// Persist every received frame to `output_dir`.
    pub save_frames: bool,
    pub output_dir: PathBuf,
    /// `None` receives until the server closes.
    pub max_frames: Option<u64>,
    pub read_timeout: Duration,
}

const USAGE: &str = "usage: framecast-client <server_host> [port] [-s] [-d dir] [-n max_frames]";

/// Command-line overrides for the environment.
#[derive(Debug, Default, PartialEq)]
struct ClientArgs {
    server: Option<String>,
    port: Option<u16>,
    save: bool,
    output_dir: Option<PathBuf>,
    max_frames: Option<u64>,
}

impl ClientArgs {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let mut parsed = Self::default();
        let mut positional = Vec::new();
        let mut iter = args.iter();

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-s" => parsed.save = true,
                "-d" => {
                    let dir = iter
                        .next()
                        .with_context(|| format!("-d needs a directory\n{}", USAGE))?;
                    parsed.output_dir = Some(dir.into());
                    parsed.save = true;
                }
                "-n" => {
                    let n = iter.next().with_context(|| format!("-n needs a count\n{}", USAGE))?;
                    let n = n
                        .parse::<u64>()
                        .with_context(|| format!("invalid frame count {}", n))?;
                    parsed.max_frames = Some(n);
                }
                flag if flag.starts_with('-') => bail!("unknown option {}\n{}", flag, USAGE),
                value => positional.push(value),
            }
        }

        match positional.as_slice() {
            [] => {}
            [server] => parsed.server = Some(server.to_string()),
            [server, port] => {
                parsed.server = Some(server.to_string());
                let port = port
                    .parse::<u16>()
                    .with_context(|| format!("invalid port {}", port))?;
                parsed.port = Some(port);
            }
            _ => bail!("unexpected arguments\n{}", USAGE),
        }
        Ok(parsed)
    }
}

impl ClientConfig {
    /// Load from `FRAMECAST_*` environment variables. Command-line
    /// arguments, when given, take precedence.
    pub fn from_env(args: &[String]) -> anyhow::Result<Self> {
        let args = ClientArgs::parse(args)?;
        let host = match args.server.or_else(|| std::env::var("FRAMECAST_SERVER").ok()) {
            Some(h) if !h.is_empty() => h,
            _ => bail!("{} (or set FRAMECAST_SERVER)", USAGE),
        };
        let port: u16 = match args.port {
            Some(port) => port,
            None => std::env::var("FRAMECAST_PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .context("FRAMECAST_PORT")?,
        };
        let server_addr = (host.as_str(), port)
            .to_socket_addrs()
            .with_context(|| format!("invalid server address {}", host))?
            .next()
            .with_context(|| format!("no address found for {}", host))?;

        let save_frames = args.save
            || std::env::var("FRAMECAST_SAVE")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false);
        let output_dir: PathBuf = match args.output_dir {
            Some(dir) => dir,
            None => std::env::var("FRAMECAST_OUTPUT_DIR")
                .unwrap_or_else(|_| "./frames".into())
                .into(),
        };

        let max_frames = match args.max_frames {
            Some(n) => Some(n),
            None => std::env::var("FRAMECAST_MAX_FRAMES")
                .ok()
                .map(|v| v.parse::<u64>())
                .transpose()
                .context("FRAMECAST_MAX_FRAMES")?,
        }
        .filter(|&n| n > 0);

        let read_timeout = std::env::var("FRAMECAST_READ_TIMEOUT_MS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("FRAMECAST_READ_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(READ_POLL_INTERVAL);
        if read_timeout.is_zero() {
            bail!("FRAMECAST_READ_TIMEOUT_MS must be greater than zero");
        }

        Ok(Self {
            server_addr,
            save_frames,
            output_dir,
            max_frames,
            read_timeout,
        })
    }
}
