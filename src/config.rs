use crate::cli::Args;
use crate::poller::Cadence;
use anyhow::{anyhow, bail, Context, Result};
use reqwest::Url;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: Url,
    pub cadence: Cadence,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        let server = parse_server(&args.server)?;

        if args.poll_interval_ms == 0 {
            bail!("poll interval must be greater than zero");
        }
        if args.timeout == 0 {
            bail!("request timeout must be greater than zero");
        }
        if args.max_poll_failures == Some(0) {
            bail!("--max-poll-failures must be at least 1");
        }

        Ok(Self {
            server,
            cadence: Cadence {
                interval: Duration::from_millis(args.poll_interval_ms),
                max_consecutive_failures: args.max_poll_failures,
            },
            request_timeout: Duration::from_secs(args.timeout),
        })
    }
}

/// Endpoints are joined onto the base, so it must end with a slash.
fn parse_server(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    let mut url = Url::parse(raw).with_context(|| format!("Invalid server URL: {}", raw))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!("Server URL must be http or https: {}", raw));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
