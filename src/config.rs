use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use url::Url;

use crate::scheduler::ErrorPolicy;
use crate::utils::parse_interval;

pub const DEFAULT_API_URL: &str = "https://api.nature.global/";

/// A Prometheus exporter for Nature Remo
///
/// Collects sensor readings from the Nature Remo Cloud API and exposes them
/// in a format Prometheus can scrape.
#[derive(Debug, Clone, Parser)]
#[command(name = "nature-remo-exporter", version, about, long_about)]
pub struct ExporterConfig {
    /// Port to listen on
    #[arg(long, env = "NATURE_REMO_EXPORTER_PORT", default_value_t = 9199)]
    pub port: u16,

    /// Address to bind the metrics server to
    #[arg(
        long,
        env = "NATURE_REMO_EXPORTER_LISTEN_ADDRESS",
        default_value = "0.0.0.0"
    )]
    pub listen_address: IpAddr,

    /// Interval between metrics refresh (e.g. 30s, 1m30s)
    #[arg(
        long,
        env = "NATURE_REMO_EXPORTER_INTERVAL",
        default_value = "30s",
        value_parser = parse_interval
    )]
    pub interval: Duration,

    /// Nature Remo access token
    #[arg(long, env = "NATURE_REMO_ACCESS_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Exit after the first failed refresh instead of retrying on the next interval
    #[arg(long, env = "NATURE_REMO_EXPORTER_EXIT_ON_ERROR")]
    pub exit_on_error: bool,

    /// Base URL of the Nature Remo Cloud API
    #[arg(long, env = "NATURE_REMO_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: Url,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Args(#[from] clap::Error),

    #[error("Nature Remo access token is empty. Set --token or NATURE_REMO_ACCESS_TOKEN")]
    MissingToken,
}

impl ExporterConfig {
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();

        Self::from_args(std::env::args_os())
    }

    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let config = Self::try_parse_from(args)?;
        if config.token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        Ok(config)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.port)
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        if self.exit_on_error {
            ErrorPolicy::Stop
        } else {
            ErrorPolicy::Continue
        }
    }
}
