use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::validate_key;
use crate::client::ClientSettings;
use crate::http_client::ExecutorConfig;

/// Longest access token lifetime accepted on the command line (ten years)
pub const MAX_EXPIRES_IN_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Tandem API client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// API base URL
    #[arg(short = 'u', long, env = "TANDEM_API_BASE_URL")]
    pub base_url: Option<String>,

    /// Path to the credential database
    #[arg(short = 'd', long, env = "TANDEM_DB_FILE", default_value = "~/.tandem/credentials.db")]
    pub db_file: String,

    /// Base64-encoded 32-byte key sealing the credential database
    #[arg(short = 'k', long, env = "TANDEM_STORE_KEY", hide_env_values = true)]
    pub store_key: Option<String>,

    /// Path of the token refresh endpoint
    #[arg(long, env = "TANDEM_REFRESH_PATH", default_value = "/api/v1/auth/refresh")]
    pub refresh_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    /// Maximum physical sends per request
    #[arg(long, env = "HTTP_MAX_ATTEMPTS", default_value = "3")]
    pub http_max_attempts: u32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show the cached session
    Status,

    /// Store a session obtained elsewhere
    SignIn {
        #[arg(long)]
        access_token: String,
        #[arg(long)]
        refresh_token: String,
        /// Access token lifetime in seconds
        #[arg(long, default_value = "3600", value_parser = clap::value_parser!(i64).range(1..=MAX_EXPIRES_IN_SECS))]
        expires_in: i64,
    },

    /// Forget the stored session
    SignOut,

    /// GET an API path and print the JSON body
    Get {
        path: String,
        /// Send without credentials
        #[arg(long)]
        public: bool,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: String,
    pub db_file: PathBuf,
    pub store_key: String,
    pub refresh_path: String,

    // HTTP client
    pub http_max_connections: usize,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,
    pub http_max_attempts: u32,

    pub log_level: String,
}

impl Config {
    /// Load configuration with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let config = Self::from_args(&args)?;
        Ok((config, args.command))
    }

    pub fn from_args(args: &CliArgs) -> Result<Self> {
        Ok(Config {
            base_url: args
                .base_url
                .clone()
                .context("TANDEM_API_BASE_URL is required (use -u or set TANDEM_API_BASE_URL env var)")?,

            db_file: expand_tilde(&args.db_file),

            store_key: args
                .store_key
                .clone()
                .context("TANDEM_STORE_KEY is required (use -k or set TANDEM_STORE_KEY env var)")?,

            refresh_path: args.refresh_path.clone(),

            http_max_connections: env_or("HTTP_MAX_CONNECTIONS", 20),
            http_connect_timeout: env_or("HTTP_CONNECT_TIMEOUT", 10),
            http_request_timeout: args.http_timeout,
            http_max_attempts: args.http_max_attempts,

            log_level: args.log_level.clone(),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("TANDEM_API_BASE_URL is not a valid URL: {}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("TANDEM_API_BASE_URL must be http or https: {}", self.base_url);
        }

        if !self.refresh_path.starts_with('/') {
            anyhow::bail!("TANDEM_REFRESH_PATH must start with '/': {}", self.refresh_path);
        }

        validate_key(&self.store_key).context("TANDEM_STORE_KEY is invalid")?;

        if self.http_max_attempts == 0 {
            anyhow::bail!("HTTP_MAX_ATTEMPTS must be at least 1");
        }

        Ok(())
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.clone(),
            refresh_path: self.refresh_path.clone(),
            executor: ExecutorConfig {
                max_connections: self.http_max_connections,
                connect_timeout: Duration::from_secs(self.http_connect_timeout),
                request_timeout: Duration::from_secs(self.http_request_timeout),
                max_attempts: self.http_max_attempts,
            },
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
