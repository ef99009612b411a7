// src/config.rs

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::blockchain::endpoint_pool::{DEFAULT_COOLDOWN, DEFAULT_DEMOTION_THRESHOLD};
use crate::blockchain::retry::RetryPolicy;

/// Public Ethereum mainnet endpoints, tried in this order. None need an API key.
pub const PUBLIC_RPC_URLS: [&str; 4] = [
    "https://eth.llamarpc.com",
    "https://ethereum.publicnode.com",
    "https://eth-mainnet.public.blastapi.io",
    "https://cloudflare-eth.com",
];

// All configuration, loaded once at startup from the environment (and .env).
#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub port: u16,
    pub mcp_mode: bool,

    /// Ordered RPC endpoint list; the order is the initial trial order.
    pub rpc_urls: Vec<String>,

    // Retry settings
    pub rpc_timeout: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub call_deadline: Duration,

    // Endpoint health settings
    pub demotion_threshold: u32,
    pub cooldown: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            port: 8080,
            mcp_mode: false,
            rpc_urls: PUBLIC_RPC_URLS.iter().map(|u| u.to_string()).collect(),
            rpc_timeout: policy.attempt_timeout,
            max_retries: policy.max_attempts,
            base_backoff: policy.base_backoff,
            max_backoff: policy.max_backoff,
            call_deadline: policy.call_deadline,
            demotion_threshold: DEFAULT_DEMOTION_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a valid number, got '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

/// Accepts either a JSON array (`["https://a", "https://b"]`) or a comma list.
pub fn parse_rpc_urls(raw: &str) -> Result<Vec<String>> {
    let raw = raw.trim();
    let urls: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str(raw).context("RPC_URLS is not a valid JSON array of strings")?
    } else {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    };

    if urls.is_empty() {
        return Err(anyhow!("RPC_URLS must contain at least one endpoint"));
    }
    for u in &urls {
        url::Url::parse(u).with_context(|| format!("Invalid URL in RPC_URLS: '{}'", u))?;
    }
    Ok(urls)
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load variables from the .env file into the environment
        dotenvy::dotenv().ok();

        let defaults = Config::default();
        let rpc_urls = match env::var("RPC_URLS") {
            Ok(raw) => parse_rpc_urls(&raw)?,
            Err(_) => defaults.rpc_urls,
        };

        Ok(Config {
            port: parse_var("PORT", defaults.port)?,
            mcp_mode: env::var("MCP_MODE").is_ok(),
            rpc_urls,
            rpc_timeout: Duration::from_secs(parse_var(
                "RPC_TIMEOUT_SECS",
                defaults.rpc_timeout.as_secs(),
            )?),
            max_retries: parse_var("MAX_RETRIES", defaults.max_retries)?,
            base_backoff: Duration::from_millis(parse_var(
                "BASE_BACKOFF_MS",
                defaults.base_backoff.as_millis() as u64,
            )?),
            max_backoff: Duration::from_millis(parse_var(
                "MAX_BACKOFF_MS",
                defaults.max_backoff.as_millis() as u64,
            )?),
            call_deadline: Duration::from_secs(parse_var(
                "CALL_DEADLINE_SECS",
                defaults.call_deadline.as_secs(),
            )?),
            demotion_threshold: parse_var("DEMOTION_THRESHOLD", defaults.demotion_threshold)?,
            cooldown: Duration::from_secs(parse_var("COOLDOWN_SECS", defaults.cooldown.as_secs())?),
        })
    }

    /// Applies command-line overrides: `--mcp`, `--rpc-timeout <secs>`,
    /// `--max-retries <n>`. Unknown arguments are ignored.
    pub fn apply_args<S: AsRef<str>>(&mut self, args: &[S]) -> Result<()> {
        let mut iter = args.iter().map(|a| a.as_ref());
        while let Some(arg) = iter.next() {
            match arg {
                "--mcp" => self.mcp_mode = true,
                "--rpc-timeout" => {
                    let value = iter.next().context("--rpc-timeout needs a value in seconds")?;
                    let secs: u64 = value
                        .parse()
                        .with_context(|| format!("--rpc-timeout must be a number, got '{}'", value))?;
                    self.rpc_timeout = Duration::from_secs(secs);
                }
                "--max-retries" => {
                    let value = iter.next().context("--max-retries needs a value")?;
                    self.max_retries = value
                        .parse()
                        .with_context(|| format!("--max-retries must be a number, got '{}'", value))?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Default retry policy for calls made through the shared client.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            base_backoff: self.base_backoff,
            max_backoff: self.max_backoff,
            attempt_timeout: self.rpc_timeout,
            call_deadline: self.call_deadline,
        }
    }
}
