use crate::retry::{ExponentialBackoff, RetryPolicy};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Workload API version sent with every sign request unless configured otherwise.
pub const DEFAULT_API_VERSION: &str = "2018-06-28";

/// Workload socket of a stock edge runtime install.
pub const DEFAULT_ENDPOINT: &str = "unix:///var/run/iotedge/workload.sock";

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per sign call (including the first).
    pub max_attempts: u32,
    /// Delay in seconds before the first retry.
    pub min_delay_secs: f64,
    /// Upper bound on any single backoff delay, in seconds.
    pub max_delay_secs: f64,
    /// Growth step in seconds; retry n waits `min + delta * (2^n - 1)`.
    pub delta_delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay_secs: 2.0,
            max_delay_secs: 30.0,
            delta_delay_secs: 3.0,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> Result<RetryPolicy> {
        if self.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        let secs = |name: &str, v: f64| {
            Duration::try_from_secs_f64(v).with_context(|| format!("retry.{} = {} is not a valid delay", name, v))
        };
        Ok(RetryPolicy::new(
            self.max_attempts,
            ExponentialBackoff::new(
                secs("min_delay_secs", self.min_delay_secs)?,
                secs("max_delay_secs", self.max_delay_secs)?,
                secs("delta_delay_secs", self.delta_delay_secs)?,
            ),
        ))
    }
}

/// Signer configuration loaded from `~/.config/hsmsign/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignerConfig {
    /// `unix:///path/to.sock` or `http://host:port`.
    pub endpoint: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Upper bound on one request/response exchange, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_version: default_api_version(),
            request_timeout_secs: default_request_timeout_secs(),
            retry: None,
        }
    }
}

impl SignerConfig {
    /// Rejects values that would only fail later, at sign time.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            bail!("endpoint must not be empty");
        }
        if self.api_version.trim().is_empty() {
            bail!("api_version must not be empty");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        self.retry.clone().unwrap_or_default().to_policy()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hsmsign")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SignerConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SignerConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load and validate configuration from an explicit file.
pub fn load_from(path: &Path) -> Result<SignerConfig> {
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let cfg: SignerConfig =
        toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
