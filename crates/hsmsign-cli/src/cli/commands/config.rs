//! `hsmsign config` – show where the config lives and what is in effect.

use anyhow::Result;
use hsmsign_core::config::SignerConfig;
use std::path::Path;

pub fn run_config(cfg: &SignerConfig, path: &Path) -> Result<()> {
    let retry = cfg.retry_policy()?;
    println!("config file:     {}", path.display());
    println!("endpoint:        {}", cfg.endpoint);
    println!("api version:     {}", cfg.api_version);
    println!("request timeout: {}s", cfg.request_timeout_secs);
    println!(
        "retry:           {} attempts, delay {:?}..{:?} (+{:?} step)",
        retry.max_attempts, retry.backoff.min_delay, retry.backoff.max_delay, retry.backoff.delta_delay
    );
    Ok(())
}
