//! `hsmsign sign` – request a signature and print it.

use anyhow::{Context, Result};
use hsmsign_core::config::SignerConfig;
use hsmsign_core::SigningClient;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Arguments of the sign command after CLI parsing.
#[derive(Debug, Clone)]
pub struct SignArgs {
    pub key: String,
    pub data: Option<String>,
    pub file: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub api_version: Option<String>,
}

/// Config with command-line overrides applied.
pub(crate) fn effective_config(cfg: &SignerConfig, args: &SignArgs) -> SignerConfig {
    let mut cfg = cfg.clone();
    if let Some(endpoint) = &args.endpoint {
        cfg.endpoint = endpoint.clone();
    }
    if let Some(version) = &args.api_version {
        cfg.api_version = version.clone();
    }
    cfg
}

fn payload(args: &SignArgs) -> Result<Vec<u8>> {
    match (&args.data, &args.file) {
        (Some(text), _) => Ok(text.as_bytes().to_vec()),
        (None, Some(path)) => {
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))
        }
        (None, None) => anyhow::bail!("either --data or --file is required"),
    }
}

pub async fn run_sign(cfg: &SignerConfig, args: SignArgs) -> Result<()> {
    let cfg = effective_config(cfg, &args);
    let client = SigningClient::from_config(&cfg)?;
    let data = payload(&args)?;

    // Ctrl-C abandons the in-flight exchange or backoff sleep.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let signature = client
        .sign_with_cancel(&args.key, &data, &cancel)
        .await
        .with_context(|| format!("signing with key {:?} via {}", args.key, cfg.endpoint))?;
    println!("{}", signature);
    Ok(())
}
