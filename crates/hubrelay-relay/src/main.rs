//! hubrelay
//!
//! Local HTTP relay to a device hub over mutual TLS.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use hubrelay_core::config::{HTTP_KEY_ENV, PASSPHRASE_ENV, load_config};
use hubrelay_core::tracing_init::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "hubrelay")]
#[command(version, about = "Local HTTP relay to a device hub over mutual TLS")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(long, env = "HUBRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Local listen host.
    #[arg(long)]
    listen_host: Option<String>,

    /// Local listen port.
    #[arg(long)]
    listen_port: Option<u16>,

    /// Device hub host.
    #[arg(long)]
    peer_host: Option<String>,

    /// Device hub port.
    #[arg(long)]
    peer_port: Option<u16>,

    /// Directory holding the relay keystore.
    #[arg(long)]
    keystore_dir: Option<PathBuf>,

    /// Alias of the relay key-pair entry.
    #[arg(long)]
    keystore_alias: Option<String>,

    /// Keystore passphrase.
    #[arg(long, env = PASSPHRASE_ENV, hide_env_values = true)]
    keystore_passphrase: Option<String>,

    /// Published http key (decimal digits).
    #[arg(long, env = HTTP_KEY_ENV, hide_env_values = true)]
    http_key: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    apply_args(&mut config, &args);

    init_tracing("hubrelay_relay=info,tower_http=info", config.log_json)
        .context("Failed to install tracing subscriber")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %format!("{}:{}", config.listen.host, config.listen.port),
        peer = %format!("{}:{}", config.peer.host, config.peer.port),
        "Starting hubrelay"
    );

    config.validate()?;

    let keystore_dir = match config.keystore.directory.clone() {
        Some(dir) => dir,
        None => default_keystore_dir()?,
    };
    info!(path = %keystore_dir.display(), "Opening relay keystore");
    let credentials = hubrelay_relay::load_credentials(&config, &keystore_dir)?;

    let relay = hubrelay_relay::prepare(&config, credentials).await?;
    info!(peer = %relay.peer().fingerprint(), "Trust bootstrap complete");

    relay
        .run(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal");
            }
        })
        .await?;

    info!("Relay stopped");
    Ok(())
}

fn apply_args(config: &mut hubrelay_core::RelayConfig, args: &Args) {
    if let Some(host) = &args.listen_host {
        config.listen.host.clone_from(host);
    }
    if let Some(port) = args.listen_port {
        config.listen.port = port;
    }
    if let Some(host) = &args.peer_host {
        config.peer.host.clone_from(host);
    }
    if let Some(port) = args.peer_port {
        config.peer.port = port;
    }
    if let Some(dir) = &args.keystore_dir {
        config.keystore.directory = Some(dir.clone());
    }
    if let Some(alias) = &args.keystore_alias {
        config.keystore.alias.clone_from(alias);
    }
    if let Some(passphrase) = &args.keystore_passphrase {
        config.keystore.passphrase = Some(passphrase.clone());
    }
    if let Some(key) = &args.http_key {
        config.http_key = Some(key.clone());
    }
    if args.log_json {
        config.log_json = true;
    }
}

fn default_keystore_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine config directory"))?;
    Ok(base.join("hubrelay").join("keystore"))
}
