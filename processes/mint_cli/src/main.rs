//! 'main' for the mint CLI

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{Config, Environment, File};
use minter_codec::{Transaction, decode_hex};
use minter_common::{AssetName, Network, collaborators::Wallet};
use minter_module_mint_builder::{
    Collaborators, HttpChainParams, HttpEvaluator, MintConfig, MintPipeline, MintRequest,
    PipelineSettings, WalletSubmitter,
};
use serde::Deserialize;
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer as _, Registry, filter, fmt, layer::SubscriberExt as _,
    util::SubscriberInitExt as _,
};

mod bridge;
mod notifier;

use bridge::BridgeWallet;
use notifier::LogNotifier;

fn default_config_path() -> PathBuf {
    PathBuf::from(option_env!("MINTER_DEFAULT_CONFIG").unwrap_or("mint-cli.toml"))
}

#[derive(Parser, Debug)]
#[command(name = "mint-cli")]
#[command(about = "Build, sign and submit Plutus minting transactions")]
struct Args {
    /// Path to configuration.
    #[arg(long, default_value = default_config_path().into_os_string())]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mint (or burn, with a negative quantity) one asset under a configured policy
    Mint {
        /// Name of a configured policy
        #[arg(long)]
        policy: String,
        /// Asset name as UTF-8 text
        #[arg(long)]
        asset_name: String,
        #[arg(long, default_value = "1", allow_negative_numbers = true)]
        quantity: i64,
        /// Override the configured network
        #[arg(long)]
        network: Option<Network>,
        /// Override the wallet bridge URL
        #[arg(long)]
        wallet: Option<String>,
    },
    /// List configured policies and their ids
    Policies,
    /// Decode a transaction file (raw CBOR or hex) and print its summary
    Inspect { tx_file: PathBuf },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct WalletBridgeConfig {
    url: String,
    #[serde(default = "default_wallet_timeout")]
    timeout_secs: u64,
}

fn default_wallet_timeout() -> u64 {
    300
}

/// Settings read only by the CLI
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct CliConfig {
    wallet: WalletBridgeConfig,
}

#[tokio::main]
pub async fn main() -> Result<()> {
    let args = Args::try_parse()?;

    // Standard logging using RUST_LOG for log levels default to INFO for events only
    let fmt_layer = fmt::layer()
        .with_filter(EnvFilter::from_default_env().add_directive(filter::LevelFilter::INFO.into()))
        .with_filter(filter::filter_fn(|meta| meta.is_event()));
    Registry::default().with(fmt_layer).init();

    match args.command {
        Command::Mint {
            policy,
            asset_name,
            quantity,
            network,
            wallet,
        } => {
            let config = load_config(&args.config, network, wallet)?;
            mint(&config, &policy, &asset_name, quantity).await
        }
        Command::Policies => {
            let config = load_config(&args.config, None, None)?;
            list_policies(&config)
        }
        Command::Inspect { tx_file } => inspect(&tx_file).await,
    }
}

fn load_config(path: &PathBuf, network: Option<Network>, wallet: Option<String>) -> Result<Config> {
    let mut builder = Config::builder()
        .add_source(File::from(path.as_path()).required(false))
        .add_source(Environment::with_prefix("MINTER").separator("__"));
    if let Some(network) = network {
        builder = builder.set_override("network", network.name())?;
    }
    if let Some(wallet) = wallet {
        builder = builder.set_override("wallet.url", wallet)?;
    }
    Ok(builder.build()?)
}

async fn mint(config: &Config, policy: &str, asset_name: &str, quantity: i64) -> Result<()> {
    let mint_config = MintConfig::try_load(config)?;
    let cli_config: CliConfig =
        config.clone().try_deserialize().context("Invalid wallet bridge configuration")?;

    let request = MintRequest {
        policy: mint_config.policy(policy)?,
        asset_name: AssetName::from_utf8(asset_name)?,
        quantity,
    };
    info!(
        "Minting {quantity} '{asset_name}' under {} ({}) on {}",
        request.policy.name,
        request.policy.id(),
        mint_config.network
    );

    let wallet: Arc<dyn Wallet> = Arc::new(BridgeWallet::new(
        &cli_config.wallet.url,
        Duration::from_secs(cli_config.wallet.timeout_secs),
    )?);
    let collaborators = Collaborators {
        gateway: Arc::new(WalletSubmitter::new(wallet.clone())),
        wallet,
        evaluator: Arc::new(HttpEvaluator::new(&mint_config.evaluator)?),
        chain: Arc::new(HttpChainParams::new(&mint_config.parameters)?),
        notifier: Some(Arc::new(LogNotifier)),
    };

    let mut pipeline =
        MintPipeline::new(PipelineSettings::from(&mint_config), collaborators, request);
    let result = pipeline.run().await;
    if let Some(error) = pipeline.presentation_error() {
        warn!("{error}");
    }
    let receipt = result?;
    println!("{}", receipt.tx_hash);
    Ok(())
}

fn list_policies(config: &Config) -> Result<()> {
    let mint_config = MintConfig::try_load(config)?;
    for entry in &mint_config.policies {
        let policy = entry.to_policy()?;
        println!("{}\t{:?}\t{}", policy.name, policy.script.language, policy.id());
    }
    Ok(())
}

/// Accepts raw CBOR or its hex text
fn transaction_bytes(contents: &[u8]) -> Result<Vec<u8>> {
    match std::str::from_utf8(contents) {
        Ok(text) if !text.trim().is_empty() && text.trim().bytes().all(|b| b.is_ascii_hexdigit()) => {
            decode_hex(text)
        }
        _ => Ok(contents.to_vec()),
    }
}

async fn inspect(tx_file: &PathBuf) -> Result<()> {
    let contents = fs::read(tx_file)
        .await
        .with_context(|| format!("Failed to read {}", tx_file.display()))?;
    let tx = Transaction::from_bytes(&transaction_bytes(&contents)?)?;
    println!("id:               {}", tx.id()?);
    println!("fee:              {}", tx.body.fee);
    match tx.body.ttl {
        Some(ttl) => println!("ttl:              {ttl}"),
        None => println!("ttl:              none"),
    }
    match &tx.body.script_data_hash {
        Some(hash) => println!("script data hash: {hash}"),
        None => println!("script data hash: none"),
    }
    for (policy, assets) in tx.body.mint.iter() {
        for (name, quantity) in assets {
            println!("mint:             {policy}.{name} {quantity}");
        }
    }
    for signer in &tx.body.required_signers {
        println!("required signer:  {signer}");
    }
    println!(
        "witnesses:        {} vkey, {} script, {} datum, {} redeemer",
        tx.witness_set.vkeys.len(),
        tx.witness_set.plutus_scripts.len(),
        tx.witness_set.plutus_data.len(),
        tx.witness_set.redeemers.len()
    );
    Ok(())
}
