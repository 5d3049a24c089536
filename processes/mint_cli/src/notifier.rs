use anyhow::Result;
use async_trait::async_trait;
use minter_common::{
    MintError, Network, TxHash,
    collaborators::{MintReceipt, Notifier},
};
use tracing::{error, info};

/// Explorer page for a transaction
pub fn cardanoscan_link(network: Network, tx_hash: &TxHash) -> String {
    let prefix = match network {
        Network::Mainnet => "",
        Network::Preview => "preview.",
        Network::Preprod => "preprod.",
    };
    format!("https://{prefix}cardanoscan.io/transaction/{tx_hash}")
}

/// Reports outcomes in the log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn success(&self, receipt: &MintReceipt) -> Result<()> {
        info!(
            "Minted to {}: {}",
            receipt.payment_address,
            cardanoscan_link(receipt.network, &receipt.tx_hash)
        );
        Ok(())
    }

    async fn failure(&self, error: &MintError) -> Result<()> {
        error!("Mint failed: {error}");
        Ok(())
    }
}
