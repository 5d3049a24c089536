use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use minter_common::{
    TxHash,
    collaborators::{SubmissionGateway, Wallet},
};
use tracing::info;

/// Hands the signed transaction back to the wallet for broadcast
pub struct WalletSubmitter {
    wallet: Arc<dyn Wallet>,
}

impl WalletSubmitter {
    pub fn new(wallet: Arc<dyn Wallet>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl SubmissionGateway for WalletSubmitter {
    async fn submit(&self, tx: &[u8]) -> Result<TxHash> {
        let tx_hash = self.wallet.submit_tx(tx).await?;
        info!("Wallet accepted transaction {tx_hash}");
        Ok(tx_hash)
    }
}
