//! Interfaces to the systems a build talks to but does not own

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::{
    protocol_params::ProtocolParams, EvaluationResult, MintError, Network, NetworkId, Slot,
    TxHash,
};

/// A CIP-30 style wallet. Byte payloads are the raw CBOR the wallet speaks,
/// addresses are raw address bytes.
#[async_trait]
pub trait Wallet: Send + Sync {
    async fn network_id(&self) -> Result<NetworkId>;

    async fn used_addresses(&self) -> Result<Vec<Vec<u8>>>;

    async fn reward_addresses(&self) -> Result<Vec<Vec<u8>>>;

    /// Encoded `[input, output]` pairs
    async fn utxos(&self) -> Result<Vec<Vec<u8>>>;

    /// Wallet-designated collateral, `None` when the wallet has no such concept
    async fn collateral(&self) -> Result<Option<Vec<Vec<u8>>>>;

    /// Sign a transaction, returning an encoded witness set holding only vkey witnesses
    async fn sign_tx(&self, tx: &[u8], partial: bool) -> Result<Vec<u8>>;

    async fn submit_tx(&self, tx: &[u8]) -> Result<TxHash>;
}

/// Remote execution unit evaluation
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, draft: &[u8], network: Network) -> Result<EvaluationResult>;
}

/// Chain queries needed once per build
#[async_trait]
pub trait ChainParams: Send + Sync {
    async fn protocol_params(&self, network: Network) -> Result<ProtocolParams>;

    async fn latest_slot(&self, network: Network) -> Result<Slot>;
}

/// Where a signed transaction is sent
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    async fn submit(&self, tx: &[u8]) -> Result<TxHash>;
}

/// Result of a successful build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintReceipt {
    pub tx_hash: TxHash,
    pub payment_address: String,
    pub network: Network,
}

/// Presentation hooks invoked only once a build has finished
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn success(&self, receipt: &MintReceipt) -> Result<()>;

    async fn failure(&self, error: &MintError) -> Result<()>;
}
