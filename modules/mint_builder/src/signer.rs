//! Two-phase signing: the wallet signs the bare body, then its key witnesses
//! are merged into the script witness set.

use std::{collections::BTreeSet, sync::Arc};

use minter_codec::{Transaction, VKeyWitness, WitnessSet, witness_set_script_data_hash};
use minter_common::{
    AddrKeyhash, CostModels, MintError, TxHash, collaborators::Wallet, crypto::keyhash_224,
};
use tracing::{debug, info, instrument};

use crate::finalizer::FinalizedTransaction;

/// A transaction carrying every witness it needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub tx_hash: TxHash,
    bytes: Vec<u8>,
}

impl SignedTransaction {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Combine the script witnesses with the wallet's key witnesses. Key
/// witnesses are deduplicated by verification key; every other component is
/// taken from `script_witnesses` untouched.
pub fn merge_witnesses(script_witnesses: &WitnessSet, wallet_witnesses: WitnessSet) -> WitnessSet {
    let mut seen = BTreeSet::new();
    let mut vkeys: Vec<VKeyWitness> = Vec::new();
    for witness in script_witnesses.vkeys.iter().cloned().chain(wallet_witnesses.vkeys) {
        if seen.insert(witness.vkey) {
            vkeys.push(witness);
        }
    }
    WitnessSet {
        vkeys,
        ..script_witnesses.clone()
    }
}

/// Recompute the commitment from the merged witnesses and compare it with the
/// one the body carries
pub fn verify_commitment(
    transaction: &Transaction,
    cost_models: &CostModels,
) -> Result<(), MintError> {
    let recomputed = witness_set_script_data_hash(&transaction.witness_set, cost_models)
        .map_err(|e| MintError::Codec(format!("{e:#}")))?
        .unwrap_or_default();
    let embedded = transaction.body.script_data_hash;
    if embedded != Some(recomputed) {
        return Err(MintError::CommitmentMismatch {
            embedded,
            recomputed,
        });
    }
    Ok(())
}

pub struct DualPhaseSigner {
    wallet: Arc<dyn Wallet>,
    partial: bool,
}

impl DualPhaseSigner {
    pub fn new(wallet: Arc<dyn Wallet>, partial: bool) -> Self {
        Self { wallet, partial }
    }

    #[instrument(skip_all)]
    pub async fn sign(
        &self,
        finalized: FinalizedTransaction,
        cost_models: &CostModels,
    ) -> Result<SignedTransaction, MintError> {
        // Phase A: the wallet sees the final body with no witnesses at all
        let unsigned = Transaction::new(finalized.body().clone(), WitnessSet::default());
        let unsigned = unsigned.to_bytes().map_err(|e| MintError::Codec(format!("{e:#}")))?;
        let returned = self
            .wallet
            .sign_tx(&unsigned, self.partial)
            .await
            .map_err(|e| MintError::WalletRejected(format!("{e:#}")))?;
        let wallet_witnesses = WitnessSet::from_bytes(&returned)
            .map_err(|e| MintError::InvalidWalletData(format!("{e:#}")))?;
        if wallet_witnesses.vkeys.is_empty() {
            return Err(MintError::WalletRejected("wallet returned no signatures".into()));
        }
        debug!("Wallet returned {} key witnesses", wallet_witnesses.vkeys.len());

        let signers: BTreeSet<AddrKeyhash> =
            wallet_witnesses.vkeys.iter().map(|w| keyhash_224(&w.vkey)).collect();
        if let Some(missing) =
            finalized.body().required_signers.iter().find(|key| !signers.contains(key))
        {
            return Err(MintError::WalletRejected(format!(
                "no signature from required signer {missing}"
            )));
        }

        // Phase B: merge and check nothing the commitment covers moved
        let FinalizedTransaction { transaction, .. } = finalized;
        let witness_set = merge_witnesses(&transaction.witness_set, wallet_witnesses);
        let transaction = Transaction {
            witness_set,
            ..transaction
        };
        verify_commitment(&transaction, cost_models)?;

        let tx_hash = transaction.id().map_err(|e| MintError::Codec(format!("{e:#}")))?;
        let bytes = transaction.to_bytes().map_err(|e| MintError::Codec(format!("{e:#}")))?;
        info!("Signed transaction {tx_hash}, {} bytes", bytes.len());
        Ok(SignedTransaction {
            transaction,
            tx_hash,
            bytes,
        })
    }
}
