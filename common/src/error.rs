//! Failure reasons for a mint build

use thiserror::Error;

use crate::{Lovelace, NetworkId, RedeemerPointer, ScriptDataHash, TargetNetwork};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MintError {
    /// **Cause:** Neither the wallet's collateral nor any UTxO holds pure coin in range
    #[error("No collateral available in range [{min}, {max}]")]
    NoCollateralAvailable { min: Lovelace, max: Lovelace },

    /// **Cause:** The wallet is connected to a different network than the build targets
    #[error("Network mismatch: wallet is on {wallet}, build targets {target}")]
    NetworkMismatch {
        wallet: NetworkId,
        target: TargetNetwork,
    },

    /// **Cause:** The requested change is already reflected on chain
    #[error("Already in target state: {0}")]
    AlreadyInTargetState(String),

    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    /// **Cause:** The evaluator returned no execution units for a redeemer the draft declared
    #[error("Redeemer {0} was not evaluated")]
    RedeemerNotEvaluated(RedeemerPointer),

    #[error("Wallet rejected the request: {0}")]
    WalletRejected(String),

    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    /// **Cause:** A best-effort notification failed; never affects the transaction
    #[error("Presentation blocked: {0}")]
    PresentationBlocked(String),

    #[error("Insufficient funds: need {needed}, inputs provide {available}")]
    InsufficientFunds { needed: Lovelace, available: Lovelace },

    #[error("Collateral {provided} does not cover the required {required}")]
    InsufficientCollateral {
        required: Lovelace,
        provided: Lovelace,
    },

    #[error("Fee {fee} is below the minimum {minimum}")]
    FeeBelowMinimum { fee: Lovelace, minimum: Lovelace },

    #[error("Transaction is {size} bytes, the maximum is {max}")]
    TransactionTooLarge { size: usize, max: u32 },

    /// **Cause:** The body commits to different script data than the witness set carries
    #[error("Script data hash mismatch: body has {}, witnesses give {recomputed}",
        embedded.map(|h| h.to_string()).unwrap_or_else(|| "none".to_string()))]
    CommitmentMismatch {
        embedded: Option<ScriptDataHash>,
        recomputed: ScriptDataHash,
    },

    #[error("Invalid wallet data: {0}")]
    InvalidWalletData(String),

    #[error("Parameter fetch failed: {0}")]
    ParameterFetchFailed(String),

    /// **Cause:** The mint request itself cannot be built, e.g. a zero quantity
    #[error("Invalid mint request: {0}")]
    InvalidRequest(String),

    /// **Cause:** A build was started on a pipeline that already ran
    #[error("Pipeline already ran")]
    AlreadyRun,

    #[error("Codec: {0}")]
    Codec(String),
}
