//! The mint pipeline: a single-shot, forward-only walk from configuration to
//! a submitted transaction.

use std::{fmt, sync::Arc};

use minter_codec::{address_network, address_to_bech32, decode_utxos, payment_key_hash};
use minter_common::{
    AssetName, ExUnits, MintError, Network, TargetNetwork,
    collaborators::{ChainParams, Evaluator, MintReceipt, Notifier, SubmissionGateway, Wallet},
};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    configuration::MintConfig,
    draft::DraftBuilder,
    finalizer::RedeemerFinalizer,
    selector::{CollateralRange, InputSelection, UtxoSelector},
    signer::DualPhaseSigner,
    witness::{MintingPolicy, WitnessAssembler, WitnessContext},
};

/// Where a pipeline run currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Configured,
    InputsSelected,
    DraftBuilt,
    Evaluated,
    Finalized,
    Signed,
    Submitted,
    Failed(MintError),
}

impl Stage {
    fn position(&self) -> Option<u8> {
        match self {
            Stage::Configured => Some(0),
            Stage::InputsSelected => Some(1),
            Stage::DraftBuilt => Some(2),
            Stage::Evaluated => Some(3),
            Stage::Finalized => Some(4),
            Stage::Signed => Some(5),
            Stage::Submitted => Some(6),
            Stage::Failed(_) => None,
        }
    }

    /// Submitted and Failed are final
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Submitted | Stage::Failed(_))
    }

    /// Only the next stage in order, or failure from any non-final stage
    pub fn can_advance_to(&self, next: &Stage) -> bool {
        match (self.position(), next.position()) {
            (Some(_), None) => !self.is_terminal(),
            (Some(current), Some(next)) => next == current + 1,
            (None, _) => false,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Failed(reason) => write!(f, "Failed({reason})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// What to mint
#[derive(Debug, Clone)]
pub struct MintRequest {
    pub policy: MintingPolicy,
    pub asset_name: AssetName,
    pub quantity: i64,
}

/// Per-build settings, normally taken from [`MintConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub network: Network,
    pub target: TargetNetwork,
    pub collateral: CollateralRange,
    pub ttl_horizon: u64,
    pub input_selection: InputSelection,
    pub partial_sign: bool,
    pub draft_ex_units: Option<ExUnits>,
}

impl PipelineSettings {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            target: TargetNetwork::from(network),
            collateral: CollateralRange::new(3_000_000, 6_000_000),
            ttl_horizon: 500,
            input_selection: InputSelection::All,
            partial_sign: false,
            draft_ex_units: None,
        }
    }
}

impl From<&MintConfig> for PipelineSettings {
    fn from(config: &MintConfig) -> Self {
        Self {
            network: config.network,
            target: config.target_network(),
            collateral: config.collateral_range(),
            ttl_horizon: config.ttl_horizon,
            input_selection: config.input_selection,
            partial_sign: config.partial_sign,
            draft_ex_units: config.draft_ex_units,
        }
    }
}

/// The external systems a build talks to
#[derive(Clone)]
pub struct Collaborators {
    pub wallet: Arc<dyn Wallet>,
    pub evaluator: Arc<dyn Evaluator>,
    pub chain: Arc<dyn ChainParams>,
    pub gateway: Arc<dyn SubmissionGateway>,
    pub notifier: Option<Arc<dyn Notifier>>,
}

pub struct MintPipeline {
    settings: PipelineSettings,
    collaborators: Collaborators,
    request: MintRequest,
    stage: Stage,
    presentation_error: Option<MintError>,
}

impl MintPipeline {
    pub fn new(settings: PipelineSettings, collaborators: Collaborators, request: MintRequest) -> Self {
        Self {
            settings,
            collaborators,
            request,
            stage: Stage::Configured,
            presentation_error: None,
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// The notifier failure of the last run, if any. Never part of the result.
    pub fn presentation_error(&self) -> Option<&MintError> {
        self.presentation_error.as_ref()
    }

    /// Run the build once. A pipeline that has left `Configured` cannot run again.
    #[instrument(skip(self), fields(policy = %self.request.policy.name, network = %self.settings.network))]
    pub async fn run(&mut self) -> Result<MintReceipt, MintError> {
        if self.stage != Stage::Configured {
            return Err(MintError::AlreadyRun);
        }

        let result = self.execute().await;
        if let Err(err) = &result {
            error!("Mint failed at {}: {err}", self.stage);
            self.advance(Stage::Failed(err.clone()));
        }
        self.notify(&result).await;
        result
    }

    fn advance(&mut self, next: Stage) {
        if self.stage.can_advance_to(&next) {
            info!("{} -> {next}", self.stage);
            self.stage = next;
        } else {
            // Unreachable from execute(), which only steps forward
            warn!("Ignoring transition {} -> {next}", self.stage);
        }
    }

    async fn execute(&mut self) -> Result<MintReceipt, MintError> {
        let wallet = self.collaborators.wallet.clone();
        let network = self.settings.network;

        let wallet_network = wallet
            .network_id()
            .await
            .map_err(|e| MintError::WalletRejected(format!("{e:#}")))?;
        if !self.settings.target.accepts(wallet_network) {
            return Err(MintError::NetworkMismatch {
                wallet: wallet_network,
                target: self.settings.target,
            });
        }

        let addresses = wallet
            .used_addresses()
            .await
            .map_err(|e| MintError::WalletRejected(format!("{e:#}")))?;
        let payment = addresses.first().ok_or_else(|| {
            MintError::InvalidWalletData("wallet reported no used addresses".into())
        })?;
        let payment_address = address_to_bech32(payment)
            .map_err(|e| MintError::InvalidWalletData(format!("{e:#}")))?;
        if let Ok(address_network) = address_network(payment) {
            if address_network != wallet_network {
                warn!("Payment address is on {address_network}, wallet reports {wallet_network}");
            }
        }
        let context = WitnessContext {
            payment_key_hash: payment_key_hash(payment).ok(),
        };
        debug!("Payment address {payment_address}");

        let utxos = wallet
            .utxos()
            .await
            .map_err(|e| MintError::WalletRejected(format!("{e:#}")))?;
        let utxos =
            decode_utxos(&utxos).map_err(|e| MintError::InvalidWalletData(format!("{e:#}")))?;
        let collateral = match wallet.collateral().await {
            Ok(Some(raw)) => Some(
                decode_utxos(&raw).map_err(|e| MintError::InvalidWalletData(format!("{e:#}")))?,
            ),
            Ok(None) => None,
            Err(e) => {
                warn!("Wallet collateral unavailable, scanning UTxOs instead: {e:#}");
                None
            }
        };
        let selection = UtxoSelector::new(self.settings.collateral).select(utxos, collateral)?;
        self.advance(Stage::InputsSelected);

        let params = self
            .collaborators
            .chain
            .protocol_params(network)
            .await
            .map_err(|e| MintError::ParameterFetchFailed(format!("{e:#}")))?;
        let latest_slot = self
            .collaborators
            .chain
            .latest_slot(network)
            .await
            .map_err(|e| MintError::ParameterFetchFailed(format!("{e:#}")))?;

        let entry = WitnessAssembler::assemble(
            &self.request.policy,
            self.request.asset_name.clone(),
            self.request.quantity,
            &context,
        )?;
        let budget = self.settings.draft_ex_units.unwrap_or(params.max_tx_ex_units);
        let draft = DraftBuilder::new(&params, self.settings.input_selection, self.settings.ttl_horizon)
            .with_budget(budget)
            .build(&selection, &entry, payment, latest_slot)?;
        self.advance(Stage::DraftBuilt);

        let evaluation = self
            .collaborators
            .evaluator
            .evaluate(draft.evaluation_bytes(), network)
            .await
            .map_err(|e| MintError::EvaluationFailed(format!("{e:#}")))?;
        self.advance(Stage::Evaluated);

        let finalized = RedeemerFinalizer::new(&params).finalize(&draft, &evaluation)?;
        self.advance(Stage::Finalized);

        let signed = DualPhaseSigner::new(wallet, self.settings.partial_sign)
            .sign(finalized, &params.cost_models)
            .await?;
        self.advance(Stage::Signed);

        let tx_hash = self
            .collaborators
            .gateway
            .submit(signed.bytes())
            .await
            .map_err(|e| MintError::SubmissionRejected(format!("{e:#}")))?;
        if tx_hash != signed.tx_hash {
            warn!("Gateway reported {tx_hash}, expected {}", signed.tx_hash);
        }
        self.advance(Stage::Submitted);
        info!("Minted {} {} in {tx_hash}", self.request.quantity, self.request.asset_name);

        Ok(MintReceipt {
            tx_hash,
            payment_address,
            network,
        })
    }

    async fn notify(&mut self, result: &Result<MintReceipt, MintError>) {
        let Some(notifier) = self.collaborators.notifier.clone() else {
            return;
        };
        let outcome = match result {
            Ok(receipt) => notifier.success(receipt).await,
            Err(err) => notifier.failure(err).await,
        };
        if let Err(e) = outcome {
            let blocked = MintError::PresentationBlocked(format!("{e:#}"));
            warn!("{blocked}");
            self.presentation_error = Some(blocked);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn failed() -> Stage {
        Stage::Failed(MintError::AlreadyRun)
    }

    #[test_case(Stage::Configured, Stage::InputsSelected => true)]
    #[test_case(Stage::InputsSelected, Stage::DraftBuilt => true)]
    #[test_case(Stage::Signed, Stage::Submitted => true)]
    #[test_case(Stage::Configured, Stage::DraftBuilt => false; "no skipping")]
    #[test_case(Stage::Evaluated, Stage::DraftBuilt => false; "no going back")]
    #[test_case(Stage::Finalized, Stage::Finalized => false; "no re-entry")]
    #[test_case(Stage::Configured, failed() => true; "fail from start")]
    #[test_case(Stage::Signed, failed() => true; "fail late")]
    #[test_case(Stage::Submitted, failed() => false; "submitted is final")]
    #[test_case(failed(), Stage::Configured => false; "failed is final")]
    #[test_case(failed(), failed() => false; "fail once")]
    fn transitions(from: Stage, to: Stage) -> bool {
        from.can_advance_to(&to)
    }

    #[test]
    fn stage_display_includes_reason() {
        assert_eq!(Stage::DraftBuilt.to_string(), "DraftBuilt");
        assert!(failed().to_string().starts_with("Failed("));
    }

    #[test]
    fn settings_default_to_network_target() {
        let settings = PipelineSettings::new(Network::Mainnet);
        assert_eq!(settings.target, TargetNetwork::from(Network::Mainnet));
        assert_eq!(settings.collateral, CollateralRange::new(3_000_000, 6_000_000));
    }
}
