//! Pricing redeemers with measured execution units and committing to them

use minter_codec::{Transaction, TransactionBody, VKeyWitness, WitnessSet, compute_script_data_hash};
use minter_common::{
    EvaluationResult, ExUnits, Lovelace, MintError, Redeemer, ScriptDataHash, UnpricedRedeemer,
    protocol_params::ProtocolParams,
};
use tracing::{debug, info};

use crate::{draft::DraftTransaction, fees};

/// A fully priced transaction whose body commits to its script data, still
/// lacking key witnesses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedTransaction {
    pub transaction: Transaction,
    /// Sum of the redeemers' execution units
    pub ex_units: ExUnits,
    /// Fee the ledger demands once the expected signatures are attached
    pub min_fee: Lovelace,
}

impl FinalizedTransaction {
    pub fn body(&self) -> &TransactionBody {
        &self.transaction.body
    }

    pub fn script_data_hash(&self) -> Option<ScriptDataHash> {
        self.transaction.body.script_data_hash
    }
}

/// Attach measured units to every redeemer. A redeemer the evaluator did not
/// report is an error; extra entries in the result are ignored.
pub fn price_redeemers(
    redeemers: &[UnpricedRedeemer],
    result: &EvaluationResult,
) -> Result<Vec<Redeemer>, MintError> {
    redeemers
        .iter()
        .map(|redeemer| {
            result
                .get(&redeemer.pointer)
                .map(|units| redeemer.with_units(*units))
                .ok_or(MintError::RedeemerNotEvaluated(redeemer.pointer))
        })
        .collect()
}

pub struct RedeemerFinalizer<'a> {
    params: &'a ProtocolParams,
}

impl<'a> RedeemerFinalizer<'a> {
    pub fn new(params: &'a ProtocolParams) -> Self {
        Self { params }
    }

    pub fn finalize(
        &self,
        draft: &DraftTransaction,
        result: &EvaluationResult,
    ) -> Result<FinalizedTransaction, MintError> {
        let redeemers = price_redeemers(&draft.redeemers, result)?;
        let ex_units = redeemers
            .iter()
            .try_fold(ExUnits::default(), |sum, r| sum.checked_add(&r.ex_units))
            .filter(|total| total.fits(&self.params.max_tx_ex_units))
            .ok_or_else(|| {
                MintError::EvaluationFailed(format!(
                    "execution units exceed the per-transaction limit {}",
                    self.params.max_tx_ex_units
                ))
            })?;

        let mut witness_set = WitnessSet {
            vkeys: vec![],
            plutus_scripts: draft.scripts.clone(),
            plutus_data: draft.datums.clone(),
            redeemers,
        };
        let languages = witness_set.languages();
        if let Some(missing) = languages.iter().find(|l| self.params.cost_model(**l).is_none()) {
            return Err(MintError::ParameterFetchFailed(format!(
                "no cost model for {missing:?}"
            )));
        }
        let script_data_hash = compute_script_data_hash(
            &witness_set.redeemers,
            &witness_set.plutus_data,
            &self.params.cost_models,
            &languages,
        )
        .map_err(|e| MintError::Codec(format!("{e:#}")))?;
        debug!("Script data hash {script_data_hash:?}");

        let body = TransactionBody {
            script_data_hash,
            ..draft.body.clone()
        };

        // Size as submitted, with the expected signatures in place
        witness_set.vkeys = vec![VKeyWitness::placeholder(); draft.expected_signers];
        let size = Transaction::new(body.clone(), witness_set.clone())
            .to_bytes()
            .map_err(|e| MintError::Codec(format!("{e:#}")))?
            .len();
        witness_set.vkeys.clear();

        if size > self.params.max_tx_size as usize {
            return Err(MintError::TransactionTooLarge {
                size,
                max: self.params.max_tx_size,
            });
        }

        let min_fee = fees::min_fee(self.params, size, &ex_units);
        if body.fee < min_fee {
            return Err(MintError::FeeBelowMinimum {
                fee: body.fee,
                minimum: min_fee,
            });
        }

        let required = fees::required_collateral(self.params, body.fee);
        if draft.collateral_coin < required {
            return Err(MintError::InsufficientCollateral {
                required,
                provided: draft.collateral_coin,
            });
        }

        info!(
            "Finalized with {ex_units}, fee {} (minimum {min_fee}), {size} bytes",
            body.fee
        );
        Ok(FinalizedTransaction {
            transaction: Transaction::new(body, witness_set),
            ex_units,
            min_fee,
        })
    }
}
