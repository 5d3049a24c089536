//! Draft construction: inputs, change, mint and an unpriced redeemer, balanced
//! so the fee covers the draft budget of execution units.

use std::collections::BTreeSet;

use minter_codec::{
    Transaction, TransactionBody, VKeyWitness, WitnessSet, payment_key_hash,
};
use minter_common::{
    AddrKeyhash, ExUnits, Lovelace, MintError, PlutusData, PlutusScript, ScriptDataHash, Slot,
    TxOutput, UnpricedRedeemer, Utxo, Value, protocol_params::ProtocolParams,
};
use tracing::{debug, instrument};

use crate::{
    fees,
    selector::{InputSelection, Selection},
    witness::MintEntry,
};

/// Upper bound on fee balancing rounds; sizes settle within two or three
const MAX_BALANCE_ROUNDS: usize = 10;

/// An unsigned, unevaluated transaction ready for the evaluator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftTransaction {
    /// Body without a script data commitment
    pub body: TransactionBody,
    pub redeemers: Vec<UnpricedRedeemer>,
    pub scripts: Vec<PlutusScript>,
    pub datums: Vec<PlutusData>,
    /// Number of distinct keys expected to sign
    pub expected_signers: usize,
    /// Execution units the fee was sized for, per redeemer
    pub budget: ExUnits,
    /// Coin held by the collateral input
    pub collateral_coin: Lovelace,
    bytes: Vec<u8>,
}

impl DraftTransaction {
    /// The canonical bytes the evaluator receives: the body plus scripts and
    /// redeemers carrying zero execution units.
    pub fn evaluation_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

fn codec_error(err: anyhow::Error) -> MintError {
    MintError::Codec(format!("{err:#}"))
}

fn total_value(inputs: &[Utxo]) -> Result<Value, MintError> {
    inputs.iter().try_fold(Value::default(), |sum, utxo| {
        sum.checked_add(&utxo.output.value)
            .ok_or_else(|| MintError::InvalidWalletData("input value overflows".into()))
    })
}

pub struct DraftBuilder<'a> {
    params: &'a ProtocolParams,
    input_selection: InputSelection,
    ttl_horizon: u64,
    budget: ExUnits,
}

impl<'a> DraftBuilder<'a> {
    pub fn new(params: &'a ProtocolParams, input_selection: InputSelection, ttl_horizon: u64) -> Self {
        Self {
            params,
            input_selection,
            ttl_horizon,
            budget: params.max_tx_ex_units,
        }
    }

    /// Size the fee for this budget instead of the protocol maximum
    pub fn with_budget(mut self, budget: ExUnits) -> Self {
        self.budget = budget;
        self
    }

    /// Build the draft. Pure: identical arguments give an identical draft.
    #[instrument(skip(self, selection, entry, change_address))]
    pub fn build(
        &self,
        selection: &Selection,
        entry: &MintEntry,
        change_address: &[u8],
        latest_slot: Slot,
    ) -> Result<DraftTransaction, MintError> {
        let ttl = latest_slot.saturating_add(self.ttl_horizon);
        let mint = entry.mint();
        let redeemer = entry.redeemer(&mint)?;
        let scripts = vec![entry.witness.script.clone()];
        let placeholder_ex_units = ExUnits::default();

        let mut fee = self.params.min_fee_b;
        let mut balanced = None;
        for round in 0..MAX_BALANCE_ROUNDS {
            let target = fee.saturating_add(self.min_change_guess(change_address));
            let inputs = self.input_selection.pick(&selection.spendable, target);
            let body = self.balance(&inputs, selection, entry, change_address, fee, ttl)?;
            let expected_signers = self.expected_signers(&inputs, selection, entry);

            // Size with the commitment, dummy signatures and the full budget
            // in place, so the final transaction cannot outgrow the fee
            let sizing = Transaction::new(
                TransactionBody {
                    script_data_hash: Some(ScriptDataHash::default()),
                    ..body.clone()
                },
                WitnessSet {
                    vkeys: vec![VKeyWitness::placeholder(); expected_signers],
                    plutus_scripts: scripts.clone(),
                    plutus_data: vec![],
                    redeemers: vec![redeemer.with_units(self.budget)],
                },
            );
            let size = sizing.to_bytes().map_err(codec_error)?.len();
            let required = fees::min_fee(self.params, size, &self.budget);
            debug!("Balance round {round}: fee {fee}, size {size}, required {required}");

            if required <= fee {
                balanced = Some((body, expected_signers));
                break;
            }
            fee = required;
        }
        let (body, expected_signers) = balanced
            .ok_or_else(|| MintError::Codec("fee balancing did not converge".into()))?;

        let evaluation = Transaction::new(
            body.clone(),
            WitnessSet {
                vkeys: vec![],
                plutus_scripts: scripts.clone(),
                plutus_data: vec![],
                redeemers: vec![redeemer.with_units(placeholder_ex_units)],
            },
        );
        let bytes = evaluation.to_bytes().map_err(codec_error)?;
        debug!("Draft: {}", hex::encode(&bytes));

        Ok(DraftTransaction {
            body,
            redeemers: vec![redeemer],
            scripts,
            datums: vec![],
            expected_signers,
            budget: self.budget,
            collateral_coin: selection.collateral.coin(),
            bytes,
        })
    }

    fn min_change_guess(&self, change_address: &[u8]) -> Lovelace {
        let output = TxOutput::new(change_address.to_vec(), Value::coin(Lovelace::MAX));
        fees::min_utxo(self.params, &output).unwrap_or(0)
    }

    /// Body paying everything but `fee` back to the change address
    fn balance(
        &self,
        inputs: &[Utxo],
        selection: &Selection,
        entry: &MintEntry,
        change_address: &[u8],
        fee: Lovelace,
        ttl: Slot,
    ) -> Result<TransactionBody, MintError> {
        let held = total_value(inputs)?;
        let mint = entry.mint();
        let after_mint = held.apply_mint(&mint).ok_or_else(|| {
            MintError::InsufficientFunds {
                needed: fee,
                available: held.coin,
            }
        })?;
        let change_coin = after_mint.coin.checked_sub(fee).ok_or(MintError::InsufficientFunds {
            needed: fee,
            available: held.coin,
        })?;
        let change = TxOutput::new(
            change_address.to_vec(),
            Value {
                coin: change_coin,
                assets: after_mint.assets,
            },
        );
        let min_change = fees::min_utxo(self.params, &change).map_err(codec_error)?;
        if change_coin < min_change {
            return Err(MintError::InsufficientFunds {
                needed: fee.saturating_add(min_change),
                available: held.coin,
            });
        }

        Ok(TransactionBody {
            inputs: inputs.iter().map(|utxo| utxo.input).collect(),
            outputs: vec![change],
            fee,
            ttl: Some(ttl),
            certificates: vec![],
            mint,
            script_data_hash: None,
            collateral: vec![selection.collateral.input],
            required_signers: entry.required_signers.clone(),
        })
    }

    /// Distinct payment keys behind inputs, collateral and required signers
    fn expected_signers(&self, inputs: &[Utxo], selection: &Selection, entry: &MintEntry) -> usize {
        let keys: BTreeSet<AddrKeyhash> = inputs
            .iter()
            .chain(std::iter::once(&selection.collateral))
            .filter_map(|utxo| payment_key_hash(&utxo.output.address).ok())
            .chain(entry.required_signers.iter().copied())
            .collect();
        keys.len().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        selector::{CollateralRange, UtxoSelector},
        witness::{EmptyConstr, MintingPolicy, WitnessAssembler},
    };
    use minter_common::{
        AssetName, CostModels, Language, RedeemerPointer, RedeemerTag, TxHash, UTxOIdentifier,
        protocol_params::ExUnitPrices, rational_number::RationalNumber,
    };
    use std::sync::Arc;

    fn params() -> ProtocolParams {
        ProtocolParams {
            min_fee_a: 44,
            min_fee_b: 155_381,
            key_deposit: 2_000_000,
            pool_deposit: 500_000_000,
            max_tx_size: 16_384,
            max_value_size: 5_000,
            execution_prices: ExUnitPrices {
                mem_price: RationalNumber::new(577, 10_000),
                step_price: RationalNumber::new(721, 10_000_000),
            },
            coins_per_utxo_byte: 4_310,
            collateral_percentage: 150,
            max_collateral_inputs: 3,
            max_tx_ex_units: ExUnits::new(14_000_000, 10_000_000_000),
            cost_models: CostModels::from([(Language::PlutusV2, vec![1, 2, 3])]),
        }
    }

    fn address() -> Vec<u8> {
        let mut bytes = vec![0x60];
        bytes.extend([7; 28]);
        bytes
    }

    fn utxo(seed: u8, coin: Lovelace) -> Utxo {
        Utxo {
            input: UTxOIdentifier::new(TxHash::new([seed; 32]), 0),
            output: TxOutput::new(address(), Value::coin(coin)),
        }
    }

    fn entry(quantity: i64) -> MintEntry {
        let policy = MintingPolicy::new(
            "test",
            PlutusScript::new(Language::PlutusV2, vec![0x4d, 0x01, 0x00, 0x00]),
            Arc::new(EmptyConstr),
        );
        WitnessAssembler::assemble(
            &policy,
            AssetName::from_utf8("Token").unwrap(),
            quantity,
            &Default::default(),
        )
        .unwrap()
    }

    fn selection(spendable: Vec<Utxo>) -> Selection {
        UtxoSelector::new(CollateralRange::new(3_000_000, 6_000_000))
            .select(spendable, Some(vec![utxo(9, 4_000_000)]))
            .unwrap()
    }

    #[test]
    fn draft_balances_and_carries_mint() {
        let params = params();
        let builder = DraftBuilder::new(&params, InputSelection::All, 500);
        let draft =
            builder.build(&selection(vec![utxo(1, 10_000_000)]), &entry(1), &address(), 1_000).unwrap();

        let body = &draft.body;
        assert_eq!(body.ttl, Some(1_500));
        assert_eq!(body.script_data_hash, None);
        assert_eq!(body.collateral, vec![utxo(9, 0).input]);
        assert_eq!(body.outputs.len(), 1);
        assert_eq!(body.outputs[0].value.coin + body.fee, 10_000_000);
        assert_eq!(body.mint.asset_count(), 1);
        assert_eq!(
            draft.redeemers[0].pointer,
            RedeemerPointer::new(RedeemerTag::Mint, 0)
        );

        // The fee covers the full budget
        let budget_fee = fees::script_fee(&params.execution_prices, &params.max_tx_ex_units);
        assert!(body.fee > budget_fee + params.min_fee_b);
    }

    #[test]
    fn minted_assets_land_in_change() {
        let params = params();
        let entry = entry(7);
        let draft = DraftBuilder::new(&params, InputSelection::All, 500)
            .build(&selection(vec![utxo(1, 10_000_000)]), &entry, &address(), 0)
            .unwrap();
        let change = &draft.body.outputs[0].value;
        assert_eq!(change.assets[&entry.policy_id()][&entry.asset_name], 7);
    }

    #[test]
    fn building_twice_is_identical() {
        let params = params();
        let builder = DraftBuilder::new(&params, InputSelection::All, 500);
        let selection = selection(vec![utxo(1, 10_000_000), utxo(2, 3_000_000)]);
        let a = builder.build(&selection, &entry(1), &address(), 42).unwrap();
        let b = builder.build(&selection, &entry(1), &address(), 42).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.evaluation_bytes(), b.evaluation_bytes());
    }

    #[test]
    fn evaluation_bytes_hold_zero_unit_redeemers() {
        let params = params();
        let draft = DraftBuilder::new(&params, InputSelection::All, 500)
            .build(&selection(vec![utxo(1, 10_000_000)]), &entry(1), &address(), 0)
            .unwrap();
        let tx = Transaction::from_bytes(draft.evaluation_bytes()).unwrap();
        assert_eq!(tx.body, draft.body);
        assert!(tx.witness_set.vkeys.is_empty());
        assert_eq!(tx.witness_set.redeemers[0].ex_units, ExUnits::default());
        assert_eq!(tx.witness_set.plutus_scripts, draft.scripts);
    }

    #[test]
    fn insufficient_inputs_fail() {
        let params = params();
        let err = DraftBuilder::new(&params, InputSelection::All, 500)
            .build(&selection(vec![utxo(1, 1_000_000)]), &entry(1), &address(), 0)
            .unwrap_err();
        assert!(matches!(err, MintError::InsufficientFunds { .. }));
    }

    #[test]
    fn burning_unheld_tokens_fails() {
        let params = params();
        let err = DraftBuilder::new(&params, InputSelection::All, 500)
            .build(&selection(vec![utxo(1, 10_000_000)]), &entry(-1), &address(), 0)
            .unwrap_err();
        assert!(matches!(err, MintError::InsufficientFunds { .. }));
    }

    #[test]
    fn smaller_budget_lowers_the_fee() {
        let params = params();
        let selection = selection(vec![utxo(1, 10_000_000)]);
        let full = DraftBuilder::new(&params, InputSelection::All, 500)
            .build(&selection, &entry(1), &address(), 0)
            .unwrap();
        let tight = DraftBuilder::new(&params, InputSelection::All, 500)
            .with_budget(ExUnits::new(1_000_000, 400_000_000))
            .build(&selection, &entry(1), &address(), 0)
            .unwrap();
        assert!(tight.body.fee < full.body.fee);
        assert_eq!(tight.budget, ExUnits::new(1_000_000, 400_000_000));
    }

    #[test]
    fn single_input_policy_spends_one_utxo() {
        let params = params();
        let draft = DraftBuilder::new(&params, InputSelection::Single, 500)
            .build(
                &selection(vec![utxo(1, 10_000_000), utxo(2, 20_000_000)]),
                &entry(1),
                &address(),
                0,
            )
            .unwrap();
        assert_eq!(draft.body.inputs, vec![utxo(1, 0).input]);
    }
}
