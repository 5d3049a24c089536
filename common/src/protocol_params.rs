//! Protocol parameter snapshot, fetched once per build and never mutated

use serde::{Deserialize, Serialize};

use crate::{rational_number::RationalNumber, CostModels, ExUnits, Language, Lovelace};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExUnitPrices {
    pub mem_price: RationalNumber,
    pub step_price: RationalNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParams {
    /// Fee per byte of transaction
    pub min_fee_a: u64,
    /// Fixed fee per transaction
    pub min_fee_b: u64,
    pub key_deposit: Lovelace,
    pub pool_deposit: Lovelace,
    pub max_tx_size: u32,
    pub max_value_size: u32,
    pub execution_prices: ExUnitPrices,
    pub coins_per_utxo_byte: Lovelace,
    pub collateral_percentage: u32,
    pub max_collateral_inputs: u32,
    #[serde(default = "default_max_tx_ex_units")]
    pub max_tx_ex_units: ExUnits,
    pub cost_models: CostModels,
}

/// Per-transaction execution budget on all public networks since Alonzo
pub fn default_max_tx_ex_units() -> ExUnits {
    ExUnits::new(14_000_000, 10_000_000_000)
}

impl ProtocolParams {
    pub fn cost_model(&self, language: Language) -> Option<&[i64]> {
        self.cost_models.get(&language).map(Vec::as_slice)
    }
}
