//! Ledger fee, minimum output and collateral arithmetic

use anyhow::Result;
use minter_common::{
    ExUnits, Lovelace, TxOutput,
    protocol_params::{ExUnitPrices, ProtocolParams},
    rational_number::RationalNumber,
};
use minter_codec::output_size;
use num_rational::Ratio;

/// Bytes the ledger adds to an output's size when pricing its minimum coin
const OUTPUT_OVERHEAD: u64 = 160;

fn widen(r: &RationalNumber) -> Ratio<u128> {
    Ratio::new(u128::from(*r.numer()), u128::from(*r.denom()))
}

fn saturate(value: u128) -> Lovelace {
    Lovelace::try_from(value).unwrap_or(Lovelace::MAX)
}

/// `⌈mem · price_mem + steps · price_step⌉`
pub fn script_fee(prices: &ExUnitPrices, ex_units: &ExUnits) -> Lovelace {
    let cost = widen(&prices.mem_price) * Ratio::from_integer(u128::from(ex_units.mem))
        + widen(&prices.step_price) * Ratio::from_integer(u128::from(ex_units.steps));
    saturate(cost.ceil().to_integer())
}

/// Linear size fee plus script execution fee
pub fn min_fee(params: &ProtocolParams, tx_size: usize, ex_units: &ExUnits) -> Lovelace {
    let size_fee = u128::from(params.min_fee_a) * tx_size as u128 + u128::from(params.min_fee_b);
    saturate(size_fee).saturating_add(script_fee(&params.execution_prices, ex_units))
}

/// Minimum coin an output must carry: `coins_per_byte · (160 + size)`
pub fn min_utxo(params: &ProtocolParams, output: &TxOutput) -> Result<Lovelace> {
    let size = output_size(output)? as u64;
    Ok(params.coins_per_utxo_byte.saturating_mul(OUTPUT_OVERHEAD + size))
}

/// Collateral the ledger demands for a fee: `⌈fee · percentage / 100⌉`
pub fn required_collateral(params: &ProtocolParams, fee: Lovelace) -> Lovelace {
    let required = Ratio::new(u128::from(fee) * u128::from(params.collateral_percentage), 100);
    saturate(required.ceil().to_integer())
}

#[cfg(test)]
mod tests {
    use super::*;
    use minter_common::{CostModels, Value};
    use test_case::test_case;

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
            cost_models: CostModels::new(),
        }
    }

    #[test_case(0, 0 => 0; "no execution")]
    #[test_case(500_000, 200_000_000 => 43_270; "typical mint")]
    #[test_case(1, 0 => 1; "rounds up")]
    fn script_fee_is_ceiling(mem: u64, steps: u64) -> Lovelace {
        script_fee(&params().execution_prices, &ExUnits::new(mem, steps))
    }

    #[test]
    fn min_fee_adds_size_and_script_parts() {
        let fee = min_fee(&params(), 300, &ExUnits::new(500_000, 200_000_000));
        assert_eq!(fee, 44 * 300 + 155_381 + 43_270);
    }

    #[test]
    fn min_utxo_scales_with_output_size() {
        let output = TxOutput::new(vec![0x60; 29], Value::coin(1_000_000));
        // map(2) {0: bytes(29), 1: uint32} = 1 + 1 + 2 + 29 + 1 + 5 bytes
        assert_eq!(min_utxo(&params(), &output).unwrap(), 4_310 * (160 + 39));
    }

    #[test_case(200_000 => 300_000)]
    #[test_case(1 => 2; "rounds up")]
    fn collateral_is_percentage_of_fee(fee: Lovelace) -> Lovelace {
        required_collateral(&params(), fee)
    }
}
