//! Spendable input and collateral selection over the wallet's UTxO set

use minter_common::{Lovelace, MintError, Utxo};
use serde::Deserialize;
use tracing::debug;

/// Acceptable native-currency range for a collateral UTxO, inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollateralRange {
    pub min: Lovelace,
    pub max: Lovelace,
}

impl CollateralRange {
    pub fn new(min: Lovelace, max: Lovelace) -> Self {
        Self { min, max }
    }

    /// Collateral must hold only the native currency, within range
    pub fn admits(&self, utxo: &Utxo) -> bool {
        utxo.output.value.is_pure_coin() && (self.min..=self.max).contains(&utxo.coin())
    }
}

/// Policy for choosing which spendable UTxOs become inputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputSelection {
    /// Spend every UTxO the wallet reported
    #[default]
    All,
    /// Spend only the first UTxO the wallet reported
    Single,
    /// Add UTxOs by descending coin until the target is covered
    LargestFirst,
}

impl InputSelection {
    /// Pick inputs from `available` aiming to cover `target` coin. The result
    /// may fall short; the caller checks sufficiency.
    pub fn pick(&self, available: &[Utxo], target: Lovelace) -> Vec<Utxo> {
        match self {
            InputSelection::All => available.to_vec(),
            InputSelection::Single => available.iter().take(1).cloned().collect(),
            InputSelection::LargestFirst => {
                let mut sorted: Vec<&Utxo> = available.iter().collect();
                sorted.sort_by(|a, b| b.coin().cmp(&a.coin()).then(a.input.cmp(&b.input)));
                let mut picked = Vec::new();
                let mut total: Lovelace = 0;
                for utxo in sorted {
                    if total >= target && !picked.is_empty() {
                        break;
                    }
                    total = total.saturating_add(utxo.coin());
                    picked.push(utxo.clone());
                }
                picked
            }
        }
    }
}

/// Outcome of selection: every spendable UTxO plus the chosen collateral
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub spendable: Vec<Utxo>,
    pub collateral: Utxo,
}

pub struct UtxoSelector {
    range: CollateralRange,
}

impl UtxoSelector {
    pub fn new(range: CollateralRange) -> Self {
        Self { range }
    }

    /// Register every UTxO as spendable while remembering the last one in the
    /// collateral range. Wallet-designated collateral wins when it holds an
    /// admissible entry; otherwise the remembered UTxO is used.
    pub fn select(
        &self,
        utxos: Vec<Utxo>,
        wallet_collateral: Option<Vec<Utxo>>,
    ) -> Result<Selection, MintError> {
        let mut spendable = Vec::with_capacity(utxos.len());
        let mut fallback = None;
        for utxo in utxos {
            if self.range.admits(&utxo) {
                fallback = Some(utxo.clone());
            }
            spendable.push(utxo);
        }

        let designated = wallet_collateral
            .unwrap_or_default()
            .into_iter()
            .find(|utxo| self.range.admits(utxo));
        if designated.is_none() && fallback.is_some() {
            debug!("No usable wallet collateral, falling back to a scanned UTxO");
        }

        let collateral = designated.or(fallback).ok_or(MintError::NoCollateralAvailable {
            min: self.range.min,
            max: self.range.max,
        })?;
        debug!("Selected collateral {}", collateral.input);
        Ok(Selection {
            spendable,
            collateral,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minter_common::{AssetName, Mint, PolicyId, TxHash, TxOutput, UTxOIdentifier, Value};
    use quickcheck_macros::quickcheck;
    use test_case::test_case;

    fn utxo(seed: u8, coin: Lovelace) -> Utxo {
        Utxo {
            input: UTxOIdentifier::new(TxHash::new([seed; 32]), 0),
            output: TxOutput::new(vec![0x60; 29], Value::coin(coin)),
        }
    }

    fn with_token(mut utxo: Utxo) -> Utxo {
        let mut mint = Mint::new();
        mint.add(PolicyId::new([1; 28]), AssetName::from_utf8("T").unwrap(), 1);
        utxo.output.value = utxo.output.value.apply_mint(&mint).unwrap();
        utxo
    }

    fn selector() -> UtxoSelector {
        UtxoSelector::new(CollateralRange::new(3_000_000, 6_000_000))
    }

    #[test_case(2_999_999 => false; "below range")]
    #[test_case(3_000_000 => true; "lower bound")]
    #[test_case(6_000_000 => true; "upper bound")]
    #[test_case(6_000_001 => false; "above range")]
    fn range_is_inclusive(coin: Lovelace) -> bool {
        CollateralRange::new(3_000_000, 6_000_000).admits(&utxo(1, coin))
    }

    #[test]
    fn multi_asset_utxo_is_not_collateral() {
        assert!(!CollateralRange::new(3_000_000, 6_000_000).admits(&with_token(utxo(1, 4_000_000))));
    }

    #[test]
    fn prefers_wallet_collateral() {
        let selection = selector()
            .select(vec![utxo(1, 5_000_000)], Some(vec![utxo(2, 4_000_000)]))
            .unwrap();
        assert_eq!(selection.collateral, utxo(2, 4_000_000));
        assert_eq!(selection.spendable, vec![utxo(1, 5_000_000)]);
    }

    #[test]
    fn falls_back_to_last_scanned_match() {
        let utxos = vec![utxo(1, 4_000_000), utxo(2, 10_000_000), utxo(3, 5_000_000)];
        let selection = selector().select(utxos.clone(), Some(vec![])).unwrap();
        assert_eq!(selection.collateral, utxo(3, 5_000_000));
        assert_eq!(selection.spendable, utxos);

        let unsupported = selector().select(utxos, None).unwrap();
        assert_eq!(unsupported.collateral, utxo(3, 5_000_000));
    }

    #[test]
    fn out_of_range_wallet_collateral_is_skipped() {
        let selection = selector()
            .select(vec![utxo(1, 4_000_000)], Some(vec![utxo(2, 50_000_000)]))
            .unwrap();
        assert_eq!(selection.collateral, utxo(1, 4_000_000));
    }

    #[test]
    fn nothing_in_range_fails() {
        let err = selector()
            .select(vec![utxo(1, 10_000_000), utxo(2, 1_000_000)], Some(vec![]))
            .unwrap_err();
        assert_eq!(
            err,
            MintError::NoCollateralAvailable {
                min: 3_000_000,
                max: 6_000_000
            }
        );
    }

    #[quickcheck]
    fn candidate_found_iff_some_utxo_in_range(scanned: Vec<u32>, designated: Vec<u32>) -> bool {
        let range = CollateralRange::new(3_000_000, 6_000_000);
        let to_utxos = |coins: &[u32], offset: u8| -> Vec<Utxo> {
            coins
                .iter()
                .enumerate()
                .map(|(i, coin)| utxo(offset.wrapping_add(i as u8), u64::from(*coin) % 12_000_000))
                .collect()
        };
        let scanned = to_utxos(&scanned, 0);
        let designated = to_utxos(&designated, 128);
        let expected = scanned.iter().chain(designated.iter()).any(|u| range.admits(u));
        let result = UtxoSelector::new(range).select(scanned, Some(designated));
        match result {
            Ok(selection) => expected && range.admits(&selection.collateral),
            Err(err) => !expected && matches!(err, MintError::NoCollateralAvailable { .. }),
        }
    }

    #[test_case(InputSelection::All, 0 => 3)]
    #[test_case(InputSelection::Single, 0 => 1)]
    #[test_case(InputSelection::LargestFirst, 9_000_000 => 1; "largest covers")]
    #[test_case(InputSelection::LargestFirst, 12_000_000 => 2; "needs two")]
    #[test_case(InputSelection::LargestFirst, 100_000_000 => 3; "takes everything")]
    fn input_policies(policy: InputSelection, target: Lovelace) -> usize {
        let available = vec![utxo(1, 2_000_000), utxo(2, 10_000_000), utxo(3, 5_000_000)];
        policy.pick(&available, target).len()
    }

    #[test]
    fn largest_first_orders_by_coin() {
        let available = vec![utxo(1, 2_000_000), utxo(2, 10_000_000), utxo(3, 5_000_000)];
        let picked = InputSelection::LargestFirst.pick(&available, 12_000_000);
        assert_eq!(picked, vec![utxo(2, 10_000_000), utxo(3, 5_000_000)]);
    }
}
