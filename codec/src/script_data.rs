//! Script data commitment carried in the body under key 11.
//!
//! The hashed preimage is
//! `redeemers ++ (plutus data, when non-empty) ++ language views`,
//! where the language views hold the cost model of every language whose
//! scripts the transaction runs.

use anyhow::{Context, Result, anyhow};
use minicbor::Encoder;
use minter_common::{
    CostModels, Language, PlutusData, Redeemer, ScriptDataHash, crypto::keyhash_256,
};

use crate::witness::{WitnessSet, encode_plutus_data, encode_redeemers};

/// Encode the language views for `languages` using `cost_models`.
///
/// Since Babbage, V2 and V3 views are keyed by the language id and hold a
/// definite array of costs. The V1 view keeps its Alonzo quirk: the key is the
/// id wrapped in a byte string and the value is a byte string holding an
/// indefinite array. Keys are written in canonical order: shorter encodings
/// first, so V2 and V3 precede V1.
pub fn language_views_cbor(cost_models: &CostModels, languages: &[Language]) -> Result<Vec<u8>> {
    let mut languages = languages.to_vec();
    languages.sort_by_key(|language| match language {
        Language::PlutusV1 => 1u8 << 7,
        other => other.id(),
    });
    languages.dedup();

    let mut buffer = Vec::new();
    let mut e = Encoder::new(&mut buffer);
    e.map(languages.len() as u64)?;
    for language in languages {
        let costs = cost_models
            .get(&language)
            .ok_or_else(|| anyhow!("No cost model for {language:?}"))?;
        match language {
            Language::PlutusV1 => {
                let mut inner = Vec::new();
                let mut ie = Encoder::new(&mut inner);
                ie.begin_array()?;
                for cost in costs {
                    ie.i64(*cost)?;
                }
                ie.end()?;
                e.bytes(&minicbor::to_vec(language.id())?)?;
                e.bytes(&inner)?;
            }
            _ => {
                e.u8(language.id())?;
                e.array(costs.len() as u64)?;
                for cost in costs {
                    e.i64(*cost)?;
                }
            }
        }
    }
    Ok(buffer)
}

/// Compute the script data commitment. Returns `None` when there is nothing
/// to commit to: no redeemers and no datums.
pub fn compute_script_data_hash(
    redeemers: &[Redeemer],
    datums: &[PlutusData],
    cost_models: &CostModels,
    languages: &[Language],
) -> Result<Option<ScriptDataHash>> {
    if redeemers.is_empty() && datums.is_empty() {
        return Ok(None);
    }

    let mut preimage = Vec::new();
    let mut e = Encoder::new(&mut preimage);
    encode_redeemers(redeemers, &mut e).context("Failed to encode redeemers")?;
    if !datums.is_empty() {
        encode_plutus_data(datums, &mut e).context("Failed to encode datums")?;
    }
    // Datum-only transactions commit to an empty view map
    let languages = if redeemers.is_empty() { &[][..] } else { languages };
    preimage.extend(language_views_cbor(cost_models, languages)?);

    Ok(Some(keyhash_256(&preimage)))
}

/// Commitment implied by a witness set's redeemers, datums and scripts
pub fn witness_set_script_data_hash(
    witness_set: &WitnessSet,
    cost_models: &CostModels,
) -> Result<Option<ScriptDataHash>> {
    compute_script_data_hash(
        &witness_set.redeemers,
        &witness_set.plutus_data,
        cost_models,
        &witness_set.languages(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use minter_common::{ExUnits, RedeemerPointer, RedeemerTag};
    use quickcheck_macros::quickcheck;
    use test_case::test_case;

    fn cost_models() -> CostModels {
        CostModels::from([
            (Language::PlutusV1, vec![1, 2, 3]),
            (Language::PlutusV2, vec![4, -5, 6]),
        ])
    }

    fn redeemer(mem: u64, steps: u64) -> Redeemer {
        Redeemer {
            pointer: RedeemerPointer::new(RedeemerTag::Mint, 0),
            data: PlutusData::constr(0, vec![]),
            ex_units: ExUnits::new(mem, steps),
        }
    }

    // {1: [4, -5, 6]}
    #[test_case(&[Language::PlutusV2] => "a10183042406"; "v2 keyed by language id")]
    // {h'00': h'9f010203ff'}
    #[test_case(&[Language::PlutusV1] => "a14100459f010203ff"; "v1 wraps key and value in bytes")]
    // canonical key order puts the one-byte V2 key before V1's byte-string key
    #[test_case(
        &[Language::PlutusV1, Language::PlutusV2] => "a201830424064100459f010203ff";
        "v1 sorts after v2"
    )]
    fn language_views(languages: &[Language]) -> String {
        hex::encode(language_views_cbor(&cost_models(), languages).unwrap())
    }

    #[test]
    fn missing_cost_model_is_an_error() {
        assert!(language_views_cbor(&cost_models(), &[Language::PlutusV3]).is_err());
    }

    #[test]
    fn nothing_to_commit_gives_none() {
        let hash = compute_script_data_hash(&[], &[], &cost_models(), &[Language::PlutusV2]);
        assert_eq!(hash.unwrap(), None);
    }

    #[test]
    fn hash_covers_execution_units() {
        let languages = [Language::PlutusV2];
        let a = compute_script_data_hash(&[redeemer(1, 1)], &[], &cost_models(), &languages)
            .unwrap();
        let b = compute_script_data_hash(&[redeemer(1, 2)], &[], &cost_models(), &languages)
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn hash_covers_cost_models() {
        let languages = [Language::PlutusV2];
        let mut changed = cost_models();
        changed.insert(Language::PlutusV2, vec![4, -5, 7]);
        let a = compute_script_data_hash(&[redeemer(1, 1)], &[], &cost_models(), &languages)
            .unwrap();
        let b = compute_script_data_hash(&[redeemer(1, 1)], &[], &changed, &languages).unwrap();
        assert_ne!(a, b);
    }

    #[quickcheck]
    fn recomputing_gives_identical_bytes(mem: u64, steps: u64, costs: Vec<i64>) -> bool {
        let cost_models = CostModels::from([(Language::PlutusV2, costs)]);
        let redeemers = [redeemer(mem, steps)];
        let first =
            compute_script_data_hash(&redeemers, &[], &cost_models, &[Language::PlutusV2]);
        let second =
            compute_script_data_hash(&redeemers, &[], &cost_models, &[Language::PlutusV2]);
        first.unwrap() == second.unwrap()
    }
}
