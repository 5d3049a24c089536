//! Decoding of the byte payloads wallets hand back

use anyhow::{Context, Result};
use minter_common::{TxOutput, Utxo};
use tracing::debug;

/// Decode one CIP-30 unspent output, `[input, output]`
pub fn decode_utxo(bytes: &[u8]) -> Result<Utxo> {
    minicbor::decode(bytes).context("Failed to decode wallet UTxO")
}

/// Decode every unspent output a wallet reported, failing on the first bad one
pub fn decode_utxos(raw: &[Vec<u8>]) -> Result<Vec<Utxo>> {
    let utxos = raw
        .iter()
        .enumerate()
        .map(|(index, bytes)| decode_utxo(bytes).with_context(|| format!("UTxO #{index}")))
        .collect::<Result<Vec<_>>>()?;
    debug!("Decoded {} wallet UTxOs", utxos.len());
    Ok(utxos)
}

/// Encoded size of an output, the figure minimum-coin pricing is based on
pub fn output_size(output: &TxOutput) -> Result<usize> {
    Ok(minicbor::to_vec(output).context("Failed to encode output")?.len())
}

/// Hex helper for payloads exchanged as text
pub fn decode_hex(text: &str) -> Result<Vec<u8>> {
    hex::decode(text.trim()).with_context(|| format!("Invalid hex '{text}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use minter_common::{TxHash, UTxOIdentifier, Value};
    use test_case::test_case;

    fn utxo(coin: u64) -> Utxo {
        Utxo {
            input: UTxOIdentifier::new(TxHash::new([1; 32]), 2),
            output: TxOutput::new(vec![0x60; 29], Value::coin(coin)),
        }
    }

    #[test]
    fn decodes_wallet_utxos() {
        let raw = vec![
            minicbor::to_vec(utxo(4_000_000)).unwrap(),
            minicbor::to_vec(utxo(10_000_000)).unwrap(),
        ];
        let decoded = decode_utxos(&raw).unwrap();
        assert_eq!(decoded, vec![utxo(4_000_000), utxo(10_000_000)]);
    }

    #[test]
    fn accepts_legacy_array_outputs() {
        // [[h'01..', 0], [h'60..', 5000000]]
        let mut raw = vec![0x82, 0x82, 0x58, 0x20];
        raw.extend([1; 32]);
        raw.extend([0x00, 0x82, 0x58, 0x1d]);
        raw.extend([0x60; 29]);
        raw.extend([0x1a, 0x00, 0x4c, 0x4b, 0x40]);
        let decoded = decode_utxo(&raw).unwrap();
        assert_eq!(decoded.coin(), 5_000_000);
        assert_eq!(decoded.input.output_index, 0);
    }

    // map(2) {0: bytes(29), 1: coin}
    #[test_case(23 => 1 + 1 + 2 + 29 + 1 + 1; "small coin")]
    #[test_case(1_000_000 => 1 + 1 + 2 + 29 + 1 + 5; "four byte coin")]
    fn output_size_counts_encoded_bytes(coin: u64) -> usize {
        output_size(&TxOutput::new(vec![0x60; 29], Value::coin(coin))).unwrap()
    }

    #[test]
    fn bad_entry_is_reported_by_position() {
        let raw = vec![minicbor::to_vec(utxo(1)).unwrap(), vec![0xff]];
        let err = decode_utxos(&raw).unwrap_err();
        assert!(format!("{err:#}").contains("UTxO #1"));
    }
}
