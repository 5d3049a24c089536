//! Core ledger types used across the minter

use std::{fmt, str::FromStr};

use anyhow::{anyhow, bail};
use minicbor::{data::Type, decode, encode, Decoder, Encoder};
use serde::{Deserialize, Serialize};

use crate::{cbor, plutus_data::PlutusData, DatumHash, TxHash, Value};

/// Amount of the native currency
pub type Lovelace = u64;

/// Absolute ledger slot
pub type Slot = u64;

/// Ledger-level network discriminant, as reported by wallets and carried in addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    Testnet,
    Mainnet,
}

impl NetworkId {
    pub fn id(&self) -> u8 {
        match self {
            NetworkId::Testnet => 0,
            NetworkId::Mainnet => 1,
        }
    }
}

impl TryFrom<u8> for NetworkId {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NetworkId::Testnet),
            1 => Ok(NetworkId::Mainnet),
            other => Err(anyhow!("Unknown network id {other}")),
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkId::Testnet => f.write_str("testnet"),
            NetworkId::Mainnet => f.write_str("mainnet"),
        }
    }
}

/// Environment a build targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Preview,
    Preprod,
}

impl Network {
    pub fn network_id(&self) -> NetworkId {
        match self {
            Network::Mainnet => NetworkId::Mainnet,
            Network::Preview | Network::Preprod => NetworkId::Testnet,
        }
    }

    /// Identifier used by the parameter and evaluator services in their paths
    pub fn api_id(&self) -> u8 {
        match self {
            Network::Mainnet => 1,
            Network::Preview => 0,
            Network::Preprod => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Preview => "preview",
            Network::Preprod => "preprod",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" | "1" => Ok(Network::Mainnet),
            "preview" | "0" => Ok(Network::Preview),
            "preprod" | "2" => Ok(Network::Preprod),
            other => bail!("Unknown network '{other}'"),
        }
    }
}

/// Which wallet network a build accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetNetwork {
    /// Accept whatever network the wallet reports
    Any,
    Exact(NetworkId),
}

impl TargetNetwork {
    pub fn accepts(&self, wallet: NetworkId) -> bool {
        match self {
            TargetNetwork::Any => true,
            TargetNetwork::Exact(expected) => *expected == wallet,
        }
    }
}

impl From<Network> for TargetNetwork {
    fn from(network: Network) -> Self {
        TargetNetwork::Exact(network.network_id())
    }
}

impl fmt::Display for TargetNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetNetwork::Any => f.write_str("any"),
            TargetNetwork::Exact(id) => id.fmt(f),
        }
    }
}

/// Name of a native asset within its policy, at most 32 bytes
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AssetName(Vec<u8>);

impl AssetName {
    pub const MAX_LENGTH: usize = 32;

    pub fn new(bytes: Vec<u8>) -> anyhow::Result<Self> {
        if bytes.len() > Self::MAX_LENGTH {
            bail!(
                "Asset name is {} bytes, the maximum is {}",
                bytes.len(),
                Self::MAX_LENGTH
            );
        }
        Ok(Self(bytes))
    }

    pub fn from_utf8(name: &str) -> anyhow::Result<Self> {
        Self::new(name.as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "AssetName({s:?})"),
            Err(_) => write!(f, "AssetName({})", hex::encode(&self.0)),
        }
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl<C> minicbor::Encode<C> for AssetName {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        e.bytes(&self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for AssetName {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> Result<Self, decode::Error> {
        let bytes = d.bytes()?;
        AssetName::new(bytes.to_vec())
            .map_err(|_| decode::Error::message("asset name longer than 32 bytes"))
    }
}

/// Reference to a transaction output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UTxOIdentifier {
    pub tx_hash: TxHash,
    pub output_index: u64,
}

impl UTxOIdentifier {
    pub fn new(tx_hash: TxHash, output_index: u64) -> Self {
        Self {
            tx_hash,
            output_index,
        }
    }
}

impl fmt::Display for UTxOIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_hash, self.output_index)
    }
}

impl<C> minicbor::Encode<C> for UTxOIdentifier {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        e.array(2)?;
        e.encode_with(self.tx_hash, ctx)?;
        e.u64(self.output_index)?;
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for UTxOIdentifier {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Self, decode::Error> {
        let fields = d.array()?;
        let tx_hash = d.decode_with(ctx)?;
        let output_index = d.u64()?;
        if fields.is_none() {
            cbor::consume_break(d)?;
        }
        Ok(Self {
            tx_hash,
            output_index,
        })
    }
}

/// Datum attached to an output (inline or hash)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datum {
    Hash(DatumHash),
    Inline(PlutusData),
}

/// A transaction output: raw address bytes, value, optional datum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub address: Vec<u8>,
    pub value: Value,
    pub datum: Option<Datum>,
}

impl TxOutput {
    pub fn new(address: Vec<u8>, value: Value) -> Self {
        Self {
            address,
            value,
            datum: None,
        }
    }
}

// Outputs are written in the post-Alonzo map form:
// { 0: address, 1: value, ? 2: [0, datum_hash] / [1, #6.24(bytes .cbor data)] }
impl<C> minicbor::Encode<C> for TxOutput {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        e.map(if self.datum.is_some() { 3 } else { 2 })?;
        e.u8(0)?.bytes(&self.address)?;
        e.u8(1)?.encode_with(&self.value, ctx)?;
        match &self.datum {
            Some(Datum::Hash(hash)) => {
                e.u8(2)?.array(2)?.u8(0)?.encode_with(hash, ctx)?;
            }
            Some(Datum::Inline(data)) => {
                let raw = minicbor::to_vec(data)
                    .map_err(|_| encode::Error::message("failed to encode inline datum"))?;
                e.u8(2)?.array(2)?.u8(1)?;
                e.tag(minicbor::data::Tag::new(24))?.bytes(&raw)?;
            }
            None => {}
        }
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TxOutput {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Self, decode::Error> {
        match d.datatype()? {
            // Legacy form: [address, value, ? datum_hash]
            Type::Array | Type::ArrayIndef => {
                let fields = d.array()?;
                let address = d.bytes()?.to_vec();
                let value = d.decode_with(ctx)?;
                let has_datum_hash = match fields {
                    Some(n) => n > 2,
                    None => d.datatype()? != Type::Break,
                };
                let datum = if has_datum_hash {
                    Some(Datum::Hash(d.decode_with(ctx)?))
                } else {
                    None
                };
                if fields.is_none() {
                    cbor::consume_break(d)?;
                }
                Ok(Self {
                    address,
                    value,
                    datum,
                })
            }
            Type::Map | Type::MapIndef => {
                let mut address = None;
                let mut value = None;
                let mut datum = None;
                cbor::decode_map(d, ctx, |d, ctx| {
                    match d.u8()? {
                        0 => address = Some(d.bytes()?.to_vec()),
                        1 => value = Some(d.decode_with(ctx)?),
                        2 => datum = Some(decode_datum_option(d, ctx)?),
                        // Reference scripts are not modelled
                        _ => d.skip()?,
                    }
                    Ok(((), ()))
                })?;
                Ok(Self {
                    address: address.ok_or_else(|| decode::Error::message("output without address"))?,
                    value: value.ok_or_else(|| decode::Error::message("output without value"))?,
                    datum,
                })
            }
            other => Err(decode::Error::type_mismatch(other)),
        }
    }
}

fn decode_datum_option<'b, C>(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Datum, decode::Error> {
    let fields = d.array()?;
    let datum = match d.u8()? {
        0 => Datum::Hash(d.decode_with(ctx)?),
        1 => {
            let tag = d.tag()?;
            if tag != minicbor::data::Tag::new(24) {
                return Err(decode::Error::message("inline datum is not wrapped in tag 24"));
            }
            let raw = d.bytes()?;
            Datum::Inline(minicbor::decode(raw)?)
        }
        _ => return Err(decode::Error::message("unknown datum option")),
    };
    if fields.is_none() {
        cbor::consume_break(d)?;
    }
    Ok(datum)
}

/// An unspent output as observed in the wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub input: UTxOIdentifier,
    pub output: TxOutput,
}

impl Utxo {
    pub fn coin(&self) -> Lovelace {
        self.output.value.coin
    }
}

// CIP-30 transaction_unspent_output = [input, output]
impl<C> minicbor::Encode<C> for Utxo {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        e.array(2)?;
        e.encode_with(self.input, ctx)?;
        e.encode_with(&self.output, ctx)?;
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Utxo {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Self, decode::Error> {
        let fields = d.array()?;
        let input = d.decode_with(ctx)?;
        let output = d.decode_with(ctx)?;
        if fields.is_none() {
            cbor::consume_break(d)?;
        }
        Ok(Self { input, output })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(TargetNetwork::Any, NetworkId::Mainnet => true)]
    #[test_case(TargetNetwork::Any, NetworkId::Testnet => true)]
    #[test_case(TargetNetwork::Exact(NetworkId::Mainnet), NetworkId::Mainnet => true)]
    #[test_case(TargetNetwork::Exact(NetworkId::Mainnet), NetworkId::Testnet => false)]
    #[test_case(TargetNetwork::Exact(NetworkId::Testnet), NetworkId::Mainnet => false)]
    fn target_network_acceptance(target: TargetNetwork, wallet: NetworkId) -> bool {
        target.accepts(wallet)
    }

    #[test_case("mainnet" => Network::Mainnet)]
    #[test_case("1" => Network::Mainnet)]
    #[test_case("preview" => Network::Preview)]
    #[test_case("2" => Network::Preprod)]
    fn network_parsing(s: &str) -> Network {
        s.parse().unwrap()
    }

    #[test]
    fn asset_name_length_is_bounded() {
        assert!(AssetName::new(vec![0; 32]).is_ok());
        assert!(AssetName::new(vec![0; 33]).is_err());
    }

    #[test]
    fn legacy_and_map_outputs_decode_to_the_same_value() {
        let address = vec![0x61; 29];
        let output = TxOutput::new(address.clone(), Value::coin(2_000_000));
        let map_form = minicbor::to_vec(&output).unwrap();

        let mut legacy = Vec::new();
        let mut e = Encoder::new(&mut legacy);
        e.array(2).unwrap().bytes(&address).unwrap().u64(2_000_000).unwrap();

        let a: TxOutput = minicbor::decode(&map_form).unwrap();
        let b: TxOutput = minicbor::decode(&legacy).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn inline_datum_survives_encoding() {
        let mut output = TxOutput::new(vec![0x71; 29], Value::coin(1_500_000));
        output.datum = Some(Datum::Inline(PlutusData::constr(0, vec![])));
        let bytes = minicbor::to_vec(&output).unwrap();
        let decoded: TxOutput = minicbor::decode(&bytes).unwrap();
        assert_eq!(decoded, output);
    }
}
