use anyhow::{Context, Result};
use minicbor::{Decoder, Encoder, data::Type, decode, encode};
use minter_common::{
    AddrKeyhash, Lovelace, Mint, ScriptDataHash, Slot, TxHash, TxOutput, UTxOIdentifier, cbor,
    crypto::keyhash_256,
};

use crate::{certs::Certificate, witness::WitnessSet};

/// Body of a Babbage/Conway transaction, restricted to the fields a mint uses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionBody {
    pub inputs: Vec<UTxOIdentifier>,
    pub outputs: Vec<TxOutput>,
    pub fee: Lovelace,
    pub ttl: Option<Slot>,
    pub certificates: Vec<Certificate>,
    pub mint: Mint,
    pub script_data_hash: Option<ScriptDataHash>,
    pub collateral: Vec<UTxOIdentifier>,
    pub required_signers: Vec<AddrKeyhash>,
}

impl TransactionBody {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        minicbor::to_vec(self).context("Failed to encode transaction body")
    }

    /// Transaction id: hash of the encoded body
    pub fn id(&self) -> Result<TxHash> {
        Ok(keyhash_256(&self.to_bytes()?))
    }
}

fn encode_list<C, T: minicbor::Encode<C>, W: encode::Write>(
    items: &[T],
    e: &mut Encoder<W>,
    ctx: &mut C,
) -> Result<(), encode::Error<W::Error>> {
    e.array(items.len() as u64)?;
    for item in items {
        e.encode_with(item, ctx)?;
    }
    Ok(())
}

// Keys are written in ascending order so the encoding is canonical
impl<C> minicbor::Encode<C> for TransactionBody {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        let entries = 3
            + self.ttl.is_some() as u64
            + !self.certificates.is_empty() as u64
            + !self.mint.is_empty() as u64
            + self.script_data_hash.is_some() as u64
            + !self.collateral.is_empty() as u64
            + !self.required_signers.is_empty() as u64;
        e.map(entries)?;

        e.u8(0)?;
        encode_list(&self.inputs, e, ctx)?;
        e.u8(1)?;
        encode_list(&self.outputs, e, ctx)?;
        e.u8(2)?.u64(self.fee)?;
        if let Some(ttl) = self.ttl {
            e.u8(3)?.u64(ttl)?;
        }
        if !self.certificates.is_empty() {
            e.u8(4)?;
            encode_list(&self.certificates, e, ctx)?;
        }
        if !self.mint.is_empty() {
            e.u8(9)?.encode_with(&self.mint, ctx)?;
        }
        if let Some(hash) = &self.script_data_hash {
            e.u8(11)?.encode_with(hash, ctx)?;
        }
        if !self.collateral.is_empty() {
            e.u8(13)?;
            encode_list(&self.collateral, e, ctx)?;
        }
        if !self.required_signers.is_empty() {
            e.u8(14)?;
            encode_list(&self.required_signers, e, ctx)?;
        }
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TransactionBody {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Self, decode::Error> {
        let mut body = TransactionBody::default();
        let mut has_inputs = false;
        cbor::decode_map(d, ctx, |d, ctx| {
            match d.u64()? {
                0 => {
                    body.inputs = cbor::decode_array(d, ctx, |d, ctx| d.decode_with(ctx))?;
                    has_inputs = true;
                }
                1 => body.outputs = cbor::decode_array(d, ctx, |d, ctx| d.decode_with(ctx))?,
                2 => body.fee = d.u64()?,
                3 => body.ttl = Some(d.u64()?),
                4 => body.certificates = cbor::decode_array(d, ctx, |d, ctx| d.decode_with(ctx))?,
                9 => body.mint = d.decode_with(ctx)?,
                11 => body.script_data_hash = Some(d.decode_with(ctx)?),
                13 => body.collateral = cbor::decode_array(d, ctx, |d, ctx| d.decode_with(ctx))?,
                14 => {
                    body.required_signers =
                        cbor::decode_array(d, ctx, |d, ctx| d.decode_with(ctx))?
                }
                // Withdrawals, metadata hash, validity start and the rest are not modelled
                _ => d.skip()?,
            }
            Ok(((), ()))
        })?;
        if !has_inputs {
            return Err(decode::Error::message("transaction body without inputs"));
        }
        Ok(body)
    }
}

/// A complete transaction: `[body, witness_set, is_valid, auxiliary_data]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub body: TransactionBody,
    pub witness_set: WitnessSet,
    pub is_valid: bool,
}

impl Transaction {
    pub fn new(body: TransactionBody, witness_set: WitnessSet) -> Self {
        Self {
            body,
            witness_set,
            is_valid: true,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        minicbor::to_vec(self).context("Failed to encode transaction")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        minicbor::decode(bytes).context("Failed to decode transaction")
    }

    pub fn id(&self) -> Result<TxHash> {
        self.body.id()
    }
}

impl<C> minicbor::Encode<C> for Transaction {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        e.array(4)?;
        e.encode_with(&self.body, ctx)?;
        e.encode_with(&self.witness_set, ctx)?;
        e.bool(self.is_valid)?;
        e.null()?;
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Transaction {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Self, decode::Error> {
        let fields = d.array()?;
        let body = d.decode_with(ctx)?;
        let witness_set = d.decode_with(ctx)?;
        // Pre-Alonzo transactions have no validity flag
        let is_valid = if d.datatype()? == Type::Bool {
            d.bool()?
        } else {
            true
        };
        // Auxiliary data is not modelled
        d.skip()?;
        if fields.is_none() {
            cbor::consume_break(d)?;
        }
        Ok(Self {
            body,
            witness_set,
            is_valid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certs::PoolKeyhash;
    use minter_common::{AssetName, PolicyId, Value};

    fn sample_body() -> TransactionBody {
        let mut mint = Mint::new();
        mint.add(PolicyId::new([7; 28]), AssetName::from_utf8("Token").unwrap(), 1);
        TransactionBody {
            inputs: vec![UTxOIdentifier::new(TxHash::new([1; 32]), 0)],
            outputs: vec![TxOutput::new(vec![0x60; 29], Value::coin(2_000_000))],
            fee: 180_000,
            ttl: Some(1_000),
            certificates: vec![],
            mint,
            script_data_hash: Some(ScriptDataHash::new([9; 32])),
            collateral: vec![UTxOIdentifier::new(TxHash::new([2; 32]), 1)],
            required_signers: vec![AddrKeyhash::new([3; 28])],
        }
    }

    #[test]
    fn body_keys_are_ascending() {
        let bytes = sample_body().to_bytes().unwrap();
        let mut d = Decoder::new(&bytes);
        let keys = cbor::decode_map(&mut d, &mut (), |d, _| {
            let key = d.u64()?;
            d.skip()?;
            Ok((key, ()))
        })
        .unwrap();
        let keys: Vec<u64> = keys.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![0, 1, 2, 3, 9, 11, 13, 14]);
    }

    #[test]
    fn body_decodes_to_the_same_value() {
        let mut body = sample_body();
        body.certificates = vec![
            Certificate::StakeRegistration(AddrKeyhash::new([4; 28])),
            Certificate::StakeDelegation(AddrKeyhash::new([4; 28]), PoolKeyhash::new([5; 28])),
        ];
        let decoded: TransactionBody = minicbor::decode(&body.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, body);
        assert_eq!(decoded.id().unwrap(), body.id().unwrap());
    }

    #[test]
    fn empty_optional_fields_are_omitted() {
        let body = TransactionBody {
            inputs: vec![UTxOIdentifier::new(TxHash::new([1; 32]), 0)],
            ..Default::default()
        };
        let bytes = body.to_bytes().unwrap();
        // map(3) {0: [...], 1: [], 2: 0}
        assert_eq!(bytes[0], 0xa3);
    }

    #[test]
    fn transaction_has_validity_flag_and_null_metadata() {
        let tx = Transaction::new(sample_body(), WitnessSet::default());
        let bytes = tx.to_bytes().unwrap();
        assert_eq!(bytes[0], 0x84);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xf5, 0xf6]);
        assert_eq!(Transaction::from_bytes(&bytes).unwrap(), tx);
    }
}
