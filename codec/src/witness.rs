use anyhow::{Context, Result};
use minicbor::{Decoder, Encoder, data::Type, decode, encode};
use minter_common::{
    ExUnits, Language, PlutusData, PlutusScript, Redeemer, RedeemerPointer, cbor,
};

/// A verification key and the signature it made over the transaction id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VKeyWitness {
    pub vkey: [u8; 32],
    pub signature: [u8; 64],
}

impl VKeyWitness {
    /// Zeroed witness with the encoded size of a real one, for fee estimation
    pub fn placeholder() -> Self {
        Self {
            vkey: [0; 32],
            signature: [0; 64],
        }
    }
}

impl<C> minicbor::Encode<C> for VKeyWitness {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        e.array(2)?.bytes(&self.vkey)?.bytes(&self.signature)?;
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for VKeyWitness {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> Result<Self, decode::Error> {
        let fields = d.array()?;
        let vkey = d
            .bytes()?
            .try_into()
            .map_err(|_| decode::Error::message("vkey must be 32 bytes"))?;
        let signature = d
            .bytes()?
            .try_into()
            .map_err(|_| decode::Error::message("signature must be 64 bytes"))?;
        if fields.is_none() {
            cbor::consume_break(d)?;
        }
        Ok(Self { vkey, signature })
    }
}

/// The witness set of a transaction. Native scripts and bootstrap witnesses
/// are not modelled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WitnessSet {
    pub vkeys: Vec<VKeyWitness>,
    pub plutus_scripts: Vec<PlutusScript>,
    pub plutus_data: Vec<PlutusData>,
    pub redeemers: Vec<Redeemer>,
}

impl WitnessSet {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        minicbor::to_vec(self).context("Failed to encode witness set")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        minicbor::decode(bytes).context("Failed to decode witness set")
    }

    pub fn is_empty(&self) -> bool {
        self.vkeys.is_empty()
            && self.plutus_scripts.is_empty()
            && self.plutus_data.is_empty()
            && self.redeemers.is_empty()
    }

    /// Languages of the attached scripts, sorted and deduplicated
    pub fn languages(&self) -> Vec<Language> {
        let mut languages: Vec<Language> =
            self.plutus_scripts.iter().map(|script| script.language).collect();
        languages.sort();
        languages.dedup();
        languages
    }

    fn scripts_of(&self, language: Language) -> impl Iterator<Item = &PlutusScript> {
        self.plutus_scripts.iter().filter(move |script| script.language == language)
    }

    pub fn redeemer(&self, pointer: &RedeemerPointer) -> Option<&Redeemer> {
        self.redeemers.iter().find(|redeemer| redeemer.pointer == *pointer)
    }
}

/// Encode redeemers in the array form. Used both in the witness set and in
/// the script data commitment so the two always agree.
pub fn encode_redeemers<W: encode::Write>(
    redeemers: &[Redeemer],
    e: &mut Encoder<W>,
) -> Result<(), encode::Error<W::Error>> {
    e.array(redeemers.len() as u64)?;
    for redeemer in redeemers {
        e.encode(redeemer)?;
    }
    Ok(())
}

/// Plutus data witnesses, written as a definite array
pub fn encode_plutus_data<W: encode::Write>(
    data: &[PlutusData],
    e: &mut Encoder<W>,
) -> Result<(), encode::Error<W::Error>> {
    e.array(data.len() as u64)?;
    for datum in data {
        e.encode(datum)?;
    }
    Ok(())
}

fn decode_redeemers<'b, C>(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Vec<Redeemer>, decode::Error> {
    match d.datatype()? {
        // Conway map form: { [tag, index] => [data, ex_units] }
        Type::Map | Type::MapIndef => {
            let entries = cbor::decode_map(d, ctx, |d, ctx| {
                let key_fields = d.array()?;
                let tag = d.decode_with(ctx)?;
                let index = d.u32()?;
                if key_fields.is_none() {
                    cbor::consume_break(d)?;
                }
                let value_fields = d.array()?;
                let data: PlutusData = d.decode_with(ctx)?;
                let ex_units: ExUnits = d.decode_with(ctx)?;
                if value_fields.is_none() {
                    cbor::consume_break(d)?;
                }
                Ok((RedeemerPointer::new(tag, index), (data, ex_units)))
            })?;
            Ok(entries
                .into_iter()
                .map(|(pointer, (data, ex_units))| Redeemer {
                    pointer,
                    data,
                    ex_units,
                })
                .collect())
        }
        _ => cbor::decode_array(d, ctx, |d, ctx| d.decode_with(ctx)),
    }
}

fn decode_scripts<'b, C>(
    d: &mut Decoder<'b>,
    ctx: &mut C,
    language: Language,
) -> Result<Vec<PlutusScript>, decode::Error> {
    cbor::decode_array(d, ctx, |d, _| {
        Ok(PlutusScript::new(language, d.bytes()?.to_vec()))
    })
}

impl<C> minicbor::Encode<C> for WitnessSet {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        let script_keys = [
            (3u8, Language::PlutusV1),
            (6, Language::PlutusV2),
            (7, Language::PlutusV3),
        ];
        let languages = self.languages();
        let entries = !self.vkeys.is_empty() as u64
            + languages.len() as u64
            + !self.plutus_data.is_empty() as u64
            + !self.redeemers.is_empty() as u64;
        e.map(entries)?;

        if !self.vkeys.is_empty() {
            e.u8(0)?.array(self.vkeys.len() as u64)?;
            for witness in &self.vkeys {
                e.encode_with(witness, ctx)?;
            }
        }

        let write_scripts = |e: &mut Encoder<W>, key: u8, language: Language| {
            if languages.contains(&language) {
                e.u8(key)?.array(self.scripts_of(language).count() as u64)?;
                for script in self.scripts_of(language) {
                    e.bytes(&script.bytes)?;
                }
            }
            Ok::<_, encode::Error<W::Error>>(())
        };

        // Keys must ascend: 0, 3, 4, 5, 6, 7
        write_scripts(e, script_keys[0].0, script_keys[0].1)?;
        if !self.plutus_data.is_empty() {
            e.u8(4)?;
            encode_plutus_data(&self.plutus_data, e)?;
        }
        if !self.redeemers.is_empty() {
            e.u8(5)?;
            encode_redeemers(&self.redeemers, e)?;
        }
        for (key, language) in &script_keys[1..] {
            write_scripts(e, *key, *language)?;
        }
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for WitnessSet {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Self, decode::Error> {
        let mut witness_set = WitnessSet::default();
        cbor::decode_map(d, ctx, |d, ctx| {
            match d.u64()? {
                0 => witness_set.vkeys = cbor::decode_array(d, ctx, |d, ctx| d.decode_with(ctx))?,
                3 => witness_set
                    .plutus_scripts
                    .extend(decode_scripts(d, ctx, Language::PlutusV1)?),
                4 => {
                    witness_set.plutus_data =
                        cbor::decode_array(d, ctx, |d, ctx| d.decode_with(ctx))?
                }
                5 => witness_set.redeemers = decode_redeemers(d, ctx)?,
                6 => witness_set
                    .plutus_scripts
                    .extend(decode_scripts(d, ctx, Language::PlutusV2)?),
                7 => witness_set
                    .plutus_scripts
                    .extend(decode_scripts(d, ctx, Language::PlutusV3)?),
                // Native scripts and bootstrap witnesses
                _ => d.skip()?,
            }
            Ok(((), ()))
        })?;
        Ok(witness_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minter_common::RedeemerTag;

    fn redeemer() -> Redeemer {
        Redeemer {
            pointer: RedeemerPointer::new(RedeemerTag::Mint, 0),
            data: PlutusData::constr(0, vec![]),
            ex_units: ExUnits::new(500_000, 200_000_000),
        }
    }

    #[test]
    fn empty_witness_set_is_an_empty_map() {
        assert_eq!(WitnessSet::default().to_bytes().unwrap(), vec![0xa0]);
    }

    #[test]
    fn witness_set_keys_ascend_and_decode_back() {
        let witness_set = WitnessSet {
            vkeys: vec![VKeyWitness::placeholder()],
            plutus_scripts: vec![
                PlutusScript::new(Language::PlutusV2, vec![1, 2, 3]),
                PlutusScript::new(Language::PlutusV1, vec![4, 5]),
            ],
            plutus_data: vec![PlutusData::Integer(42)],
            redeemers: vec![redeemer()],
        };
        let bytes = witness_set.to_bytes().unwrap();
        let mut d = Decoder::new(&bytes);
        let keys: Vec<u64> = cbor::decode_map(&mut d, &mut (), |d, _| {
            let key = d.u64()?;
            d.skip()?;
            Ok((key, ()))
        })
        .unwrap()
        .into_iter()
        .map(|(k, _)| k)
        .collect();
        assert_eq!(keys, vec![0, 3, 4, 5, 6]);

        let decoded = WitnessSet::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.vkeys, witness_set.vkeys);
        assert_eq!(decoded.redeemers, witness_set.redeemers);
        assert_eq!(decoded.languages(), vec![Language::PlutusV1, Language::PlutusV2]);
    }

    #[test]
    fn accepts_conway_map_redeemers() {
        // {5: {[1, 0]: [121([]), [500000, 200000000]]}}
        let bytes = hex::decode("a105a182010082d87980821a0007a1201a0bebc200").unwrap();
        let decoded = WitnessSet::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.redeemers, vec![redeemer()]);
    }

    #[test]
    fn accepts_tagged_vkey_set() {
        let mut raw = vec![0xa1, 0x00, 0xd9, 0x01, 0x02, 0x81, 0x82, 0x58, 0x20];
        raw.extend([0xaa; 32]);
        raw.extend([0x58, 0x40]);
        raw.extend([0xbb; 64]);
        let decoded = WitnessSet::from_bytes(&raw).unwrap();
        assert_eq!(decoded.vkeys.len(), 1);
        assert_eq!(decoded.vkeys[0].vkey, [0xaa; 32]);
    }

    #[test]
    fn rejects_short_signature() {
        let mut raw = vec![0xa1, 0x00, 0x81, 0x82, 0x58, 0x20];
        raw.extend([0xaa; 32]);
        raw.extend([0x41, 0x00]);
        assert!(WitnessSet::from_bytes(&raw).is_err());
    }
}
