//! Plutus data: the structured argument type passed to scripts as datums and redeemers

use minicbor::{
    data::{Int, Tag, Type},
    decode, encode, Decoder, Encode, Encoder,
};

use crate::cbor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlutusData {
    Constr { tag: u64, fields: Vec<PlutusData> },
    Map(Vec<(PlutusData, PlutusData)>),
    List(Vec<PlutusData>),
    Integer(i128),
    Bytes(Vec<u8>),
}

impl PlutusData {
    pub fn constr(tag: u64, fields: Vec<PlutusData>) -> Self {
        PlutusData::Constr { tag, fields }
    }

    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        PlutusData::Bytes(bytes.into())
    }
}

// Constructor alternatives 0..=6 use tags 121..=127, 7..=127 use 1280..=1400,
// anything else falls back to tag 102 with an explicit alternative number.
const COMPACT_CONSTR_BASE: u64 = 121;
const EXTENDED_CONSTR_BASE: u64 = 1280;
const GENERAL_CONSTR_TAG: u64 = 102;
const BIG_UINT_TAG: u64 = 2;
const BIG_NINT_TAG: u64 = 3;

fn encode_list<C, W: encode::Write>(
    items: &[PlutusData],
    e: &mut Encoder<W>,
    ctx: &mut C,
) -> Result<(), encode::Error<W::Error>> {
    // Non-empty lists are indefinite, matching the node's own encoding
    if items.is_empty() {
        e.array(0)?;
    } else {
        e.begin_array()?;
        for item in items {
            item.encode(e, ctx)?;
        }
        e.end()?;
    }
    Ok(())
}

impl<C> minicbor::Encode<C> for PlutusData {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        match self {
            PlutusData::Constr { tag, fields } => match *tag {
                0..=6 => {
                    e.tag(Tag::new(COMPACT_CONSTR_BASE + tag))?;
                    encode_list(fields, e, ctx)?;
                }
                7..=127 => {
                    e.tag(Tag::new(EXTENDED_CONSTR_BASE + tag - 7))?;
                    encode_list(fields, e, ctx)?;
                }
                _ => {
                    e.tag(Tag::new(GENERAL_CONSTR_TAG))?;
                    e.array(2)?;
                    e.u64(*tag)?;
                    encode_list(fields, e, ctx)?;
                }
            },
            PlutusData::Map(entries) => {
                e.map(entries.len() as u64)?;
                for (k, v) in entries {
                    k.encode(e, ctx)?;
                    v.encode(e, ctx)?;
                }
            }
            PlutusData::List(items) => encode_list(items, e, ctx)?,
            PlutusData::Integer(i) => match Int::try_from(*i) {
                Ok(int) => {
                    e.int(int)?;
                }
                Err(_) => {
                    let (tag, magnitude) = if *i < 0 {
                        (BIG_NINT_TAG, (-1 - *i) as u128)
                    } else {
                        (BIG_UINT_TAG, *i as u128)
                    };
                    let bytes = magnitude.to_be_bytes();
                    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
                    e.tag(Tag::new(tag))?;
                    cbor::encode_chunked_bytes(&bytes[first..], e)?;
                }
            },
            PlutusData::Bytes(bytes) => cbor::encode_chunked_bytes(bytes, e)?,
        }
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for PlutusData {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Self, decode::Error> {
        match d.datatype()? {
            Type::Tag => {
                let tag = d.tag()?.as_u64();
                match tag {
                    121..=127 => Ok(PlutusData::Constr {
                        tag: tag - COMPACT_CONSTR_BASE,
                        fields: cbor::decode_array(d, ctx, |d, ctx| d.decode_with(ctx))?,
                    }),
                    1280..=1400 => Ok(PlutusData::Constr {
                        tag: tag - EXTENDED_CONSTR_BASE + 7,
                        fields: cbor::decode_array(d, ctx, |d, ctx| d.decode_with(ctx))?,
                    }),
                    GENERAL_CONSTR_TAG => {
                        let size = d.array()?;
                        let alternative = d.u64()?;
                        let fields = cbor::decode_array(d, ctx, |d, ctx| d.decode_with(ctx))?;
                        if size.is_none() {
                            cbor::consume_break(d)?;
                        }
                        Ok(PlutusData::Constr {
                            tag: alternative,
                            fields,
                        })
                    }
                    BIG_UINT_TAG | BIG_NINT_TAG => {
                        let bytes = cbor::decode_chunked_bytes(d)?;
                        if bytes.len() > 16 {
                            return Err(decode::Error::message("big integer exceeds 128 bits"));
                        }
                        let magnitude =
                            bytes.iter().fold(0u128, |acc, b| (acc << 8) | u128::from(*b));
                        let magnitude = i128::try_from(magnitude)
                            .map_err(|_| decode::Error::message("big integer exceeds 128 bits"))?;
                        Ok(PlutusData::Integer(if tag == BIG_NINT_TAG {
                            -1 - magnitude
                        } else {
                            magnitude
                        }))
                    }
                    other => Err(decode::Error::message(format!(
                        "unexpected tag {other} in plutus data"
                    ))),
                }
            }
            Type::Map | Type::MapIndef => Ok(PlutusData::Map(cbor::decode_map(
                d,
                ctx,
                |d, ctx| Ok((d.decode_with(ctx)?, d.decode_with(ctx)?)),
            )?)),
            Type::Array | Type::ArrayIndef => Ok(PlutusData::List(cbor::decode_array(
                d,
                ctx,
                |d, ctx| d.decode_with(ctx),
            )?)),
            Type::U8
            | Type::U16
            | Type::U32
            | Type::U64
            | Type::I8
            | Type::I16
            | Type::I32
            | Type::I64
            | Type::Int => Ok(PlutusData::Integer(i128::from(d.int()?))),
            Type::Bytes | Type::BytesIndef => Ok(PlutusData::Bytes(cbor::decode_chunked_bytes(d)?)),
            other => Err(decode::Error::type_mismatch(other)),
        }
    }
}
