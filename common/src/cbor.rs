//! Small decoding helpers shared by the ledger types.
//!
//! Wallets and evaluators produce a mix of definite and indefinite-length
//! containers, and Conway-era encoders may wrap sets in tag 258. These helpers
//! accept all of those forms.

use minicbor::{
    data::{Tag, Type},
    decode, encode, Decoder, Encoder,
};

/// CBOR tag for mathematical finite sets
pub const SET_TAG: u64 = 258;

/// Plutus bounded bytes are chunked into 64 byte pieces when longer
pub const BYTES_CHUNK: usize = 64;

/// Consume the break byte terminating an indefinite container.
pub fn consume_break(d: &mut Decoder<'_>) -> Result<(), decode::Error> {
    match d.datatype()? {
        Type::Break => {
            d.set_position(d.position() + 1);
            Ok(())
        }
        other => Err(decode::Error::type_mismatch(other)),
    }
}

/// Skip a leading set tag if there is one.
pub fn skip_set_tag(d: &mut Decoder<'_>) -> Result<(), decode::Error> {
    if d.datatype()? == Type::Tag {
        let position = d.position();
        if d.tag()? != Tag::new(SET_TAG) {
            d.set_position(position);
        }
    }
    Ok(())
}

/// Decode an array of any length encoding, optionally tagged as a set.
pub fn decode_array<'b, C, T, F>(
    d: &mut Decoder<'b>,
    ctx: &mut C,
    mut item: F,
) -> Result<Vec<T>, decode::Error>
where
    F: FnMut(&mut Decoder<'b>, &mut C) -> Result<T, decode::Error>,
{
    skip_set_tag(d)?;
    let mut items = Vec::new();
    match d.array()? {
        Some(len) => {
            for _ in 0..len {
                items.push(item(d, ctx)?);
            }
        }
        None => {
            while d.datatype()? != Type::Break {
                items.push(item(d, ctx)?);
            }
            consume_break(d)?;
        }
    }
    Ok(items)
}

/// Decode a map of any length encoding into key/value pairs, in wire order.
pub fn decode_map<'b, C, K, V, F>(
    d: &mut Decoder<'b>,
    ctx: &mut C,
    mut entry: F,
) -> Result<Vec<(K, V)>, decode::Error>
where
    F: FnMut(&mut Decoder<'b>, &mut C) -> Result<(K, V), decode::Error>,
{
    let mut entries = Vec::new();
    match d.map()? {
        Some(len) => {
            for _ in 0..len {
                entries.push(entry(d, ctx)?);
            }
        }
        None => {
            while d.datatype()? != Type::Break {
                entries.push(entry(d, ctx)?);
            }
            consume_break(d)?;
        }
    }
    Ok(entries)
}

/// Decode a byte string that may be split into indefinite-length chunks.
pub fn decode_chunked_bytes(d: &mut Decoder<'_>) -> Result<Vec<u8>, decode::Error> {
    match d.datatype()? {
        Type::Bytes => Ok(d.bytes()?.to_vec()),
        Type::BytesIndef => {
            let mut out = Vec::new();
            for chunk in d.bytes_iter()? {
                out.extend_from_slice(chunk?);
            }
            Ok(out)
        }
        other => Err(decode::Error::type_mismatch(other)),
    }
}

/// Encode bytes, splitting into 64 byte chunks when they exceed that size.
pub fn encode_chunked_bytes<W: encode::Write>(
    bytes: &[u8],
    e: &mut Encoder<W>,
) -> Result<(), encode::Error<W::Error>> {
    if bytes.len() <= BYTES_CHUNK {
        e.bytes(bytes)?;
    } else {
        e.begin_bytes()?;
        for chunk in bytes.chunks(BYTES_CHUNK) {
            e.bytes(chunk)?;
        }
        e.end()?;
    }
    Ok(())
}
