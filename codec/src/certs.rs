use minicbor::{Decoder, Encoder, decode, encode};
use minter_common::{AddrKeyhash, Hash, cbor};

pub type PoolKeyhash = Hash<28>;

/// The stake certificates a wallet-facing body may carry. Only key-hash
/// credentials are modelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Certificate {
    StakeRegistration(AddrKeyhash),
    StakeDelegation(AddrKeyhash, PoolKeyhash),
}

fn encode_credential<W: encode::Write>(
    hash: &AddrKeyhash,
    e: &mut Encoder<W>,
) -> Result<(), encode::Error<W::Error>> {
    e.array(2)?.u8(0)?.bytes(hash.as_ref())?;
    Ok(())
}

fn decode_credential(d: &mut Decoder<'_>) -> Result<AddrKeyhash, decode::Error> {
    let fields = d.array()?;
    if d.u8()? != 0 {
        return Err(decode::Error::message("only key hash credentials are supported"));
    }
    let hash = d.decode()?;
    if fields.is_none() {
        cbor::consume_break(d)?;
    }
    Ok(hash)
}

impl<C> minicbor::Encode<C> for Certificate {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        match self {
            Certificate::StakeRegistration(credential) => {
                e.array(2)?.u8(0)?;
                encode_credential(credential, e)?;
            }
            Certificate::StakeDelegation(credential, pool) => {
                e.array(3)?.u8(2)?;
                encode_credential(credential, e)?;
                e.bytes(pool.as_ref())?;
            }
        }
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Certificate {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> Result<Self, decode::Error> {
        let fields = d.array()?;
        let certificate = match d.u8()? {
            0 => Certificate::StakeRegistration(decode_credential(d)?),
            2 => Certificate::StakeDelegation(decode_credential(d)?, d.decode()?),
            other => {
                return Err(decode::Error::message(format!(
                    "unsupported certificate kind {other}"
                )));
            }
        };
        if fields.is_none() {
            cbor::consume_break(d)?;
        }
        Ok(certificate)
    }
}
