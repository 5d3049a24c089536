use std::{collections::BTreeMap, fmt, str::FromStr};

use anyhow::{anyhow, bail};
use minicbor::{decode, encode, Decoder, Encoder};
use serde::{Deserialize, Serialize};

use crate::{cbor, crypto::keyhash_224_tagged, plutus_data::PlutusData, ScriptHash};

/// Plutus language version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Language {
    PlutusV1,
    PlutusV2,
    PlutusV3,
}

impl Language {
    /// Ledger language id, also the key of the language view
    pub fn id(&self) -> u8 {
        match self {
            Language::PlutusV1 => 0,
            Language::PlutusV2 => 1,
            Language::PlutusV3 => 2,
        }
    }

    /// Prefix byte for script hashing
    fn hash_tag(&self) -> u8 {
        self.id() + 1
    }
}

impl FromStr for Language {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PlutusV1" | "plutus-v1" => Ok(Language::PlutusV1),
            "PlutusV2" | "plutus-v2" => Ok(Language::PlutusV2),
            "PlutusV3" | "plutus-v3" => Ok(Language::PlutusV3),
            other => bail!("Unknown plutus language '{other}'"),
        }
    }
}

/// A Plutus script: the flat-encoded program wrapped in one CBOR byte string,
/// exactly as it appears in the witness set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlutusScript {
    pub language: Language,
    pub bytes: Vec<u8>,
}

impl PlutusScript {
    pub fn new(language: Language, bytes: Vec<u8>) -> Self {
        Self { language, bytes }
    }

    /// Build from the serialisation-library form, where the witness bytes are
    /// wrapped in one further CBOR byte string.
    pub fn from_cbor(language: Language, cbor: &[u8]) -> anyhow::Result<Self> {
        let mut d = Decoder::new(cbor);
        let inner = d.bytes().map_err(|e| anyhow!("Script is not a CBOR byte string: {e}"))?;
        if d.position() != cbor.len() {
            bail!("Trailing bytes after script");
        }
        Ok(Self::new(language, inner.to_vec()))
    }

    pub fn hash(&self) -> ScriptHash {
        keyhash_224_tagged(self.language.hash_tag(), &self.bytes)
    }
}

/// Execution units: memory and CPU steps
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    minicbor::Encode,
    minicbor::Decode,
)]
#[cbor(array)]
pub struct ExUnits {
    #[n(0)]
    pub mem: u64,
    #[n(1)]
    pub steps: u64,
}

impl ExUnits {
    pub fn new(mem: u64, steps: u64) -> Self {
        Self { mem, steps }
    }

    pub fn checked_add(&self, other: &ExUnits) -> Option<ExUnits> {
        Some(ExUnits {
            mem: self.mem.checked_add(other.mem)?,
            steps: self.steps.checked_add(other.steps)?,
        })
    }

    /// True when both components fit inside `budget`
    pub fn fits(&self, budget: &ExUnits) -> bool {
        self.mem <= budget.mem && self.steps <= budget.steps
    }
}

impl fmt::Display for ExUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{memory: {}, steps: {}}}", self.mem, self.steps)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    minicbor::Encode,
    minicbor::Decode,
)]
#[cbor(index_only)]
pub enum RedeemerTag {
    #[n(0)]
    Spend,
    #[n(1)]
    Mint,
    #[n(2)]
    Cert,
    #[n(3)]
    Reward,
}

impl RedeemerTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedeemerTag::Spend => "spend",
            RedeemerTag::Mint => "mint",
            RedeemerTag::Cert => "certificate",
            RedeemerTag::Reward => "withdrawal",
        }
    }
}

impl FromStr for RedeemerTag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spend" => Ok(RedeemerTag::Spend),
            "mint" => Ok(RedeemerTag::Mint),
            "certificate" | "cert" | "publish" => Ok(RedeemerTag::Cert),
            "withdrawal" | "reward" | "withdraw" => Ok(RedeemerTag::Reward),
            other => bail!("Unknown redeemer tag '{other}'"),
        }
    }
}

/// Identifies the script purpose a redeemer belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RedeemerPointer {
    pub tag: RedeemerTag,
    pub index: u32,
}

impl RedeemerPointer {
    pub fn new(tag: RedeemerTag, index: u32) -> Self {
        Self { tag, index }
    }
}

/// Formats as the evaluator key, e.g. `mint:0`
impl fmt::Display for RedeemerPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tag.as_str(), self.index)
    }
}

impl FromStr for RedeemerPointer {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, index) =
            s.split_once(':').ok_or_else(|| anyhow!("Redeemer key '{s}' is not <tag>:<index>"))?;
        Ok(Self {
            tag: tag.parse()?,
            index: index.parse().map_err(|e| anyhow!("Bad redeemer index in '{s}': {e}"))?,
        })
    }
}

/// A redeemer whose execution units have not been measured yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpricedRedeemer {
    pub pointer: RedeemerPointer,
    pub data: PlutusData,
}

impl UnpricedRedeemer {
    pub fn price(self, ex_units: ExUnits) -> Redeemer {
        Redeemer {
            pointer: self.pointer,
            data: self.data,
            ex_units,
        }
    }

    /// Same redeemer with explicit units, used for drafts and size estimates
    pub fn with_units(&self, ex_units: ExUnits) -> Redeemer {
        self.clone().price(ex_units)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redeemer {
    pub pointer: RedeemerPointer,
    pub data: PlutusData,
    pub ex_units: ExUnits,
}

// Array form: [tag, index, data, ex_units]
impl<C> minicbor::Encode<C> for Redeemer {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        e.array(4)?;
        e.encode_with(self.pointer.tag, ctx)?;
        e.u32(self.pointer.index)?;
        e.encode_with(&self.data, ctx)?;
        e.encode_with(self.ex_units, ctx)?;
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Redeemer {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Self, decode::Error> {
        let fields = d.array()?;
        let tag = d.decode_with(ctx)?;
        let index = d.u32()?;
        let data = d.decode_with(ctx)?;
        let ex_units = d.decode_with(ctx)?;
        if fields.is_none() {
            cbor::consume_break(d)?;
        }
        Ok(Self {
            pointer: RedeemerPointer { tag, index },
            data,
            ex_units,
        })
    }
}

/// Cost model: ordered operation costs for one language
pub type CostModel = Vec<i64>;

/// Cost models by language
pub type CostModels = BTreeMap<Language, CostModel>;

/// Measured execution units keyed by redeemer pointer
pub type EvaluationResult = BTreeMap<RedeemerPointer, ExUnits>;
