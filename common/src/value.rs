//! Multi-asset values and the mint field

use std::collections::BTreeMap;

use minicbor::{data::Type, decode, encode, Decoder, Encoder};

use crate::{cbor, AssetName, Lovelace, PolicyId};

/// Native assets held in an output, grouped by policy
pub type MultiAsset = BTreeMap<PolicyId, BTreeMap<AssetName, u64>>;

/// Value of an output: native currency plus optional native assets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Value {
    pub coin: Lovelace,
    pub assets: MultiAsset,
}

impl Value {
    pub fn coin(coin: Lovelace) -> Self {
        Self {
            coin,
            assets: MultiAsset::new(),
        }
    }

    /// True when the value carries only the native currency
    pub fn is_pure_coin(&self) -> bool {
        self.assets.values().all(|assets| assets.values().all(|q| *q == 0))
    }

    pub fn checked_add(&self, other: &Value) -> Option<Value> {
        let mut sum = self.clone();
        sum.coin = sum.coin.checked_add(other.coin)?;
        for (policy, assets) in &other.assets {
            let entry = sum.assets.entry(*policy).or_default();
            for (name, quantity) in assets {
                let held = entry.entry(name.clone()).or_insert(0);
                *held = held.checked_add(*quantity)?;
            }
        }
        Some(sum)
    }

    /// Apply a mint field: positive quantities are added, negative ones
    /// burned. Returns None when a burn exceeds the held quantity.
    pub fn apply_mint(&self, mint: &Mint) -> Option<Value> {
        let mut result = self.clone();
        for (policy, assets) in mint.iter() {
            let entry = result.assets.entry(*policy).or_default();
            for (name, quantity) in assets {
                let held = entry.get(name).copied().unwrap_or(0) as i128;
                let updated = held + *quantity as i128;
                if updated < 0 {
                    return None;
                }
                if updated == 0 {
                    entry.remove(name);
                } else {
                    entry.insert(name.clone(), u64::try_from(updated).ok()?);
                }
            }
        }
        result.assets.retain(|_, assets| !assets.is_empty());
        Some(result)
    }
}

impl<C> minicbor::Encode<C> for Value {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        if self.assets.is_empty() {
            e.u64(self.coin)?;
        } else {
            e.array(2)?;
            e.u64(self.coin)?;
            encode_assets(&self.assets, e, ctx, |e, q| {
                e.u64(*q)?;
                Ok(())
            })?;
        }
        Ok(())
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Value {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Self, decode::Error> {
        match d.datatype()? {
            Type::U8 | Type::U16 | Type::U32 | Type::U64 => Ok(Value::coin(d.u64()?)),
            Type::Array | Type::ArrayIndef => {
                let fields = d.array()?;
                let coin = d.u64()?;
                let assets = decode_assets(d, ctx, |d| d.u64())?;
                if fields.is_none() {
                    cbor::consume_break(d)?;
                }
                Ok(Value { coin, assets })
            }
            other => Err(decode::Error::type_mismatch(other)),
        }
    }
}

/// The mint field of a body. Positive quantities mint, negative ones burn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mint(BTreeMap<PolicyId, BTreeMap<AssetName, i64>>);

impl Mint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a quantity for an asset. Entries netting to zero are dropped,
    /// the ledger rejects zero quantities in the mint field.
    pub fn add(&mut self, policy: PolicyId, name: AssetName, quantity: i64) {
        let assets = self.0.entry(policy).or_default();
        let total = assets.get(&name).copied().unwrap_or(0).saturating_add(quantity);
        if total == 0 {
            assets.remove(&name);
        } else {
            assets.insert(name, total);
        }
        if assets.is_empty() {
            self.0.remove(&policy);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PolicyId, &BTreeMap<AssetName, i64>)> {
        self.0.iter()
    }

    /// Policies in ledger order, the order mint redeemer indexes refer to
    pub fn policies(&self) -> impl Iterator<Item = &PolicyId> {
        self.0.keys()
    }

    pub fn asset_count(&self) -> usize {
        self.0.values().map(|assets| assets.len()).sum()
    }

    pub fn quantity(&self, policy: &PolicyId, name: &AssetName) -> Option<i64> {
        self.0.get(policy).and_then(|assets| assets.get(name)).copied()
    }
}

impl<C> minicbor::Encode<C> for Mint {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        encode_assets(&self.0, e, ctx, |e, q| {
            e.i64(*q)?;
            Ok(())
        })
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Mint {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Self, decode::Error> {
        Ok(Mint(decode_assets(d, ctx, |d| d.i64())?))
    }
}

fn encode_assets<C, W, Q, F>(
    assets: &BTreeMap<PolicyId, BTreeMap<AssetName, Q>>,
    e: &mut Encoder<W>,
    ctx: &mut C,
    mut quantity: F,
) -> Result<(), encode::Error<W::Error>>
where
    W: encode::Write,
    F: FnMut(&mut Encoder<W>, &Q) -> Result<(), encode::Error<W::Error>>,
{
    e.map(assets.len() as u64)?;
    for (policy, names) in assets {
        e.encode_with(policy, ctx)?;
        e.map(names.len() as u64)?;
        for (name, q) in names {
            e.encode_with(name, ctx)?;
            quantity(e, q)?;
        }
    }
    Ok(())
}

fn decode_assets<'b, C, Q, F>(
    d: &mut Decoder<'b>,
    ctx: &mut C,
    mut quantity: F,
) -> Result<BTreeMap<PolicyId, BTreeMap<AssetName, Q>>, decode::Error>
where
    F: FnMut(&mut Decoder<'b>) -> Result<Q, decode::Error>,
{
    let policies = cbor::decode_map(d, ctx, |d, ctx| {
        let policy: PolicyId = d.decode_with(ctx)?;
        let names = cbor::decode_map(d, ctx, |d, ctx| {
            let name: AssetName = d.decode_with(ctx)?;
            Ok((name, quantity(d)?))
        })?;
        Ok((policy, names.into_iter().collect()))
    })?;
    Ok(policies.into_iter().collect())
}
