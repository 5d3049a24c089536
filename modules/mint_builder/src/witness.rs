//! Script witness assembly: policy script, redeemer datum and mint entry

use std::{fmt, sync::Arc};

use minter_common::{
    AddrKeyhash, AssetName, Mint, MintError, PlutusData, PlutusScript, PolicyId, RedeemerPointer,
    RedeemerTag, UnpricedRedeemer,
};

/// Facts about the minter a datum strategy may draw on
#[derive(Debug, Clone, Default)]
pub struct WitnessContext {
    /// Payment key hash of the wallet's first used address, when it has one
    pub payment_key_hash: Option<AddrKeyhash>,
}

/// Builds the redeemer datum a minting policy expects
pub trait DatumStrategy: Send + Sync + fmt::Debug {
    fn datum(&self, context: &WitnessContext) -> Result<PlutusData, MintError>;

    /// Key hashes the body must list as required signers
    fn required_signers(&self, _context: &WitnessContext) -> Result<Vec<AddrKeyhash>, MintError> {
        Ok(Vec::new())
    }
}

/// `Constr 0 []`
#[derive(Debug, Clone, Copy)]
pub struct EmptyConstr;

impl DatumStrategy for EmptyConstr {
    fn datum(&self, _context: &WitnessContext) -> Result<PlutusData, MintError> {
        Ok(PlutusData::constr(0, vec![]))
    }
}

/// `Constr 0 [[signer, ...]]`, where the signers are the minter's payment key
#[derive(Debug, Clone, Copy)]
pub struct RequiredSignerList;

impl DatumStrategy for RequiredSignerList {
    fn datum(&self, context: &WitnessContext) -> Result<PlutusData, MintError> {
        let signers = self
            .required_signers(context)?
            .into_iter()
            .map(|hash| PlutusData::bytes(hash.to_vec()))
            .collect();
        Ok(PlutusData::constr(0, vec![PlutusData::List(signers)]))
    }

    fn required_signers(&self, context: &WitnessContext) -> Result<Vec<AddrKeyhash>, MintError> {
        let hash = context.payment_key_hash.ok_or_else(|| {
            MintError::InvalidWalletData("payment address has no key hash to sign with".into())
        })?;
        Ok(vec![hash])
    }
}

/// A named minting policy and the datum shape it expects
#[derive(Debug, Clone)]
pub struct MintingPolicy {
    pub name: String,
    pub script: PlutusScript,
    pub datum: Arc<dyn DatumStrategy>,
}

impl MintingPolicy {
    pub fn new(name: impl Into<String>, script: PlutusScript, datum: Arc<dyn DatumStrategy>) -> Self {
        Self {
            name: name.into(),
            script,
            datum,
        }
    }

    pub fn id(&self) -> PolicyId {
        self.script.hash()
    }
}

/// The policy script with its redeemer datum; execution units come later
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialPlutusWitness {
    pub script: PlutusScript,
    pub redeemer_data: PlutusData,
}

/// One asset minted (or burned, when negative) under a script policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintEntry {
    pub asset_name: AssetName,
    pub quantity: i64,
    pub witness: PartialPlutusWitness,
    pub required_signers: Vec<AddrKeyhash>,
}

impl MintEntry {
    pub fn policy_id(&self) -> PolicyId {
        self.witness.script.hash()
    }

    pub fn mint(&self) -> Mint {
        let mut mint = Mint::new();
        mint.add(self.policy_id(), self.asset_name.clone(), self.quantity);
        mint
    }

    /// The mint redeemer; its index is the policy's position in the mint field
    pub fn redeemer(&self, mint: &Mint) -> Result<UnpricedRedeemer, MintError> {
        let policy = self.policy_id();
        let index = mint
            .policies()
            .position(|p| *p == policy)
            .ok_or_else(|| MintError::InvalidRequest(format!("policy {policy} is not minted")))?;
        Ok(UnpricedRedeemer {
            pointer: RedeemerPointer::new(RedeemerTag::Mint, index as u32),
            data: self.witness.redeemer_data.clone(),
        })
    }
}

pub struct WitnessAssembler;

impl WitnessAssembler {
    pub fn assemble(
        policy: &MintingPolicy,
        asset_name: AssetName,
        quantity: i64,
        context: &WitnessContext,
    ) -> Result<MintEntry, MintError> {
        if quantity == 0 {
            return Err(MintError::InvalidRequest("quantity must not be zero".into()));
        }
        let redeemer_data = policy.datum.datum(context)?;
        let required_signers = policy.datum.required_signers(context)?;
        Ok(MintEntry {
            asset_name,
            quantity,
            witness: PartialPlutusWitness {
                script: policy.script.clone(),
                redeemer_data,
            },
            required_signers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minter_common::Language;

    fn policy(datum: Arc<dyn DatumStrategy>) -> MintingPolicy {
        MintingPolicy::new(
            "test",
            PlutusScript::new(Language::PlutusV2, vec![0x4d, 0x01, 0x00, 0x00]),
            datum,
        )
    }

    fn token() -> AssetName {
        AssetName::from_utf8("Token").unwrap()
    }

    #[test]
    fn empty_constructor_needs_no_signers() {
        let entry =
            WitnessAssembler::assemble(&policy(Arc::new(EmptyConstr)), token(), 5, &Default::default())
                .unwrap();
        assert_eq!(entry.witness.redeemer_data, PlutusData::constr(0, vec![]));
        assert!(entry.required_signers.is_empty());
        assert_eq!(entry.mint().quantity(&entry.policy_id(), &token()), Some(5));
    }

    #[test]
    fn signer_list_carries_payment_key() {
        let key = AddrKeyhash::new([9; 28]);
        let context = WitnessContext {
            payment_key_hash: Some(key),
        };
        let entry =
            WitnessAssembler::assemble(&policy(Arc::new(RequiredSignerList)), token(), 1, &context)
                .unwrap();
        assert_eq!(
            entry.witness.redeemer_data,
            PlutusData::constr(0, vec![PlutusData::List(vec![PlutusData::bytes(vec![9; 28])])])
        );
        assert_eq!(entry.required_signers, vec![key]);
    }

    #[test]
    fn signer_list_without_key_is_rejected() {
        let err = WitnessAssembler::assemble(
            &policy(Arc::new(RequiredSignerList)),
            token(),
            1,
            &WitnessContext::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MintError::InvalidWalletData(_)));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let err = WitnessAssembler::assemble(
            &policy(Arc::new(EmptyConstr)),
            token(),
            0,
            &Default::default(),
        )
        .unwrap_err();
        assert!(matches!(err, MintError::InvalidRequest(_)));
    }

    #[test]
    fn burn_entries_are_negative() {
        let entry =
            WitnessAssembler::assemble(&policy(Arc::new(EmptyConstr)), token(), -3, &Default::default())
                .unwrap();
        assert_eq!(entry.mint().quantity(&entry.policy_id(), &token()), Some(-3));
        let redeemer = entry.redeemer(&entry.mint()).unwrap();
        assert_eq!(redeemer.pointer, RedeemerPointer::new(RedeemerTag::Mint, 0));
    }
}
