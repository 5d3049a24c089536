use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use config::Config;
use minter_common::{
    ExUnits, Language, Lovelace, Network, NetworkId, PlutusScript, TargetNetwork,
};
use serde::Deserialize;

use crate::{
    selector::{CollateralRange, InputSelection},
    witness::{DatumStrategy, EmptyConstr, MintingPolicy, RequiredSignerList},
};

/// Mint builder configuration (from TOML).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MintConfig {
    pub network: Network,
    #[serde(default)]
    pub wallet_network: Option<WalletNetwork>,
    #[serde(default)]
    pub collateral: CollateralConfig,
    #[serde(default = "defaults::ttl_horizon")]
    pub ttl_horizon: u64,
    #[serde(default)]
    pub input_selection: InputSelection,
    #[serde(default)]
    pub partial_sign: bool,
    /// Execution budget assumed for each redeemer while sizing the draft fee.
    /// Defaults to the protocol's per-transaction maximum.
    #[serde(default)]
    pub draft_ex_units: Option<ExUnits>,
    pub evaluator: ServiceConfig,
    pub parameters: ServiceConfig,
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
}

impl MintConfig {
    pub fn try_load(config: &Config) -> Result<Self> {
        let full = Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config.default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config.clone())
            .build()?;
        Ok(full.try_deserialize()?)
    }

    /// Network the wallet is required to report
    pub fn target_network(&self) -> TargetNetwork {
        match self.wallet_network {
            None => TargetNetwork::from(self.network),
            Some(WalletNetwork::Any) => TargetNetwork::Any,
            Some(WalletNetwork::Mainnet) => TargetNetwork::Exact(NetworkId::Mainnet),
            Some(WalletNetwork::Testnet) => TargetNetwork::Exact(NetworkId::Testnet),
        }
    }

    pub fn collateral_range(&self) -> CollateralRange {
        CollateralRange::new(self.collateral.min, self.collateral.max)
    }

    /// Look up a configured policy by name
    pub fn policy(&self, name: &str) -> Result<MintingPolicy> {
        self.policies
            .iter()
            .find(|policy| policy.name == name)
            .ok_or_else(|| {
                let known: Vec<&str> = self.policies.iter().map(|p| p.name.as_str()).collect();
                anyhow!("Unknown policy '{name}', configured: {}", known.join(", "))
            })?
            .to_policy()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WalletNetwork {
    Any,
    Mainnet,
    Testnet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CollateralConfig {
    #[serde(default = "defaults::collateral_min")]
    pub min: Lovelace,
    #[serde(default = "defaults::collateral_max")]
    pub max: Lovelace,
}

impl Default for CollateralConfig {
    fn default() -> Self {
        Self {
            min: defaults::collateral_min(),
            max: defaults::collateral_max(),
        }
    }
}

/// HTTP service endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServiceConfig {
    pub url: String,
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
    #[serde(default = "defaults::connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl ServiceConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: defaults::timeout(),
            connect_timeout_secs: defaults::connect_timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatumShape {
    /// `Constr 0 []`
    EmptyConstr,
    /// `Constr 0 [[signer key hashes]]`, with the signers also required on the body
    RequiredSigners,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolicyConfig {
    pub name: String,
    pub language: Language,
    pub datum: DatumShape,
    /// Script as exported by serialisation tooling: hex of a CBOR byte string
    pub script_cbor: String,
}

impl PolicyConfig {
    pub fn to_policy(&self) -> Result<MintingPolicy> {
        let cbor = hex::decode(self.script_cbor.trim())
            .with_context(|| format!("Policy '{}' script is not hex", self.name))?;
        let script = PlutusScript::from_cbor(self.language, &cbor)
            .with_context(|| format!("Policy '{}' script", self.name))?;
        let datum: Arc<dyn DatumStrategy> = match self.datum {
            DatumShape::EmptyConstr => Arc::new(EmptyConstr),
            DatumShape::RequiredSigners => Arc::new(RequiredSignerList),
        };
        Ok(MintingPolicy::new(self.name.clone(), script, datum))
    }
}

mod defaults {
    pub fn ttl_horizon() -> u64 {
        500
    }
    pub fn collateral_min() -> u64 {
        3_000_000
    }
    pub fn collateral_max() -> u64 {
        6_000_000
    }
    pub fn timeout() -> u64 {
        60
    }
    pub fn connect_timeout() -> u64 {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(user: &str) -> MintConfig {
        let config = Config::builder()
            .add_source(config::File::from_str(user, config::FileFormat::Toml))
            .build()
            .unwrap();
        MintConfig::try_load(&config).unwrap()
    }

    #[test]
    fn defaults_apply_without_user_settings() {
        let config = load("");
        assert_eq!(config.network, Network::Preprod);
        assert_eq!(config.ttl_horizon, 500);
        assert_eq!(config.input_selection, InputSelection::All);
        assert_eq!(config.collateral_range(), CollateralRange::new(3_000_000, 6_000_000));
        assert_eq!(config.target_network(), TargetNetwork::Exact(NetworkId::Testnet));
        assert!(!config.partial_sign);
        assert_eq!(config.draft_ex_units, Some(ExUnits::new(1_500_000, 600_000_000)));
    }

    #[test]
    fn user_settings_override_defaults() {
        let config = load(
            r#"
            network = "mainnet"
            wallet-network = "any"
            input-selection = "largest-first"
            ttl-horizon = 900

            [collateral]
            min = 5000000
            max = 8000000

            [draft-ex-units]
            mem = 1000000
            steps = 500000000
            "#,
        );
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.target_network(), TargetNetwork::Any);
        assert_eq!(config.input_selection, InputSelection::LargestFirst);
        assert_eq!(config.ttl_horizon, 900);
        assert_eq!(config.collateral_range(), CollateralRange::new(5_000_000, 8_000_000));
        assert_eq!(config.draft_ex_units, Some(ExUnits::new(1_000_000, 500_000_000)));
    }

    #[test]
    fn builtin_policies_decode() {
        let config = load("");
        let free = config.policy("free-token").unwrap();
        assert_eq!(free.script.language, Language::PlutusV2);
        assert_eq!(free.script.bytes.len(), 48);

        let signed = config.policy("signed-token").unwrap();
        assert_ne!(signed.id(), free.id());
    }

    #[test]
    fn unknown_policy_lists_known_names() {
        let err = load("").policy("nope").unwrap_err();
        assert!(err.to_string().contains("free-token"));
    }
}
