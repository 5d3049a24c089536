//! Protocol parameters and chain tip from the parameter service

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use minter_common::{
    CostModel, CostModels, ExUnits, Language, Lovelace, Network, Slot,
    collaborators::ChainParams,
    protocol_params::{ExUnitPrices, ProtocolParams, default_max_tx_ex_units},
    rational_number::rational_number_over,
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value as Json;
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use tracing::{debug, info};

use crate::{
    configuration::ServiceConfig,
    http::{ServiceError, build_client, endpoint, read_json},
};

/// Memory prices are quoted per unit with four significant decimals
const MEM_PRICE_DENOMINATOR: u64 = 10_000;
/// Step prices are quoted per unit with seven significant decimals
const STEP_PRICE_DENOMINATOR: u64 = 10_000_000;

#[serde_as]
#[derive(Debug, Deserialize)]
struct FeeParamsJson {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    min_fee_a: u64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    min_fee_b: u64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    key_deposit: Lovelace,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pool_deposit: Lovelace,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    max_tx_size: u32,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    max_val_size: u32,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    price_mem: f64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    price_step: f64,
    /// Despite the name, the service reports the per-byte price here
    #[serde(alias = "coins_per_utxo_size")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    coins_per_utxo_word: Lovelace,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    collateral_percent: u32,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    max_collateral_inputs: u32,
    #[serde(default)]
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    max_tx_ex_mem: Option<u64>,
    #[serde(default)]
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    max_tx_ex_steps: Option<u64>,
    #[serde(default)]
    cost_models: serde_json::Map<String, Json>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct LatestBlockJson {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    slot: Slot,
}

fn cost_value(value: &Json) -> Result<i64> {
    match value {
        Json::Number(n) => n.as_i64().with_context(|| format!("Cost {n} is not an integer")),
        Json::String(s) => s.parse().with_context(|| format!("Cost '{s}' is not an integer")),
        other => bail!("Unexpected cost model entry {other}"),
    }
}

/// A cost model arrives either as an array or as an object whose keys are
/// operation names; object entries are taken in document order.
fn parse_cost_model(value: &Json) -> Result<CostModel> {
    match value {
        Json::Array(costs) => costs.iter().map(cost_value).collect(),
        Json::Object(costs) => costs.values().map(cost_value).collect(),
        other => bail!("Unexpected cost model {other}"),
    }
}

impl FeeParamsJson {
    fn into_params(self) -> Result<ProtocolParams> {
        let mut cost_models = CostModels::new();
        for (name, model) in &self.cost_models {
            let Ok(language) = name.parse::<Language>() else {
                debug!("Ignoring cost model for {name}");
                continue;
            };
            let model =
                parse_cost_model(model).with_context(|| format!("Cost model for {name}"))?;
            cost_models.insert(language, model);
        }

        let defaults = default_max_tx_ex_units();
        Ok(ProtocolParams {
            min_fee_a: self.min_fee_a,
            min_fee_b: self.min_fee_b,
            key_deposit: self.key_deposit,
            pool_deposit: self.pool_deposit,
            max_tx_size: self.max_tx_size,
            max_value_size: self.max_val_size,
            execution_prices: ExUnitPrices {
                mem_price: rational_number_over(self.price_mem, MEM_PRICE_DENOMINATOR)
                    .context("price_mem")?,
                step_price: rational_number_over(self.price_step, STEP_PRICE_DENOMINATOR)
                    .context("price_step")?,
            },
            coins_per_utxo_byte: self.coins_per_utxo_word,
            collateral_percentage: self.collateral_percent,
            max_collateral_inputs: self.max_collateral_inputs,
            max_tx_ex_units: ExUnits::new(
                self.max_tx_ex_mem.unwrap_or(defaults.mem),
                self.max_tx_ex_steps.unwrap_or(defaults.steps),
            ),
            cost_models,
        })
    }
}

/// Reads `{url}/getFeeParams/{network}` and `{url}/getLatestBlock/{network}`
pub struct HttpChainParams {
    client: Client,
    url: String,
}

impl HttpChainParams {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(config)?,
            url: config.url.clone(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: String) -> Result<T, ServiceError> {
        let url = endpoint(&self.url, &path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::RequestFailed(url.clone(), e))?;
        read_json(&url, response).await
    }
}

#[async_trait]
impl ChainParams for HttpChainParams {
    async fn protocol_params(&self, network: Network) -> Result<ProtocolParams> {
        let json: FeeParamsJson = self.get(format!("getFeeParams/{}", network.api_id())).await?;
        let params = json.into_params()?;
        info!(
            "Fetched {network} parameters: fee {}/{}, {} cost models",
            params.min_fee_a,
            params.min_fee_b,
            params.cost_models.len()
        );
        Ok(params)
    }

    async fn latest_slot(&self, network: Network) -> Result<Slot> {
        let json: LatestBlockJson =
            self.get(format!("getLatestBlock/{}", network.api_id())).await?;
        debug!("Latest {network} slot {}", json.slot);
        Ok(json.slot)
    }
}
