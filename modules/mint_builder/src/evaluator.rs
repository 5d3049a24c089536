//! HTTP client for the remote execution unit evaluator

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use minter_common::{
    EvaluationResult, ExUnits, Network, RedeemerPointer, collaborators::Evaluator,
};
use reqwest::{Client, header};
use serde::Deserialize;
use serde_with::{DisplayFromStr, PickFirst, serde_as};
use tracing::{debug, info};

use crate::{
    configuration::ServiceConfig,
    http::{ServiceError, build_client, endpoint, read_json},
};

#[serde_as]
#[derive(Debug, Deserialize)]
struct UnitsJson {
    #[serde(alias = "mem")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    memory: u64,
    #[serde(alias = "cpu")]
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    steps: u64,
}

#[derive(Debug, Deserialize)]
enum Outcome {
    EvaluationResult(BTreeMap<String, UnitsJson>),
    EvaluationFailure(serde_json::Value),
}

/// Either `{"result": {"EvaluationResult": {...}}}` or a bare pointer map
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EvaluationResponse {
    Wrapped { result: Outcome },
    Flat(BTreeMap<String, UnitsJson>),
}

impl EvaluationResponse {
    fn into_result(self) -> Result<EvaluationResult> {
        let entries = match self {
            EvaluationResponse::Wrapped {
                result: Outcome::EvaluationResult(entries),
            }
            | EvaluationResponse::Flat(entries) => entries,
            EvaluationResponse::Wrapped {
                result: Outcome::EvaluationFailure(failure),
            } => return Err(anyhow!("Script evaluation failed: {failure}")),
        };

        entries
            .into_iter()
            .map(|(key, units)| -> Result<(RedeemerPointer, ExUnits)> {
                let pointer: RedeemerPointer =
                    key.parse().with_context(|| format!("Bad redeemer pointer '{key}'"))?;
                Ok((pointer, ExUnits::new(units.memory, units.steps)))
            })
            .collect()
    }
}

/// Posts the hex encoded draft to `{url}/getExUnitEval/{network}`
pub struct HttpEvaluator {
    client: Client,
    url: String,
}

impl HttpEvaluator {
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            client: build_client(config)?,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl Evaluator for HttpEvaluator {
    async fn evaluate(&self, draft: &[u8], network: Network) -> Result<EvaluationResult> {
        let url = endpoint(&self.url, &format!("getExUnitEval/{}", network.api_id()));
        info!("Evaluating {} byte draft at {url}", draft.len());

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(hex::encode(draft))
            .send()
            .await
            .map_err(|e| ServiceError::RequestFailed(url.clone(), e))?;
        let response: EvaluationResponse = read_json(&url, response).await?;
        let result = response.into_result()?;
        debug!("Evaluation result: {result:?}");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minter_common::RedeemerTag;
    use wiremock::matchers::{body_string, header as header_is, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mint0() -> RedeemerPointer {
        RedeemerPointer::new(RedeemerTag::Mint, 0)
    }

    async fn evaluator(server: &MockServer) -> HttpEvaluator {
        HttpEvaluator::new(&ServiceConfig::new(server.uri())).unwrap()
    }

    #[tokio::test]
    async fn posts_hex_draft_and_reads_wrapped_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/getExUnitEval/2"))
            .and(header_is("content-type", "application/json"))
            .and(body_string("84a0a0f5f6"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {"EvaluationResult": {"mint:0": {"memory": 1700, "steps": 476468}}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = evaluator(&server)
            .await
            .evaluate(&[0x84, 0xa0, 0xa0, 0xf5, 0xf6], Network::Preprod)
            .await
            .unwrap();
        assert_eq!(result.get(&mint0()), Some(&ExUnits::new(1700, 476468)));
    }

    #[tokio::test]
    async fn reads_flat_result_with_string_numbers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/getExUnitEval/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "mint:0": {"mem": "2000", "cpu": "500000"}
            })))
            .mount(&server)
            .await;

        let result = evaluator(&server).await.evaluate(&[0x80], Network::Mainnet).await.unwrap();
        assert_eq!(result.get(&mint0()), Some(&ExUnits::new(2000, 500000)));
    }

    #[tokio::test]
    async fn evaluation_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {"EvaluationFailure": {"ScriptFailures": {"mint:0": ["validator crashed"]}}}
            })))
            .mount(&server)
            .await;

        let err = evaluator(&server).await.evaluate(&[0x80], Network::Preview).await.unwrap_err();
        assert!(err.to_string().contains("validator crashed"));
    }

    #[tokio::test]
    async fn http_error_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = evaluator(&server).await.evaluate(&[0x80], Network::Preview).await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("500"));
        assert!(text.contains("overloaded"));
    }
}
