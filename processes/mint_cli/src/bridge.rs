//! Wallet reached through a local HTTP bridge to a CIP-30 browser wallet.
//! Byte payloads travel as hex strings.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use minter_codec::decode_hex;
use minter_common::{NetworkId, TxHash, collaborators::Wallet};
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct NetworkIdJson {
    network_id: u8,
}

#[derive(Debug, Serialize)]
struct SignRequest<'a> {
    tx: &'a str,
    partial: bool,
}

#[derive(Debug, Deserialize)]
struct SignResponse {
    witness_set: String,
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    tx: &'a str,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    tx_hash: String,
}

pub struct BridgeWallet {
    client: Client,
    url: String,
}

impl BridgeWallet {
    /// `timeout` bounds every call, signing included, so it must leave the
    /// user time to approve in the wallet
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to initialize HTTP client")?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }

    async fn read<T: DeserializeOwned>(&self, path: &str, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await.with_context(|| format!("Bridge {path}"))?;
        if !status.is_success() {
            bail!("Bridge {path} failed with {status}: {body}");
        }
        serde_json::from_str(&body).with_context(|| format!("Unexpected bridge {path} response"))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}/{path}", self.url))
            .send()
            .await
            .with_context(|| format!("Bridge {path}"))?;
        self.read(path, response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .post(format!("{}/{path}", self.url))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Bridge {path}"))?;
        self.read(path, response).await
    }

    async fn get_bytes_list(&self, path: &str) -> Result<Vec<Vec<u8>>> {
        let list: Vec<String> = self.get(path).await?;
        list.iter().map(|item| decode_hex(item)).collect()
    }
}

#[async_trait]
impl Wallet for BridgeWallet {
    async fn network_id(&self) -> Result<NetworkId> {
        let json: NetworkIdJson = self.get("network-id").await?;
        NetworkId::try_from(json.network_id)
    }

    async fn used_addresses(&self) -> Result<Vec<Vec<u8>>> {
        self.get_bytes_list("used-addresses").await
    }

    async fn reward_addresses(&self) -> Result<Vec<Vec<u8>>> {
        self.get_bytes_list("reward-addresses").await
    }

    async fn utxos(&self) -> Result<Vec<Vec<u8>>> {
        self.get_bytes_list("utxos").await
    }

    async fn collateral(&self) -> Result<Option<Vec<Vec<u8>>>> {
        let list: Option<Vec<String>> = self.get("collateral").await?;
        list.map(|items| items.iter().map(|item| decode_hex(item)).collect())
            .transpose()
    }

    async fn sign_tx(&self, tx: &[u8], partial: bool) -> Result<Vec<u8>> {
        let tx = hex::encode(tx);
        debug!("Asking wallet to sign {} bytes", tx.len() / 2);
        let response: SignResponse =
            self.post("sign-tx", &SignRequest { tx: &tx, partial }).await?;
        decode_hex(&response.witness_set)
    }

    async fn submit_tx(&self, tx: &[u8]) -> Result<TxHash> {
        let tx = hex::encode(tx);
        let response: SubmitResponse = self.post("submit-tx", &SubmitRequest { tx: &tx }).await?;
        response.tx_hash.parse().context("Wallet returned a malformed transaction hash")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn wallet(server: &MockServer) -> BridgeWallet {
        BridgeWallet::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn reads_network_and_utxos() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/network-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"network_id": 0})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/utxos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(["8200", "ab"])))
            .mount(&server)
            .await;

        let wallet = wallet(&server).await;
        assert_eq!(wallet.network_id().await.unwrap(), NetworkId::Testnet);
        assert_eq!(wallet.utxos().await.unwrap(), vec![vec![0x82, 0x00], vec![0xab]]);
    }

    #[tokio::test]
    async fn null_collateral_means_unsupported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/collateral"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::Value::Null))
            .mount(&server)
            .await;

        assert_eq!(wallet(&server).await.collateral().await.unwrap(), None);
    }

    #[tokio::test]
    async fn sign_sends_hex_and_partial_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sign-tx"))
            .and(body_json(serde_json::json!({"tx": "84a0a0f5f6", "partial": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"witness_set": "a0"})))
            .mount(&server)
            .await;

        let witnesses = wallet(&server)
            .await
            .sign_tx(&[0x84, 0xa0, 0xa0, 0xf5, 0xf6], true)
            .await
            .unwrap();
        assert_eq!(witnesses, vec![0xa0]);
    }

    #[tokio::test]
    async fn user_rejection_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sign-tx"))
            .respond_with(ResponseTemplate::new(403).set_body_string("user declined"))
            .mount(&server)
            .await;

        let err = wallet(&server).await.sign_tx(&[0x80], false).await.unwrap_err();
        assert!(err.to_string().contains("user declined"));
    }
}
