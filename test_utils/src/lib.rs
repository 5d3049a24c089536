//! Fake collaborators and fixtures for exercising the mint pipeline without
//! a wallet, an evaluator service or a chain.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use minter_codec::{Transaction, VKeyWitness, WitnessSet};
use minter_common::{
    CostModels, EvaluationResult, ExUnits, Language, Lovelace, MintError, Network, NetworkId,
    RedeemerPointer, RedeemerTag, Slot, TxHash, TxOutput, UTxOIdentifier, Utxo, Value,
    collaborators::{ChainParams, Evaluator, MintReceipt, Notifier, Wallet},
    crypto::keyhash_224,
    protocol_params::{ExUnitPrices, ProtocolParams},
    rational_number::RationalNumber,
};
use tokio::sync::Mutex;

/// Always-succeeds PlutusV2 minting policy, as exported by serialisation tooling
pub const FREE_TOKEN_SCRIPT_CBOR: &str = "5830582e010000323222320053333573466e1cd55ce9baa0024800080148c98c8014cd5ce249035054310000500349848005";

/// Verification key the fake wallet signs with
pub const WALLET_VKEY: [u8; 32] = [0x11; 32];

pub fn sample_params() -> ProtocolParams {
    ProtocolParams {
        min_fee_a: 44,
        min_fee_b: 155_381,
        key_deposit: 2_000_000,
        pool_deposit: 500_000_000,
        max_tx_size: 16_384,
        max_value_size: 5_000,
        execution_prices: ExUnitPrices {
            mem_price: RationalNumber::new(577, 10_000),
            step_price: RationalNumber::new(721, 10_000_000),
        },
        coins_per_utxo_byte: 4_310,
        collateral_percentage: 150,
        max_collateral_inputs: 3,
        max_tx_ex_units: ExUnits::new(14_000_000, 10_000_000_000),
        cost_models: CostModels::from([
            (Language::PlutusV1, vec![205_665, 812, 1, 1, 1000, 571]),
            (Language::PlutusV2, vec![205_665, 812, 1, 1, 1000, 571, 0, 1, 1000, 24_177]),
        ]),
    }
}

/// Enterprise address (no stake part) paying to the given key
pub fn enterprise_address(network: NetworkId, vkey: &[u8; 32]) -> Vec<u8> {
    let mut address = vec![0x60 | network.id()];
    address.extend_from_slice(&keyhash_224(vkey).to_vec());
    address
}

pub fn utxo(seed: u8, address: &[u8], coin: Lovelace) -> Utxo {
    Utxo {
        input: UTxOIdentifier::new(TxHash::new([seed; 32]), u64::from(seed % 4)),
        output: TxOutput::new(address.to_vec(), Value::coin(coin)),
    }
}

pub fn mint_result(units: ExUnits) -> EvaluationResult {
    EvaluationResult::from([(RedeemerPointer::new(RedeemerTag::Mint, 0), units)])
}

fn encode_utxos(utxos: &[Utxo]) -> Result<Vec<Vec<u8>>> {
    utxos.iter().map(|utxo| Ok(minicbor::to_vec(utxo)?)).collect()
}

/// In-memory wallet that signs with [`WALLET_VKEY`] and records what it saw
pub struct FakeWallet {
    pub network: NetworkId,
    pub addresses: Vec<Vec<u8>>,
    pub utxos: Vec<Utxo>,
    /// `None` models a wallet without a collateral API
    pub collateral: Option<Vec<Utxo>>,
    /// Fail the collateral call, as a wallet does when the prompt is declined
    pub reject_collateral: bool,
    pub reject_signing: bool,
    pub reject_submission: Option<String>,
    sign_requests: Mutex<Vec<Vec<u8>>>,
    submissions: Mutex<Vec<Vec<u8>>>,
    calls: AtomicUsize,
}

impl FakeWallet {
    pub fn new(network: NetworkId) -> Self {
        Self {
            network,
            addresses: vec![enterprise_address(network, &WALLET_VKEY)],
            utxos: Vec::new(),
            collateral: Some(Vec::new()),
            reject_collateral: false,
            reject_signing: false,
            reject_submission: None,
            sign_requests: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn address(&self) -> &[u8] {
        &self.addresses[0]
    }

    pub fn with_utxos(mut self, coins: &[Lovelace]) -> Self {
        let address = self.address().to_vec();
        self.utxos = coins
            .iter()
            .enumerate()
            .map(|(i, coin)| utxo(i as u8 + 1, &address, *coin))
            .collect();
        self
    }

    pub fn with_collateral(mut self, coins: &[Lovelace]) -> Self {
        let address = self.address().to_vec();
        self.collateral = Some(
            coins
                .iter()
                .enumerate()
                .map(|(i, coin)| utxo(i as u8 + 200, &address, *coin))
                .collect(),
        );
        self
    }

    /// Transactions the wallet was asked to sign
    pub async fn sign_requests(&self) -> Vec<Vec<u8>> {
        self.sign_requests.lock().await.clone()
    }

    /// Transactions the wallet was asked to submit
    pub async fn submissions(&self) -> Vec<Vec<u8>> {
        self.submissions.lock().await.clone()
    }

    /// Number of wallet calls of any kind
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Wallet for FakeWallet {
    async fn network_id(&self) -> Result<NetworkId> {
        self.touch();
        Ok(self.network)
    }

    async fn used_addresses(&self) -> Result<Vec<Vec<u8>>> {
        self.touch();
        Ok(self.addresses.clone())
    }

    async fn reward_addresses(&self) -> Result<Vec<Vec<u8>>> {
        self.touch();
        Ok(Vec::new())
    }

    async fn utxos(&self) -> Result<Vec<Vec<u8>>> {
        self.touch();
        encode_utxos(&self.utxos)
    }

    async fn collateral(&self) -> Result<Option<Vec<Vec<u8>>>> {
        self.touch();
        if self.reject_collateral {
            bail!("user declined collateral");
        }
        self.collateral.as_deref().map(encode_utxos).transpose()
    }

    async fn sign_tx(&self, tx: &[u8], _partial: bool) -> Result<Vec<u8>> {
        self.touch();
        self.sign_requests.lock().await.push(tx.to_vec());
        if self.reject_signing {
            bail!("user declined to sign");
        }
        let tx = Transaction::from_bytes(tx)?;
        let id = tx.id()?;
        let mut signature = [0u8; 64];
        signature[..32].copy_from_slice(&id.to_vec());
        signature[32..].copy_from_slice(&WALLET_VKEY);
        let witnesses = WitnessSet {
            vkeys: vec![VKeyWitness {
                vkey: WALLET_VKEY,
                signature,
            }],
            ..Default::default()
        };
        witnesses.to_bytes()
    }

    async fn submit_tx(&self, tx: &[u8]) -> Result<TxHash> {
        self.touch();
        self.submissions.lock().await.push(tx.to_vec());
        if let Some(reason) = &self.reject_submission {
            bail!("{reason}");
        }
        Transaction::from_bytes(tx)?.id()
    }
}

/// Evaluator returning a canned result and counting calls
pub struct FakeEvaluator {
    result: std::result::Result<EvaluationResult, String>,
    calls: AtomicUsize,
    drafts: Mutex<Vec<Vec<u8>>>,
}

impl FakeEvaluator {
    pub fn returning(result: EvaluationResult) -> Self {
        Self {
            result: Ok(result),
            calls: AtomicUsize::new(0),
            drafts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
            drafts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Draft bytes received, in call order
    pub async fn drafts(&self) -> Vec<Vec<u8>> {
        self.drafts.lock().await.clone()
    }
}

#[async_trait]
impl Evaluator for FakeEvaluator {
    async fn evaluate(&self, draft: &[u8], _network: Network) -> Result<EvaluationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.drafts.lock().await.push(draft.to_vec());
        self.result.clone().map_err(|reason| anyhow!(reason))
    }
}

/// Fixed protocol parameters and tip
pub struct FakeChain {
    pub params: ProtocolParams,
    pub slot: Slot,
    calls: AtomicUsize,
}

impl FakeChain {
    pub fn new(params: ProtocolParams, slot: Slot) -> Self {
        Self {
            params,
            slot,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for FakeChain {
    fn default() -> Self {
        Self::new(sample_params(), 50_000_000)
    }
}

#[async_trait]
impl ChainParams for FakeChain {
    async fn protocol_params(&self, _network: Network) -> Result<ProtocolParams> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.params.clone())
    }

    async fn latest_slot(&self, _network: Network) -> Result<Slot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.slot)
    }
}

/// Notifier that records outcomes and can be told to fail, like a blocked pop-up
#[derive(Default)]
pub struct RecordingNotifier {
    pub blocked: bool,
    successes: Mutex<Vec<MintReceipt>>,
    failures: Mutex<Vec<MintError>>,
}

impl RecordingNotifier {
    pub fn blocked() -> Self {
        Self {
            blocked: true,
            ..Default::default()
        }
    }

    pub async fn successes(&self) -> Vec<MintReceipt> {
        self.successes.lock().await.clone()
    }

    pub async fn failures(&self) -> Vec<MintError> {
        self.failures.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn success(&self, receipt: &MintReceipt) -> Result<()> {
        self.successes.lock().await.push(receipt.clone());
        if self.blocked {
            bail!("pop-up blocked");
        }
        Ok(())
    }

    async fn failure(&self, error: &MintError) -> Result<()> {
        self.failures.lock().await.push(error.clone());
        if self.blocked {
            bail!("pop-up blocked");
        }
        Ok(())
    }
}
