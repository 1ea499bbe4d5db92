//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bitcoin::absolute::LockTime;
use bitcoin::hashes::Hash;
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use tx_relay::blockchain::signer::{decode_transaction, encode_transaction};
use tx_relay::blockchain::types::NodeResult;
use tx_relay::blockchain::{Broadcaster, KeyDeriver, Passphrase, TransactionSigner};
use tx_relay::config::{Environment, SelfCheckMode, WalletSelection};
use tx_relay::coordination::{
    AddressLockTable, Collaborators, Coordinator, CoordinatorSettings, CustodialWallet, StaticWalletPool,
};
use tx_relay::ledger::{DividendParams, IssuanceParams, LedgerError, LedgerResult, SendParams, TransactionComposer};
use tx_relay::persistence::{MemoryStore, OperationStore};
use tx_relay::rpc::RpcError;

pub const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const CUSTODIAL_MNEMONIC: &str =
    "legal winner thank year wave sausage worth useful legal winner thank yellow";

// ---------------------------------------------------------------------------
// Mock JSON-RPC daemon
// ---------------------------------------------------------------------------

/// A JSON-RPC daemon on a loopback port that records every request body.
pub struct MockRpc {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<Value>>>,
}

impl MockRpc {
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a programmable JSON-RPC backend. `handler` receives the decoded
/// request envelope and returns the HTTP status and body.
pub async fn start_rpc_backend<F>(handler: F) -> MockRpc
where
    F: Fn(&Value) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);

    let recorded = Arc::clone(&requests);
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let handler = Arc::clone(&handler);
                    let recorded = Arc::clone(&recorded);
                    tokio::spawn(async move {
                        let body = match read_request_body(&mut socket).await {
                            Some(body) => body,
                            None => return,
                        };
                        let envelope: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
                        recorded.lock().unwrap().push(envelope.clone());

                        let (status, body) = handler(&envelope);
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            401 => "401 Unauthorized",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockRpc { addr, requests }
}

/// JSON-RPC success envelope.
pub fn rpc_result(result: Value) -> (u16, String) {
    (200, serde_json::json!({"result": result, "error": null, "id": 0}).to_string())
}

async fn read_request_body(socket: &mut TcpStream) -> Option<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Some(buf[header_end..].to_vec())
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Addresses derived from `mnemonic` on testnet, in index order.
pub fn addresses(mnemonic: &str, count: u32) -> Vec<String> {
    KeyDeriver::new(bitcoin::Network::Testnet)
        .derive_wallet(&Passphrase::new(mnemonic), count)
        .unwrap()
        .keys
        .into_iter()
        .map(|k| k.address)
        .collect()
}

/// Unsigned one-input transaction spending from the P2PKH address at
/// `index` of `mnemonic`, in the composer's wire format.
pub fn unsigned_from(mnemonic: &str, index: u32) -> String {
    let wallet = KeyDeriver::new(bitcoin::Network::Testnet)
        .derive_wallet(&Passphrase::new(mnemonic), index + 1)
        .unwrap();
    let key = &wallet.keys[index as usize];
    unsigned_with_script(ScriptBuf::new_p2pkh(&key.keys.public_key.pubkey_hash()))
}

/// Unsigned transaction whose input carries a P2SH locking script.
pub fn unsigned_p2sh() -> String {
    let hash = bitcoin::ScriptHash::from_byte_array([7u8; 20]);
    unsigned_with_script(ScriptBuf::new_p2sh(&hash))
}

fn unsigned_with_script(locking: ScriptBuf) -> String {
    let tx = Transaction {
        version: Version::ONE,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint {
                txid: Txid::from_byte_array([9u8; 32]),
                vout: 0,
            },
            script_sig: locking.clone(),
            sequence: Sequence::MAX,
            witness: Witness::default(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(5_430),
            script_pubkey: locking,
        }],
    };
    encode_transaction(&tx)
}

// ---------------------------------------------------------------------------
// Stub collaborators
// ---------------------------------------------------------------------------

/// One observed composition.
#[derive(Debug, Clone)]
pub struct ComposeCall {
    pub source: String,
    pub started: Instant,
    pub finished: Instant,
}

/// Composer that returns canned transactions per source address.
#[derive(Default)]
pub struct StubComposer {
    unsigned: HashMap<String, String>,
    delay: Duration,
    failures_left: AtomicUsize,
    failure_message: String,
    calls: Mutex<Vec<ComposeCall>>,
}

impl StubComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `unsigned_hex` for compositions from `source`.
    pub fn with_unsigned(mut self, source: &str, unsigned_hex: String) -> Self {
        self.unsigned.insert(source.to_string(), unsigned_hex);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next `count` compositions with a remote `message`.
    pub fn failing(mut self, count: usize, message: &str) -> Self {
        self.failures_left = AtomicUsize::new(count);
        self.failure_message = message.to_string();
        self
    }

    pub fn calls(&self) -> Vec<ComposeCall> {
        self.calls.lock().unwrap().clone()
    }

    async fn compose(&self, source: &str) -> LedgerResult<String> {
        let started = Instant::now();
        tokio::time::sleep(self.delay).await;
        let result = self.outcome(source);
        self.calls.lock().unwrap().push(ComposeCall {
            source: source.to_string(),
            started,
            finished: Instant::now(),
        });
        result
    }

    fn outcome(&self, source: &str) -> LedgerResult<String> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LedgerError::Rpc(RpcError::Remote {
                code: Some(-32000),
                message: self.failure_message.clone(),
            }));
        }
        self.unsigned
            .get(source)
            .cloned()
            .ok_or_else(|| LedgerError::InvalidRequest(format!("no canned transaction for {}", source)))
    }
}

#[async_trait]
impl TransactionComposer for StubComposer {
    async fn compose_send(&self, params: &SendParams) -> LedgerResult<String> {
        self.compose(&params.source).await
    }

    async fn compose_issuance(&self, params: &IssuanceParams) -> LedgerResult<String> {
        self.compose(&params.source).await
    }

    async fn compose_dividend(&self, params: &DividendParams) -> LedgerResult<String> {
        self.compose(&params.source).await
    }
}

/// Broadcaster that counts calls and returns the transaction id.
#[derive(Default)]
pub struct StubBroadcaster {
    calls: AtomicUsize,
}

impl StubBroadcaster {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Broadcaster for StubBroadcaster {
    async fn broadcast(&self, signed_hex: &str) -> NodeResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tx = decode_transaction(signed_hex).unwrap();
        Ok(tx.compute_txid().to_string())
    }
}

// ---------------------------------------------------------------------------
// Coordinator harness
// ---------------------------------------------------------------------------

/// A coordinator on an in-memory store with no propagation delay.
pub struct Harness {
    pub coordinator: Arc<Coordinator>,
    pub store: Arc<dyn OperationStore>,
}

pub fn harness(
    composer: Arc<dyn TransactionComposer>,
    broadcaster: Arc<dyn Broadcaster>,
    environment: Environment,
) -> Harness {
    let deriver = Arc::new(KeyDeriver::new(bitcoin::Network::Testnet));
    let signer = Arc::new(TransactionSigner::new(Arc::clone(&deriver), SelfCheckMode::AllInputs));
    let store: Arc<dyn OperationStore> = Arc::new(MemoryStore::new());
    let custodial = CustodialWallet {
        address: addresses(CUSTODIAL_MNEMONIC, 1).remove(0),
        passphrase: Passphrase::new(CUSTODIAL_MNEMONIC),
    };

    let coordinator = Coordinator::new(
        Collaborators {
            deriver,
            signer,
            composer,
            broadcaster,
            store: Arc::clone(&store),
            locks: Arc::new(AddressLockTable::new()),
            wallets: Arc::new(StaticWalletPool::new(vec![custodial], WalletSelection::RoundRobin, 0)),
        },
        CoordinatorSettings {
            environment,
            propagation_delay: Duration::ZERO,
            step_timeout: Duration::from_secs(10),
        },
    );

    Harness {
        coordinator: Arc::new(coordinator),
        store,
    }
}

/// Await `future` with a generous deadline so a hung saga fails the test.
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(30), future)
        .await
        .expect("operation did not finish in time")
}
