//! Ledger and node clients against a mock JSON-RPC daemon.

use serde_json::{json, Value};

use tx_relay::blockchain::{BitcoinNode, Broadcaster, NodeError};
use tx_relay::config::{LedgerConfig, NodeConfig};
use tx_relay::ledger::asset::{parse_numeric_asset_name, NUMERIC_ASSET_MIN};
use tx_relay::ledger::{
    ComposeFailure, CounterpartyClient, DividendParams, LedgerError, SendParams, TransactionComposer,
};
use tx_relay::resilience::RetryPolicy;
use tx_relay::rpc::RpcError;

mod common;

use common::{rpc_result, MockRpc};

const UNSIGNED: &str = "0100000001abcdef";

fn ledger(mock: &MockRpc) -> CounterpartyClient {
    let config = LedgerConfig {
        rpc_url: mock.url(),
        rpc_timeout_secs: 5,
        ..LedgerConfig::default()
    };
    CounterpartyClient::new(&config, RetryPolicy::none())
}

fn node(mock: &MockRpc) -> BitcoinNode {
    let config = NodeConfig {
        rpc_url: mock.url(),
        rpc_timeout_secs: 5,
        ..NodeConfig::default()
    };
    BitcoinNode::new(&config, RetryPolicy::none())
}

fn send_params() -> SendParams {
    SendParams {
        source: "mkpZhYtJu2r87Js3pDiWJDmPte2NRZ8bJV".to_string(),
        destination: "mvd6qFeVkqH6MNAS2Y2cLifbdaX5XUkbZJ".to_string(),
        asset: "XCP".to_string(),
        quantity: 250,
        pubkey: "0330d54fd0dd420a6e5f8d3624f5f3482cae350f79d5f0753bf5beef9c2d91af3c".to_string(),
    }
}

#[tokio::test]
async fn test_compose_send_payload() {
    let mock = common::start_rpc_backend(|_| rpc_result(json!(UNSIGNED))).await;

    let unsigned = ledger(&mock).compose_send(&send_params()).await.unwrap();
    assert_eq!(unsigned, UNSIGNED);

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request["jsonrpc"], "2.0");
    assert_eq!(request["method"], "create_send");
    assert_eq!(request["params"]["source"], "mkpZhYtJu2r87Js3pDiWJDmPte2NRZ8bJV");
    assert_eq!(request["params"]["destination"], "mvd6qFeVkqH6MNAS2Y2cLifbdaX5XUkbZJ");
    assert_eq!(request["params"]["quantity"], 250);
    assert_eq!(request["params"]["allow_unconfirmed_inputs"], true);
}

#[tokio::test]
async fn test_non_200_body_is_kept_verbatim() {
    let mock = common::start_rpc_backend(|_| (503, "ledger is catching up".to_string())).await;

    let err = ledger(&mock).compose_send(&send_params()).await.unwrap_err();
    match &err {
        LedgerError::Rpc(RpcError::Http { status, body }) => {
            assert_eq!(*status, 503);
            assert_eq!(body, "ledger is catching up");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.failure(), ComposeFailure::Other);
}

#[tokio::test]
async fn test_remote_error_is_classified() {
    let mock = common::start_rpc_backend(|_| {
        (
            200,
            json!({
                "result": null,
                "error": {"code": -32000, "message": "Server error", "data": "no such asset: FOO"},
                "id": 0,
            })
            .to_string(),
        )
    })
    .await;

    let err = ledger(&mock).compose_send(&send_params()).await.unwrap_err();
    assert_eq!(err.failure(), ComposeFailure::NoSuchAsset);
    assert!(err.to_string().contains("no such asset: FOO"));
}

#[tokio::test]
async fn test_empty_transaction_is_rejected() {
    let mock = common::start_rpc_backend(|_| rpc_result(json!(""))).await;

    let err = ledger(&mock).compose_send(&send_params()).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_missing_destination_never_reaches_daemon() {
    let mock = common::start_rpc_backend(|_| rpc_result(json!(UNSIGNED))).await;

    let params = SendParams {
        destination: " ".to_string(),
        ..send_params()
    };
    let err = ledger(&mock).compose_send(&params).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidRequest(_)));
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn test_numeric_issuance_uses_generated_name() {
    let mock = common::start_rpc_backend(|_| rpc_result(json!(UNSIGNED))).await;

    let long_description = "d".repeat(80);
    let (asset, unsigned) = ledger(&mock)
        .compose_numeric_issuance("mkpZhYtJu2r87Js3pDiWJDmPte2NRZ8bJV", &long_description, 1_000, true, "02ab")
        .await
        .unwrap();
    assert_eq!(unsigned, UNSIGNED);

    let value = parse_numeric_asset_name(&asset).unwrap();
    assert!(value >= NUMERIC_ASSET_MIN);

    let requests = mock.requests();
    let params = &requests[0]["params"];
    assert_eq!(requests[0]["method"], "create_issuance");
    assert_eq!(params["asset"], Value::String(asset));
    assert_eq!(params["divisible"], true);
    assert_eq!(params["transfer_destination"], Value::Null);
    assert_eq!(params["description"].as_str().unwrap().len(), 52);
}

#[tokio::test]
async fn test_compose_dividend_payload() {
    let mock = common::start_rpc_backend(|_| rpc_result(json!(UNSIGNED))).await;

    let params = DividendParams {
        source: "mkpZhYtJu2r87Js3pDiWJDmPte2NRZ8bJV".to_string(),
        asset: "A100000000000000001".to_string(),
        dividend_asset: "XCP".to_string(),
        quantity_per_unit: 3,
        pubkey: "02ab".to_string(),
    };
    ledger(&mock).compose_dividend(&params).await.unwrap();

    let requests = mock.requests();
    assert_eq!(requests[0]["method"], "create_dividend");
    assert_eq!(requests[0]["params"]["dividend_asset"], "XCP");
    assert_eq!(requests[0]["params"]["quantity_per_unit"], 3);
}

#[tokio::test]
async fn test_balance_and_issuance_filters() {
    let mock = common::start_rpc_backend(|request| match request["method"].as_str() {
        Some("get_balances") => rpc_result(json!([
            {"address": "mkpZhYtJu2r87Js3pDiWJDmPte2NRZ8bJV", "asset": "XCP", "quantity": 5}
        ])),
        Some("get_issuances") => rpc_result(json!([{
            "tx_index": 12, "tx_hash": "aa", "block_index": 300, "asset": "A100000000000000001",
            "quantity": 10, "divisible": true, "source": "mk", "issuer": "mk",
            "description": "", "locked": false, "status": "valid"
        }])),
        _ => (404, "unknown".to_string()),
    })
    .await;
    let client = ledger(&mock);

    let balances = client.get_balances("mkpZhYtJu2r87Js3pDiWJDmPte2NRZ8bJV").await.unwrap();
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].quantity, 5);

    let issuances = client.get_issuances("A100000000000000001").await.unwrap();
    assert_eq!(issuances[0].tx_index, 12);

    let requests = mock.requests();
    assert_eq!(
        requests[0]["params"]["filters"][0],
        json!({"field": "address", "op": "==", "value": "mkpZhYtJu2r87Js3pDiWJDmPte2NRZ8bJV"})
    );
    assert_eq!(
        requests[1]["params"]["filters"][1],
        json!({"field": "status", "op": "==", "value": "valid"})
    );
    assert_eq!(requests[1]["params"]["order_by"], "tx_index");
}

#[tokio::test]
async fn test_running_info_lag() {
    let mock = common::start_rpc_backend(|_| {
        rpc_result(json!({
            "db_caught_up": true,
            "bitcoin_block_count": 310,
            "last_block": {"block_index": 307, "block_hash": "00ab", "block_time": 1_700_000_000},
            "running_testnet": true,
        }))
    })
    .await;

    let info = ledger(&mock).get_running_info().await.unwrap();
    assert!(info.db_caught_up);
    assert_eq!(info.block_lag(), Some(3));
}

#[tokio::test]
async fn test_node_queries_use_v1_envelope() {
    let mock = common::start_rpc_backend(|request| match request["method"].as_str() {
        Some("getblockcount") => rpc_result(json!(2_500_000)),
        Some("getbalance") => rpc_result(json!(0.0005)),
        Some("getnewaddress") => rpc_result(json!("mvd6qFeVkqH6MNAS2Y2cLifbdaX5XUkbZJ")),
        _ => (404, "unknown".to_string()),
    })
    .await;
    let node = node(&mock);

    assert_eq!(node.get_block_count().await.unwrap(), 2_500_000);
    assert_eq!(node.get_balance().await.unwrap().to_sat(), 50_000);
    assert_eq!(node.get_new_address().await.unwrap(), "mvd6qFeVkqH6MNAS2Y2cLifbdaX5XUkbZJ");

    let requests = mock.requests();
    assert!(requests.iter().all(|r| r["jsonrpc"] == "1.0"));
    assert_eq!(requests[0]["params"], json!([]));
}

#[tokio::test]
async fn test_rejected_broadcast() {
    let mock = common::start_rpc_backend(|_| {
        (
            200,
            json!({"result": null, "error": {"code": -26, "message": "bad-txns-inputs-missingorspent"}, "id": 0})
                .to_string(),
        )
    })
    .await;

    let signed = common::unsigned_from(common::TEST_MNEMONIC, 0);
    let err = node(&mock).broadcast(&signed).await.unwrap_err();
    match err {
        NodeError::Broadcast(message) => assert_eq!(message, "bad-txns-inputs-missingorspent"),
        other => panic!("unexpected error: {other:?}"),
    }

    let requests = mock.requests();
    assert_eq!(requests[0]["method"], "sendrawtransaction");
    assert_eq!(requests[0]["params"][0], Value::String(signed));
}

#[tokio::test]
async fn test_rejected_broadcast_with_http_500() {
    let mock = common::start_rpc_backend(|_| {
        (
            500,
            json!({"result": null, "error": {"code": -26, "message": "min relay fee not met"}, "id": 0}).to_string(),
        )
    })
    .await;

    let signed = common::unsigned_from(common::TEST_MNEMONIC, 0);
    let err = node(&mock).broadcast(&signed).await.unwrap_err();
    match err {
        NodeError::Broadcast(reason) => assert_eq!(reason, "min relay fee not met"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_http_failure_without_envelope_stays_rpc_error() {
    let mock = common::start_rpc_backend(|_| (401, "Unauthorized".to_string())).await;

    let signed = common::unsigned_from(common::TEST_MNEMONIC, 0);
    let err = node(&mock).broadcast(&signed).await.unwrap_err();
    assert!(matches!(err, NodeError::Rpc(RpcError::Http { status: 401, .. })));
}
