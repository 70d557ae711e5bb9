use std::time::Duration;

use client::{Error, HttpProver, SpendRequest};
use primitives::Amount;
use serde_json::json;
use testutil::{address, prove_server::MockProveServer, TestPool};

fn http_prover(server: &MockProveServer, timeout: Duration) -> HttpProver {
    HttpProver::new(&server.url(), timeout)
}

#[tokio::test]
async fn spends_through_the_prove_server() {
    let server = MockProveServer::start().unwrap();
    server.prove_requests();

    let pool = TestPool::default();
    let alice = address(1);
    pool.fund(alice, Amount::new(40));
    pool.gate.approve(address(2));

    let wallet = pool.wallet(alice, http_prover(&server, Duration::from_secs(10)));
    wallet.deposit(Amount::new(40)).await.unwrap();
    wallet.transfer(address(2), Amount::new(15)).await.unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);

    let request = requests[0].as_object().unwrap();
    assert_eq!(request.len(), 31);
    assert_eq!(request["in_leaf_index_1"], json!("0"));
    assert_eq!(request["in_is_dummy_2"], json!("1"));
    assert_eq!(request["in_path_1"].as_array().unwrap().len(), 20);
    assert_eq!(wallet.balance().unwrap(), Amount::new(25));
}

#[tokio::test]
async fn server_errors_keep_the_spend_retryable() {
    let server = MockProveServer::start().unwrap();
    server.respond_with(500, json!({ "error": "nargo execute failed" }));

    let pool = TestPool::default();
    let alice = address(1);
    pool.fund(alice, Amount::new(40));

    let wallet = pool.wallet(alice, http_prover(&server, Duration::from_secs(10)));
    wallet.deposit(Amount::new(40)).await.unwrap();

    let request = SpendRequest::transfer(address(2), Amount::new(15));
    let err = wallet.spend(request).await.unwrap_err();
    assert!(
        matches!(err, Error::Prover(ref msg) if msg == "nargo execute failed"),
        "{err}"
    );
    assert_eq!(wallet.store().staged(request.intent).unwrap().len(), 2);

    server.prove_requests();
    wallet.spend(request).await.unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    for key in ["out_commitment_1", "out_commitment_2", "out_secret_1", "out_secret_2"] {
        assert_eq!(requests[0][key], requests[1][key], "{key}");
    }
}

#[tokio::test]
async fn slow_servers_time_out() {
    let server = MockProveServer::start().unwrap();
    server.prove_requests();
    server.delay(Duration::from_secs(5));

    let pool = TestPool::default();
    let alice = address(1);
    pool.fund(alice, Amount::new(40));

    let wallet = pool.wallet(alice, http_prover(&server, Duration::from_millis(200)));
    wallet.deposit(Amount::new(40)).await.unwrap();

    let err = wallet
        .transfer(address(2), Amount::new(15))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProverTimeout(_)), "{err}");
}

#[tokio::test]
async fn short_public_inputs_are_malformed() {
    let server = MockProveServer::start().unwrap();
    server.respond_with(
        200,
        json!({ "proof": "0x00", "publicInputs": vec!["0x00"; 8] }),
    );

    let pool = TestPool::default();
    let alice = address(1);
    pool.fund(alice, Amount::new(40));

    let wallet = pool.wallet(alice, http_prover(&server, Duration::from_secs(10)));
    wallet.deposit(Amount::new(40)).await.unwrap();

    let err = wallet
        .transfer(address(2), Amount::new(15))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MalformedProverResponse(_)), "{err}");
}
