//! End-to-end tests for the flow simulator
//!
//! The happy-path tests run against the `mock_coach_server` helper binary,
//! which plays both the authorization server and the client under test.
//! The rest use `wiremock` for the server and an in-process receiver or
//! fake client for the other side.

mod common;

use std::sync::Arc;
use std::time::Duration;

use oauth_flow_sim::callback::dispatcher::callback_url;
use oauth_flow_sim::callback::{CallbackReceiver, DispatchOutcome};
use oauth_flow_sim::flow::poller::PollerConfig;
use oauth_flow_sim::flow::simulator::{OAuthFlowSimulator, SimulatorOptions};
use oauth_flow_sim::flow::state::FlowState;
use oauth_flow_sim::mcp::client::{CapabilityClient, HttpCapabilityClient};
use oauth_flow_sim::mcp::fake::FakeCapabilityClient;
use oauth_flow_sim::mcp::types::CapabilitySnapshot;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::start_mock_coach;

fn is_lower_hex(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

fn full_set() -> CapabilitySnapshot {
    let mut names = vec!["connect_provider".to_string(), "get_activities".to_string()];
    names.extend((0..28).map(|i| format!("tool_{i}")));
    CapabilitySnapshot::from_names(names)
}

async fn mount_registration(server: &MockServer, client_id: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth2/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "client_id": client_id,
            "client_secret": "secret"
        })))
        .mount(server)
        .await;
}

// ---------------------------------------------------------------------------
// Against mock_coach_server
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_full_flow_against_mock_server() {
    let mock = start_mock_coach(200).await;

    let client =
        HttpCapabilityClient::new(HttpCapabilityClient::endpoint_for(&mock.base_url).unwrap())
            .unwrap();
    let before = client.list_capabilities().await.unwrap();
    assert_eq!(before.names(), vec!["connect_to_pierre"]);

    let options = SimulatorOptions::new(mock.base_url.clone())
        .unwrap()
        .with_callback_url(callback_url("127.0.0.1", mock.callback_port).unwrap());
    let simulator = OAuthFlowSimulator::new(options, Arc::new(client)).unwrap();

    let report = simulator.run().await.expect("flow should run");

    assert!(report.client_id.starts_with("test_simulator_"));
    assert_eq!(report.callback, DispatchOutcome::Delivered { status: 200 });
    assert!(report.poll.completed);
    assert!(report.poll.attempts <= 2, "attempts = {}", report.poll.attempts);
    assert!(
        report.poll.elapsed <= Duration::from_millis(1_000),
        "elapsed = {:?}",
        report.poll.elapsed
    );
    assert_eq!(report.poll.last_count, Some(30));
    assert!(report.verification.has_connect_provider);
    assert!(report.verification.has_get_activities);
    assert_eq!(report.verification.count, 30);
    assert!(report.verification.count_ok);
    assert!(report.passed());
    assert_eq!(
        report.states,
        vec![
            FlowState::Idle,
            FlowState::ClientRegistered,
            FlowState::ChallengeGenerated,
            FlowState::CodeIssued,
            FlowState::CallbackDelivered,
            FlowState::ExchangePending,
            FlowState::ExchangeComplete,
        ]
    );

    mock.process.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_trigger_call_does_not_block_flow() {
    let mock = start_mock_coach(100).await;

    let client =
        HttpCapabilityClient::new(HttpCapabilityClient::endpoint_for(&mock.base_url).unwrap())
            .unwrap()
            .with_timeout(Duration::from_secs(15));
    let options = SimulatorOptions::new(mock.base_url.clone())
        .unwrap()
        .with_callback_url(callback_url("127.0.0.1", mock.callback_port).unwrap())
        .with_trigger("connect_to_pierre", json!({ "provider": "strava" }));
    let simulator = OAuthFlowSimulator::new(options, Arc::new(client)).unwrap();

    // The trigger blocks inside the mock until the callback lands. If the
    // simulator awaited it, this would hang for the mock's 10s limit.
    let report = tokio::time::timeout(Duration::from_secs(5), simulator.run())
        .await
        .expect("flow must not wait on the trigger")
        .unwrap();
    assert!(report.passed());

    mock.process.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_flow_times_out_when_callback_goes_elsewhere() {
    let mock = start_mock_coach(0).await;

    let client =
        HttpCapabilityClient::new(HttpCapabilityClient::endpoint_for(&mock.base_url).unwrap())
            .unwrap();
    let options = SimulatorOptions::new(mock.base_url.clone())
        .unwrap()
        .with_callback_url(callback_url("127.0.0.1", common::unused_port()).unwrap())
        .with_poller(PollerConfig {
            timeout: Duration::from_millis(600),
            interval: Duration::from_millis(100),
            ..PollerConfig::default()
        });
    let simulator = OAuthFlowSimulator::new(options, Arc::new(client)).unwrap();

    let report = simulator.run().await.unwrap();
    assert_eq!(report.callback, DispatchOutcome::ReceiverUnavailable);
    assert!(!report.poll.completed);
    assert_eq!(report.final_state(), FlowState::TimedOut);
    assert!(!report.verification.passed());
    assert_eq!(report.verification.count, 1);
    assert!(!report.passed());

    mock.process.shutdown().await.unwrap();
}

// ---------------------------------------------------------------------------
// Against wiremock
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_callback_carries_hex_code_and_state() {
    let server = MockServer::start().await;
    mount_registration(&server, "test_simulator_1700000000000").await;

    let receiver = CallbackReceiver::bind(0).await.unwrap();
    let options = SimulatorOptions::new(Url::parse(&server.uri()).unwrap())
        .unwrap()
        .with_callback_url(receiver.callback_url().unwrap());
    let waiter = tokio::spawn(async move {
        receiver
            .wait_for_callback(None, Duration::from_secs(5))
            .await
    });

    let fake = Arc::new(FakeCapabilityClient::new().then_snapshot(full_set()));
    let report = OAuthFlowSimulator::new(options, fake)
        .unwrap()
        .run()
        .await
        .unwrap();

    let callback = waiter.await.unwrap().unwrap();
    assert_eq!(callback.code.len(), 32);
    assert!(is_lower_hex(&callback.code));
    assert_eq!(callback.state.len(), 32);
    assert!(is_lower_hex(&callback.state));

    assert_eq!(report.client_id, "test_simulator_1700000000000");
    assert_eq!(report.callback, DispatchOutcome::Delivered { status: 200 });

    let params: std::collections::HashMap<String, String> =
        report.authorization_url.query_pairs().into_owned().collect();
    assert_eq!(params["state"], callback.state);
    assert_eq!(params["code_challenge_method"], "S256");
    assert_eq!(params["code_challenge"].len(), 43);
}

#[tokio::test]
async fn test_registration_500_aborts_before_pkce() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/register"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .expect(1)
        .mount(&server)
        .await;

    let receiver = CallbackReceiver::bind(0).await.unwrap();
    let options = SimulatorOptions::new(Url::parse(&server.uri()).unwrap())
        .unwrap()
        .with_callback_url(receiver.callback_url().unwrap())
        .with_trigger("connect_to_pierre", json!({}));

    let fake = Arc::new(FakeCapabilityClient::new().then_snapshot(full_set()));
    let err = OAuthFlowSimulator::new(options, fake.clone())
        .unwrap()
        .run()
        .await
        .expect_err("registration failure must abort");
    assert!(err.to_string().contains("500"), "got: {err}");

    // Nothing after registration ran.
    assert_eq!(fake.list_calls(), 0);
    assert!(fake.tool_calls().await.is_empty());
    assert!(receiver
        .wait_for_callback(None, Duration::from_millis(200))
        .await
        .is_err());
}
