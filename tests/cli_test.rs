#![allow(deprecated)]

//! Command-line tests for the `oauth-flow-sim` binary
//!
//! Run the built binary through `assert_cmd` and check exit status and
//! output.

use assert_cmd::Command;
use predicates::prelude::*;

use oauth_flow_sim::auth::token::TokenGenerator;

mod common;

const SIM_ENV: [&str; 8] = [
    "OAUTH_SIM_JWT_SECRET",
    "OAUTH_SIM_SERVER_URL",
    "OAUTH_SIM_HOST",
    "OAUTH_SIM_PORT",
    "OAUTH_SIM_CALLBACK_PORT",
    "OAUTH_SIM_EXCHANGE_TIMEOUT_MS",
    "OAUTH_SIM_POLL_INTERVAL_MS",
    "RUST_LOG",
];

fn sim() -> Command {
    let mut cmd = Command::cargo_bin("oauth-flow-sim").unwrap();
    for var in SIM_ENV {
        cmd.env_remove(var);
    }
    cmd.arg("--config").arg("/nonexistent/oauth-sim.yaml");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    sim()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("simulate"))
        .stdout(predicate::str::contains("token"))
        .stdout(predicate::str::contains("pkce"))
        .stdout(predicate::str::contains("listen"));
}

#[test]
fn test_pkce_prints_json() {
    let output = sim().arg("pkce").output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["method"], "S256");
    assert_eq!(value["verifier"].as_str().unwrap().len(), 43);
    assert_eq!(value["challenge"].as_str().unwrap().len(), 43);
    assert_eq!(value["state"].as_str().unwrap().len(), 32);
}

#[test]
fn test_token_is_signed_with_env_secret() {
    let output = sim()
        .env("OAUTH_SIM_JWT_SECRET", "cli-test-secret")
        .args(["token", "--subject", "athlete-7", "--email", "a7@example.com", "--ttl", "120"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let raw = String::from_utf8(output.stdout).unwrap();
    let claims = TokenGenerator::new("cli-test-secret")
        .verify(raw.trim())
        .expect("token must verify with the env secret");
    assert_eq!(claims.sub, "athlete-7");
    assert_eq!(claims.email, "a7@example.com");
    assert_eq!(claims.exp - claims.iat, 120);

    assert!(TokenGenerator::new("other").verify(raw.trim()).is_err());
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_temp_dir, config_path) =
        common::temp_config_file("exchange:\n  timeout_ms: 0\n");

    let mut cmd = Command::cargo_bin("oauth-flow-sim").unwrap();
    for var in SIM_ENV {
        cmd.env_remove(var);
    }
    cmd.arg("--config").arg(config_path).arg("pkce");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("exchange.timeout_ms must be greater than 0"));
}

#[test]
fn test_simulate_fails_when_server_unreachable() {
    let port = common::unused_port();
    sim()
        .args([
            "simulate",
            "--server-url",
            &format!("http://127.0.0.1:{port}"),
            "--no-discovery",
        ])
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .failure();
}

#[test]
fn test_listen_times_out_without_callback() {
    sim()
        .args(["listen", "--port", "0", "--timeout-ms", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no callback received"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_simulate_passes_against_mock_server() {
    let mock = common::start_mock_coach(100).await;
    let server_url = mock.base_url.as_str().trim_end_matches('/').to_string();
    let callback_port = mock.callback_port.to_string();

    let (temp_dir, config_path) = common::temp_config_file(&format!(
        "callback:\n  host: 127.0.0.1\n  port: {callback_port}\n"
    ));

    let output = tokio::task::spawn_blocking(move || {
        let mut cmd = Command::cargo_bin("oauth-flow-sim").unwrap();
        for var in SIM_ENV {
            cmd.env_remove(var);
        }
        cmd.arg("--config")
            .arg(&config_path)
            .args(["simulate", "--server-url", &server_url, "--trigger-tool", "connect_to_pierre"])
            .timeout(std::time::Duration::from_secs(30));
        let output = cmd.output().unwrap();
        drop(temp_dir);
        output
    })
    .await
    .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}");
    assert!(stdout.contains("result:            PASSED"));
    assert!(stdout.contains("capability count:  30"));
    assert!(stdout.contains("client_id:         test_simulator_"));

    mock.process.shutdown().await.unwrap();
}
