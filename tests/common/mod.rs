use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use oauth_flow_sim::server::{wait_until_healthy, ServerProcess};
use tempfile::TempDir;
use url::Url;

/// A port that was free a moment ago.
#[allow(dead_code)]
pub fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("failed to bind probe port");
    listener
        .local_addr()
        .expect("failed to read probe address")
        .port()
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("oauth-sim.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Path to the `mock_coach_server` binary built alongside the tests.
#[allow(dead_code)]
pub fn mock_server_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mock_coach_server"))
}

/// A running mock server and the ports it uses.
#[allow(dead_code)]
pub struct MockCoach {
    pub process: ServerProcess,
    pub base_url: Url,
    pub callback_port: u16,
}

/// Starts `mock_coach_server` on fresh ports and waits for `/health`.
#[allow(dead_code)]
pub async fn start_mock_coach(exchange_delay_ms: u64) -> MockCoach {
    let port = unused_port();
    let callback_port = unused_port();
    let args = vec![
        "--port".to_string(),
        port.to_string(),
        "--callback-port".to_string(),
        callback_port.to_string(),
        "--exchange-delay-ms".to_string(),
        exchange_delay_ms.to_string(),
    ];
    let process = ServerProcess::spawn(mock_server_binary(), &args, &HashMap::new())
        .expect("failed to spawn mock_coach_server");

    let base_url = Url::parse(&format!("http://127.0.0.1:{port}")).expect("valid base url");
    wait_until_healthy(&base_url, Duration::from_secs(10), Duration::from_millis(50))
        .await
        .expect("mock_coach_server did not become healthy");

    // The callback listener is spawned alongside the router; give it a beat.
    tokio::time::sleep(Duration::from_millis(50)).await;

    MockCoach {
        process,
        base_url,
        callback_port,
    }
}
