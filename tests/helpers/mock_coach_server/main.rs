//! Mock coaching server binary for integration tests
//!
//! Plays both sides of the flow so the simulator can run end to end
//! without the real backend:
//!
//! - the authorization server: `/health`, `/oauth2/register`, and
//!   `/.well-known/oauth-authorization-server` (advertising `S256`)
//! - the client under test: a callback receiver on `--callback-port` and a
//!   JSON-RPC `/mcp` endpoint whose `tools/list` answer grows from the
//!   single bootstrap tool to 30 tools once a callback has arrived and the
//!   simulated exchange delay has passed
//!
//! A `tools/call` of `connect_to_pierre` blocks until the exchange
//! completes (or 10 seconds pass), like a client waiting on its own
//! browser flow.
//!
//! # Usage
//!
//! ```text
//! mock_coach_server --port 8081 --callback-port 35535 --exchange-delay-ms 200
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde_json::{json, Value};
use tokio::sync::Notify;

use oauth_flow_sim::callback::CallbackReceiver;
use oauth_flow_sim::mcp::types::{JsonRpcRequest, JsonRpcResponse};

const BOOTSTRAP_TOOL: &str = "connect_to_pierre";

const CONNECTED_TOOLS: [&str; 30] = [
    "connect_provider",
    "get_activities",
    "get_athlete",
    "get_stats",
    "get_activity_intelligence",
    "analyze_activity",
    "calculate_metrics",
    "analyze_performance_trends",
    "compare_activities",
    "detect_patterns",
    "set_goal",
    "track_progress",
    "suggest_goals",
    "analyze_goal_feasibility",
    "generate_recommendations",
    "calculate_fitness_score",
    "predict_performance",
    "analyze_training_load",
    "get_connection_status",
    "disconnect_provider",
    "get_configuration_catalog",
    "get_configuration_profiles",
    "get_user_configuration",
    "update_user_configuration",
    "calculate_personalized_zones",
    "validate_configuration",
    "analyze_sleep_quality",
    "calculate_recovery_score",
    "suggest_rest_day",
    "get_notifications",
];

#[derive(Parser, Debug)]
#[command(name = "mock_coach_server")]
struct Args {
    /// HTTP port for the server endpoints
    #[arg(long)]
    port: u16,

    /// Port the callback receiver listens on
    #[arg(long, default_value_t = 35535)]
    callback_port: u16,

    /// Delay between callback and exchange completion
    #[arg(long, default_value_t = 200)]
    exchange_delay_ms: u64,
}

struct AppState {
    base_url: String,
    authenticated: AtomicBool,
    exchanged: Notify,
    registrations: AtomicUsize,
}

impl AppState {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn wait_authenticated(&self, limit: Duration) -> bool {
        if self.is_authenticated() {
            return true;
        }
        let notified = self.exchanged.notified();
        if self.is_authenticated() {
            return true;
        }
        tokio::time::timeout(limit, notified).await.is_ok()
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn metadata(State(state): State<Arc<AppState>>) -> Json<Value> {
    let base = &state.base_url;
    Json(json!({
        "issuer": base,
        "authorization_endpoint": format!("{base}/oauth2/authorize"),
        "token_endpoint": format!("{base}/oauth2/token"),
        "registration_endpoint": format!("{base}/oauth2/register"),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "code_challenge_methods_supported": ["S256"]
    }))
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let n = state.registrations.fetch_add(1, Ordering::SeqCst);
    let client_id = body
        .get("client_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("mock_client_{n}"));

    tracing::info!(client_id = %client_id, "client registered");
    (
        StatusCode::CREATED,
        Json(json!({
            "client_id": client_id,
            "client_secret": body.get("client_secret").cloned().unwrap_or(json!("mock_secret")),
            "redirect_uris": body.get("redirect_uris").cloned().unwrap_or(json!([])),
            "grant_types": ["authorization_code"],
            "response_types": ["code"],
            "scope": body.get("scope").cloned().unwrap_or(json!("fitness:read")),
            "client_id_issued_at": chrono::Utc::now().timestamp()
        })),
    )
}

fn tool(name: &str) -> Value {
    json!({
        "name": name,
        "description": name.replace('_', " "),
        "inputSchema": { "type": "object" }
    })
}

async fn mcp(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    let id = request.id.clone();
    let response = match request.method.as_str() {
        "tools/list" => {
            let tools: Vec<Value> = if state.is_authenticated() {
                CONNECTED_TOOLS.iter().map(|n| tool(n)).collect()
            } else {
                vec![tool(BOOTSTRAP_TOOL)]
            };
            JsonRpcResponse::success(id, json!({ "tools": tools }))
        }
        "tools/call" => {
            let name = request
                .params
                .as_ref()
                .and_then(|p| p.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if name == BOOTSTRAP_TOOL {
                let connected = state.wait_authenticated(Duration::from_secs(10)).await;
                let text = if connected {
                    "Connected"
                } else {
                    "Timed out waiting for authorization"
                };
                JsonRpcResponse::success(
                    id,
                    json!({ "content": [{ "type": "text", "text": text }], "isError": !connected }),
                )
            } else if state.is_authenticated() && CONNECTED_TOOLS.contains(&name.as_str()) {
                JsonRpcResponse::success(id, json!({ "content": [] }))
            } else {
                JsonRpcResponse::failure(id, -32602, format!("Unknown tool: {name}"))
            }
        }
        other => JsonRpcResponse::failure(id, -32601, format!("Method not found: {other}")),
    };
    Json(response)
}

async fn run_callback_listener(state: Arc<AppState>, port: u16, delay: Duration) {
    loop {
        let receiver = match CallbackReceiver::bind(port).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!("callback receiver unavailable: {}", e);
                return;
            }
        };
        match receiver
            .wait_for_callback(None, Duration::from_secs(3600))
            .await
        {
            Ok(callback) => {
                tracing::info!(code = %callback.code, "callback received, exchanging");
                tokio::time::sleep(delay).await;
                state.authenticated.store(true, Ordering::SeqCst);
                state.exchanged.notify_waiters();
                return;
            }
            Err(e) => tracing::warn!("bad callback: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let addr = format!("127.0.0.1:{}", args.port);
    let state = Arc::new(AppState {
        base_url: format!("http://{addr}"),
        authenticated: AtomicBool::new(false),
        exchanged: Notify::new(),
        registrations: AtomicUsize::new(0),
    });

    tokio::spawn(run_callback_listener(
        Arc::clone(&state),
        args.callback_port,
        Duration::from_millis(args.exchange_delay_ms),
    ));

    let app = Router::new()
        .route("/health", get(health))
        .route("/.well-known/oauth-authorization-server", get(metadata))
        .route("/oauth2/register", post(register))
        .route("/mcp", post(mcp))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "mock coach server listening");
    println!("mock_coach_server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
