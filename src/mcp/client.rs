//! Capability clients
//!
//! [`CapabilityClient`] is the seam between the flow logic and whatever
//! answers `tools/list`. [`HttpCapabilityClient`] speaks JSON-RPC 2.0 over
//! a plain HTTP POST, one request per call, no session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::{Result, SimError};
use crate::mcp::types::{
    CallToolParams, CapabilitySnapshot, JsonRpcRequest, JsonRpcResponse, ListToolsResult,
    METHOD_TOOLS_CALL, METHOD_TOOLS_LIST, PROTOCOL_VERSION,
};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Path of the JSON-RPC endpoint relative to the server base URL.
pub const MCP_PATH: &str = "/mcp";

/// Something that can report and invoke capabilities.
#[async_trait]
pub trait CapabilityClient: Send + Sync {
    /// Issues `tools/list` and returns the current snapshot.
    async fn list_capabilities(&self) -> Result<CapabilitySnapshot>;

    /// Issues `tools/call` for `name` and returns the raw result value.
    async fn call_tool(&self, name: &str, arguments: serde_json::Value)
        -> Result<serde_json::Value>;
}

/// JSON-RPC over HTTP POST.
///
/// # Examples
///
/// ```no_run
/// use oauth_flow_sim::mcp::client::{CapabilityClient, HttpCapabilityClient};
/// use url::Url;
///
/// # async fn demo() -> oauth_flow_sim::error::Result<()> {
/// let client = HttpCapabilityClient::new(Url::parse("http://localhost:8081/mcp")?)?
///     .with_bearer_token("eyJ...");
/// let snapshot = client.list_capabilities().await?;
/// println!("{} tools", snapshot.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpCapabilityClient {
    http: Arc<reqwest::Client>,
    endpoint: Url,
    bearer_token: Option<String>,
    timeout: Duration,
    next_id: Arc<AtomicU64>,
}

impl HttpCapabilityClient {
    /// Creates a client for `endpoint` with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::McpTransport`] if the HTTP client cannot be built.
    pub fn new(endpoint: Url) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| SimError::McpTransport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(Arc::new(http), endpoint))
    }

    /// Creates a client sharing an existing `reqwest::Client`.
    pub fn with_http_client(http: Arc<reqwest::Client>, endpoint: Url) -> Self {
        Self {
            http,
            endpoint,
            bearer_token: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Endpoint derived from a server base URL: `{base}/mcp`.
    pub fn endpoint_for(base: &Url) -> Result<Url> {
        Ok(base.join(MCP_PATH)?)
    }

    /// Attaches `Authorization: Bearer {token}` to every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Overrides the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The JSON-RPC endpoint.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = JsonRpcRequest::new(id, method, params);

        let mut req = self
            .http
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .header("MCP-Protocol-Version", PROTOCOL_VERSION)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body);
        if let Some(token) = &self.bearer_token {
            req = req.bearer_auth(token);
        }

        tracing::debug!(method, id, endpoint = %self.endpoint, "Sending JSON-RPC request");

        let resp = req
            .send()
            .await
            .map_err(|e| SimError::McpTransport(format!("{method} request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SimError::McpTransport(format!(
                "{method} returned HTTP {}: {text}",
                status.as_u16()
            ))
            .into());
        }

        let response: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| SimError::McpTransport(format!("invalid JSON-RPC response: {e}")))?;

        if let Some(err) = response.error {
            return Err(SimError::Mcp(err.to_string()).into());
        }

        Ok(response.result.unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl CapabilityClient for HttpCapabilityClient {
    async fn list_capabilities(&self) -> Result<CapabilitySnapshot> {
        let result = self.request(METHOD_TOOLS_LIST, None).await?;
        let listed: ListToolsResult = serde_json::from_value(result)?;
        tracing::debug!(count = listed.tools.len(), "tools/list answered");
        Ok(listed.into())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        self.request(METHOD_TOOLS_CALL, Some(serde_json::to_value(params)?))
            .await
    }
}
