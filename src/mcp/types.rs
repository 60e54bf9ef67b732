//! JSON-RPC 2.0 and capability-listing wire types
//!
//! Only the subset of the MCP surface the simulator touches: `tools/list`
//! to observe what a client exposes and `tools/call` to trigger a
//! connection.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Protocol version sent in the `MCP-Protocol-Version` header.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Method listing the available capabilities.
pub const METHOD_TOOLS_LIST: &str = "tools/list";

/// Method invoking one capability.
pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// Capability that exists only once a provider connection is complete.
pub const CONNECT_PROVIDER: &str = "connect_provider";

/// Capability expected from a fully connected client.
pub const GET_ACTIVITIES: &str = "get_activities";

// ---------------------------------------------------------------------------
// JSON-RPC 2.0
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request object.
///
/// # Examples
///
/// ```
/// use oauth_flow_sim::mcp::types::JsonRpcRequest;
///
/// let req = JsonRpcRequest::new(1, "tools/list", None);
/// assert_eq!(req.jsonrpc, "2.0");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Request correlation identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    /// Method name.
    pub method: String,
    /// Optional parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    /// Builds a request with a numeric id.
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(serde_json::json!(id)),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Mirrors the request id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    /// Successful result; mutually exclusive with `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error object; mutually exclusive with `result`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// A success response.
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// An error response.
    pub fn failure(id: Option<serde_json::Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// A JSON-RPC 2.0 error object.
///
/// Displays as `"JSON-RPC error {code}: {message}"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable description.
    pub message: String,
    /// Optional additional context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// One advertised capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    /// Unique name within the client.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the input.
    #[serde(rename = "inputSchema", default)]
    pub input_schema: serde_json::Value,
}

impl McpTool {
    /// A tool with only a name and an empty object schema.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: serde_json::json!({ "type": "object" }),
        }
    }
}

/// Result of `tools/list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// Advertised tools.
    #[serde(default)]
    pub tools: Vec<McpTool>,
}

/// Parameters of `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Tool to invoke.
    pub name: String,
    /// Tool arguments.
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// A point-in-time view of the capabilities a client exposes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilitySnapshot {
    tools: Vec<McpTool>,
}

impl CapabilitySnapshot {
    /// Wraps a list of tools.
    pub fn new(tools: Vec<McpTool>) -> Self {
        Self { tools }
    }

    /// Builds a snapshot from bare names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names.into_iter().map(McpTool::named).collect())
    }

    /// Number of capabilities.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether nothing is exposed.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Whether a capability named `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }

    /// Capability names in listing order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// The underlying tools.
    pub fn tools(&self) -> &[McpTool] {
        &self.tools
    }
}

impl From<ListToolsResult> for CapabilitySnapshot {
    fn from(result: ListToolsResult) -> Self {
        Self::new(result.tools)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_without_empty_params() {
        let req = JsonRpcRequest::new(7, METHOD_TOOLS_LIST, None);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 7);
        assert_eq!(json["method"], "tools/list");
        assert!(json.get("params").is_none());
    }

    #[test]
    fn test_json_rpc_error_display() {
        let e = JsonRpcError {
            code: -32601,
            message: "Method not found".to_string(),
            data: None,
        };
        assert_eq!(e.to_string(), "JSON-RPC error -32601: Method not found");
    }

    #[test]
    fn test_tool_deserializes_camel_case_schema() {
        let tool: McpTool = serde_json::from_value(serde_json::json!({
            "name": "get_activities",
            "inputSchema": { "type": "object", "properties": {} }
        }))
        .unwrap();
        assert_eq!(tool.name, "get_activities");
        assert_eq!(tool.input_schema["type"], "object");
    }

    #[test]
    fn test_tool_without_schema_defaults_to_null() {
        let tool: McpTool = serde_json::from_value(serde_json::json!({ "name": "x" })).unwrap();
        assert!(tool.input_schema.is_null());
    }

    #[test]
    fn test_snapshot_queries() {
        let snapshot = CapabilitySnapshot::from_names([CONNECT_PROVIDER, GET_ACTIVITIES]);
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.is_empty());
        assert!(snapshot.contains(CONNECT_PROVIDER));
        assert!(!snapshot.contains("missing"));
        assert_eq!(snapshot.names(), vec!["connect_provider", "get_activities"]);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = CapabilitySnapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.len(), 0);
    }
}
