//! Capability listing over JSON-RPC
//!
//! - [`types`]  -- JSON-RPC 2.0 envelopes and the capability snapshot
//! - [`client`] -- the [`CapabilityClient`] trait and its HTTP implementation
//! - [`fake`]   -- a scripted client for tests

pub mod client;
pub mod fake;
pub mod types;

pub use client::{CapabilityClient, HttpCapabilityClient};
pub use fake::FakeCapabilityClient;
pub use types::{CapabilitySnapshot, McpTool};
