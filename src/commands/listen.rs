//! `listen` command handler

use std::time::Duration;

use serde::Serialize;

use crate::callback::CallbackReceiver;
use crate::error::Result;

#[derive(Debug, Serialize)]
struct ListenOutput {
    code: String,
    state: String,
}

/// Waits for one callback on `port` and returns it as JSON.
pub async fn run_listen(port: u16, state: Option<String>, timeout_ms: u64) -> Result<String> {
    let receiver = CallbackReceiver::bind(port).await?;
    tracing::info!(url = %receiver.callback_url()?, "Waiting for OAuth callback");

    let callback = receiver
        .wait_for_callback(state.as_deref(), Duration::from_millis(timeout_ms))
        .await?;

    Ok(serde_json::to_string(&ListenOutput {
        code: callback.code,
        state: callback.state,
    })?)
}
