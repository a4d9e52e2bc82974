use serde::Serialize;

/// Structured trace events emitted across all tableau-mcp crates.
///
/// Never carries secrets: tokens and passwords stay inside the session
/// manager.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    TableauCall {
        endpoint: String,
        status: u16,
        duration_ms: u64,
        attempt: u32,
    },
    SignIn {
        site: String,
        auth_mode: String,
        success: bool,
        duration_ms: u64,
    },
    SignOut {
        site: String,
        success: bool,
    },
    SessionExpired {
        site: String,
        reason: String,
    },
    ToolDispatched {
        tool: String,
        outcome: String,
        duration_ms: u64,
    },
    ResourceRead {
        uri: String,
        outcome: String,
        duration_ms: u64,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "tm_event");
    }
}
