//! Turns a [`ToolRequest`] into a [`ToolResponse`].
//!
//! Lookup and argument validation happen before any session is opened, so
//! a malformed call never reaches Tableau. Everything after that runs
//! inside one scoped session; every failure is folded into an error
//! response here.

use std::sync::Arc;
use std::time::Instant;

use tm_domain::error::Result;
use tm_domain::tool::{ContentBlock, ToolRequest, ToolResponse};
use tm_domain::trace::TraceEvent;
use tm_sessions::SessionManager;

use crate::args::ToolArgs;
use crate::handlers::{ToolContext, ToolSettings};
use crate::registry::ToolRegistry;
use crate::schema;

#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    sessions: Arc<SessionManager>,
    settings: ToolSettings,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, sessions: Arc<SessionManager>) -> Self {
        Self {
            registry,
            sessions,
            settings: ToolSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ToolSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub async fn dispatch(&self, request: ToolRequest) -> ToolResponse {
        let started = Instant::now();
        let result = self.run(&request).await;

        let outcome = match result {
            Ok(_) => "ok".to_owned(),
            Err(ref e) => e.kind().to_string(),
        };
        TraceEvent::ToolDispatched {
            tool: request.tool_name.clone(),
            outcome,
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        match result {
            Ok(blocks) => ToolResponse::Content(blocks),
            Err(e) => {
                tracing::warn!(tool = %request.tool_name, error = %e, "tool call failed");
                e.into()
            }
        }
    }

    async fn run(&self, request: &ToolRequest) -> Result<Vec<ContentBlock>> {
        let descriptor = self.registry.lookup(&request.tool_name)?;
        let arguments = schema::validate(&descriptor.params, &request.arguments)?;
        let args = ToolArgs::from_arguments(descriptor.name, &arguments)?;
        let handler = descriptor.handler;

        tracing::debug!(tool = descriptor.name, "dispatching");
        self.sessions
            .with_session(|session| {
                handler(
                    ToolContext::new(session, self.settings.clone()),
                    args.clone(),
                )
            })
            .await
    }
}
