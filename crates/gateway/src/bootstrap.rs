//! Component wiring shared by `serve` and `check`.

use std::sync::Arc;

use tm_domain::config::TableauConfig;
use tm_mcp::McpServer;
use tm_sessions::SessionManager;
use tm_tableau::TableauApi;
use tm_tools::{Dispatcher, ResourceProvider, ToolRegistry, ToolSettings};

/// Everything a running server owns.
pub struct App {
    pub sessions: Arc<SessionManager>,
    pub server: McpServer,
}

/// Build the app around the production REST client.
pub fn build(cfg: &TableauConfig) -> anyhow::Result<App> {
    let api = tm_tableau::create_client(cfg)?;
    Ok(build_with_api(cfg, api))
}

/// Build the app around any [`TableauApi`].
pub fn build_with_api(cfg: &TableauConfig, api: Arc<dyn TableauApi>) -> App {
    let sessions = Arc::new(
        SessionManager::new(api, cfg.credentials.clone()).with_timeout(cfg.request_timeout),
    );

    let registry = ToolRegistry::global();
    tracing::info!(tools = registry.len(), "tool registry ready");

    let dispatcher = Dispatcher::new(registry, sessions.clone())
        .with_settings(ToolSettings::from_config(cfg));
    let resources = ResourceProvider::new(sessions.clone());

    App {
        sessions,
        server: McpServer::new(dispatcher, resources),
    }
}
