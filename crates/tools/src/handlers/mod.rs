//! Tool bodies: each one performs a single logical unit of work against
//! the live session and reshapes the result into content blocks.

pub mod admin;
pub mod archive;
pub mod content;
pub mod format;

use tm_domain::config::TableauConfig;
use tm_sessions::SessionContext;
use tm_tableau::{AuthToken, TableauApi};

/// Handler tunables taken from the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    /// Downloads larger than this are summarised but not attached.
    pub max_download_bytes: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            max_download_bytes: 25 * 1024 * 1024,
        }
    }
}

impl ToolSettings {
    pub fn from_config(cfg: &TableauConfig) -> Self {
        Self {
            max_download_bytes: cfg.max_download_bytes,
        }
    }
}

/// Everything a handler may use.
#[derive(Debug, Clone)]
pub struct ToolContext {
    session: SessionContext,
    settings: ToolSettings,
}

impl ToolContext {
    pub fn new(session: SessionContext, settings: ToolSettings) -> Self {
        Self { session, settings }
    }

    pub fn api(&self) -> &dyn TableauApi {
        self.session.api()
    }

    pub fn auth(&self) -> &AuthToken {
        self.session.auth()
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }
}
