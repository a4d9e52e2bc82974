//! `tm-tableau` — Tableau Server REST client for tableau-mcp.
//!
//! Provides the [`TableauApi`] trait that abstracts over the REST surface
//! the tools need, a production implementation ([`RestTableauClient`]),
//! typed DTOs for the JSON responses, and an in-memory [`MockTableau`]
//! for tests.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use tm_domain::config::{ProcessEnv, TableauConfig};
//! use tm_tableau::{RestTableauClient, TableauApi};
//!
//! # async fn example() -> tm_domain::error::Result<()> {
//! let cfg = TableauConfig::from_env(&ProcessEnv)?;
//! let client = RestTableauClient::new(&cfg)?;
//!
//! let auth = client.sign_in(&cfg.credentials).await?;
//! let workbooks = client.list_workbooks(&auth).await?;
//! println!("{} workbooks", workbooks.len());
//! client.sign_out(&auth).await?;
//! # Ok(())
//! # }
//! ```

pub mod mock;
pub mod provider;
pub mod rest;
pub mod types;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use mock::MockTableau;
pub use provider::TableauApi;
pub use rest::{from_reqwest, RestTableauClient, FALLBACK_API_VERSION};
pub use types::{
    AuthToken, Capability, Datasource, Grantee, GranteeCapabilities, Group, GroupDomain, IdRef,
    Project, Site, User, View, ViewUsage, Workbook,
};

use std::sync::Arc;

use tm_domain::config::TableauConfig;
use tm_domain::error::Result;

/// Build the production [`TableauApi`] for a resolved config.
pub fn create_client(cfg: &TableauConfig) -> Result<Arc<dyn TableauApi>> {
    let client = RestTableauClient::new(cfg)?;
    tracing::info!(
        server = %cfg.credentials.server_url,
        site = cfg.credentials.site_label(),
        api_version = cfg.api_version.as_deref().unwrap_or("probe"),
        "Tableau REST client ready"
    );
    Ok(Arc::new(client))
}
