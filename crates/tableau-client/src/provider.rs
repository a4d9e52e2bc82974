//! The `TableauApi` trait defines the REST surface the tools need. It is
//! implemented by the real HTTP client and by the in-memory test double.

use async_trait::async_trait;
use tm_domain::config::Credentials;
use tm_domain::error::Result;

use crate::types::{
    AuthToken, Datasource, GranteeCapabilities, Group, Project, Site, User, View, Workbook,
};

/// Abstraction over the Tableau Server REST API.
///
/// Every call except [`sign_in`](TableauApi::sign_in) takes the token of
/// the current session. A call made with a token the server no longer
/// accepts fails with `Error::SessionExpired`; the session manager
/// recovers from that. List methods return every page.
#[async_trait]
pub trait TableauApi: Send + Sync {
    /// One authentication attempt (POST /auth/signin). Never retried.
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthToken>;

    /// Invalidate the token (POST /auth/signout).
    async fn sign_out(&self, auth: &AuthToken) -> Result<()>;

    // ── workbooks & views ────────────────────────────────────────────

    /// GET /sites/{site}/workbooks
    async fn list_workbooks(&self, auth: &AuthToken) -> Result<Vec<Workbook>>;

    /// GET /sites/{site}/workbooks/{id}
    async fn get_workbook(&self, auth: &AuthToken, workbook_id: &str) -> Result<Workbook>;

    /// GET /sites/{site}/workbooks/{id}/views, optionally with usage counts.
    async fn list_workbook_views(
        &self,
        auth: &AuthToken,
        workbook_id: &str,
        include_usage: bool,
    ) -> Result<Vec<View>>;

    /// GET /sites/{site}/views
    async fn list_views(&self, auth: &AuthToken) -> Result<Vec<View>>;

    /// GET /sites/{site}/views/{id}
    async fn get_view(&self, auth: &AuthToken, view_id: &str) -> Result<View>;

    /// GET /sites/{site}/views/{id}/data, the underlying data as CSV.
    async fn view_csv(&self, auth: &AuthToken, view_id: &str) -> Result<String>;

    /// GET /sites/{site}/views/{id}/image, a PNG rendering.
    async fn view_image(&self, auth: &AuthToken, view_id: &str) -> Result<Vec<u8>>;

    // ── data sources ─────────────────────────────────────────────────

    async fn list_datasources(&self, auth: &AuthToken) -> Result<Vec<Datasource>>;

    async fn get_datasource(&self, auth: &AuthToken, datasource_id: &str) -> Result<Datasource>;

    /// GET /sites/{site}/datasources/{id}/content, the packaged `.tdsx`.
    async fn download_datasource(
        &self,
        auth: &AuthToken,
        datasource_id: &str,
        include_extract: bool,
    ) -> Result<Vec<u8>>;

    // ── permissions ──────────────────────────────────────────────────

    async fn workbook_permissions(
        &self,
        auth: &AuthToken,
        workbook_id: &str,
    ) -> Result<Vec<GranteeCapabilities>>;

    async fn project_permissions(
        &self,
        auth: &AuthToken,
        project_id: &str,
    ) -> Result<Vec<GranteeCapabilities>>;

    // ── users, groups, projects, site ────────────────────────────────

    async fn list_users(&self, auth: &AuthToken) -> Result<Vec<User>>;

    async fn get_user(&self, auth: &AuthToken, user_id: &str) -> Result<User>;

    async fn list_groups(&self, auth: &AuthToken) -> Result<Vec<Group>>;

    /// GET /sites/{site}/groups/{id}/users
    async fn list_group_users(&self, auth: &AuthToken, group_id: &str) -> Result<Vec<User>>;

    /// GET /sites/{site}/users/{id}/groups
    async fn list_user_groups(&self, auth: &AuthToken, user_id: &str) -> Result<Vec<Group>>;

    async fn list_projects(&self, auth: &AuthToken) -> Result<Vec<Project>>;

    /// GET /sites/{site}, the site the token is scoped to.
    async fn get_site(&self, auth: &AuthToken) -> Result<Site>;
}
