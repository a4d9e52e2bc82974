//! Data Transfer Objects for the subset of the Tableau REST API we call.
//!
//! Requests are sent with `Accept: application/json`, so field names are
//! `camelCase` on the wire and `snake_case` in Rust. Tableau encodes many
//! numbers (sizes, quotas, counts) as strings; those go through
//! [`lenient`] so either form parses.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Authentication
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The opaque handle returned by a successful sign-in.
///
/// Owned by the session manager and lent to handlers for the duration
/// of one dispatch.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub token: String,
    /// Site LUID used in `/sites/{id}/...` paths.
    pub site_id: String,
    pub site_content_url: String,
    pub user_id: String,
    pub api_version: String,
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"<redacted>")
            .field("site_id", &self.site_id)
            .field("site_content_url", &self.site_content_url)
            .field("user_id", &self.user_id)
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Response body of `POST /auth/signin`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SignInResponse {
    pub credentials: SignInCredentials,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SignInCredentials {
    pub token: String,
    pub site: SiteRef,
    pub user: IdRef,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SiteRef {
    pub id: String,
    #[serde(default)]
    pub content_url: String,
}

/// Response body of `GET /serverinfo`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerInfoResponse {
    pub server_info: ServerInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServerInfo {
    pub rest_api_version: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Shared references
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `{ "id": "..." }`, optionally with a name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl IdRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Content
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workbook {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    /// Size in megabytes, as reported by Tableau.
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub size: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub project: Option<IdRef>,
    #[serde(default)]
    pub owner: Option<IdRef>,
}

impl Workbook {
    pub fn project_name(&self) -> &str {
        self.project
            .as_ref()
            .and_then(|p| p.name.as_deref())
            .unwrap_or("Unknown")
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner.as_ref().map(|o| o.id.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub workbook: Option<IdRef>,
    #[serde(default)]
    pub owner: Option<IdRef>,
    #[serde(default)]
    pub project: Option<IdRef>,
    /// Present only when requested with `includeUsageStatistics=true`.
    #[serde(default)]
    pub usage: Option<ViewUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewUsage {
    #[serde(default, deserialize_with = "lenient::u64_or_zero")]
    pub total_view_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datasource {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content_url: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub size: Option<u64>,
    #[serde(default)]
    pub has_extracts: Option<bool>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub project: Option<IdRef>,
    #[serde(default)]
    pub owner: Option<IdRef>,
}

impl Datasource {
    pub fn project_name(&self) -> &str {
        self.project
            .as_ref()
            .and_then(|p| p.name.as_deref())
            .unwrap_or("Unknown")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content_permissions: Option<String>,
    #[serde(default)]
    pub parent_project_id: Option<String>,
    #[serde(default)]
    pub owner: Option<IdRef>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Users, groups, sites
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub site_role: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub domain: Option<GroupDomain>,
}

impl Group {
    pub fn domain_name(&self) -> Option<&str> {
        self.domain.as_ref().map(|d| d.name.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDomain {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content_url: String,
    #[serde(default)]
    pub admin_mode: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// Storage quota in megabytes.
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub storage_quota: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub user_quota: Option<u64>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Permissions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Grantee {
    User(String),
    Group(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    /// `Allow` or `Deny`.
    pub mode: String,
}

/// The capabilities granted to one user or group on one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GranteeCapabilities {
    pub grantee: Grantee,
    pub capabilities: Vec<Capability>,
}

/// Response body of `GET /.../permissions`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PermissionsResponse {
    pub permissions: RawPermissions,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawPermissions {
    #[serde(default)]
    pub grantee_capabilities: Vec<RawGranteeCapabilities>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawGranteeCapabilities {
    #[serde(default)]
    pub user: Option<IdRef>,
    #[serde(default)]
    pub group: Option<IdRef>,
    #[serde(default)]
    pub capabilities: RawCapabilities,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RawCapabilities {
    #[serde(default)]
    pub capability: Vec<Capability>,
}

impl RawPermissions {
    /// Flatten the wire shape, dropping entries with neither a user nor a
    /// group grantee.
    pub(crate) fn into_grants(self) -> Vec<GranteeCapabilities> {
        self.grantee_capabilities
            .into_iter()
            .filter_map(|raw| {
                let grantee = match (raw.user, raw.group) {
                    (Some(user), _) => Grantee::User(user.id),
                    (None, Some(group)) => Grantee::Group(group.id),
                    (None, None) => return None,
                };
                Some(GranteeCapabilities {
                    grantee,
                    capabilities: raw.capabilities.capability,
                })
            })
            .collect()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Lenient number parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(u64),
        Str(String),
    }

    /// Accept `42`, `"42"`, `""` or `null`.
    pub fn opt_u64<'de, D>(de: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<NumOrStr>::deserialize(de)? {
            Some(NumOrStr::Num(n)) => Some(n),
            Some(NumOrStr::Str(s)) => s.trim().parse().ok(),
            None => None,
        })
    }

    pub fn u64_or_zero<'de, D>(de: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        opt_u64(de).map(|v| v.unwrap_or(0))
    }

    /// Parse a value that may be a JSON number or a numeric string.
    pub fn value_u64(v: &serde_json::Value) -> Option<u64> {
        match v {
            serde_json::Value::Number(n) => n.as_u64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}
