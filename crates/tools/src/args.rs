//! Typed arguments, one variant per tool.

use serde_json::{Map, Value};
use tm_domain::error::{Error, Result};

/// Arguments of a validated tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolArgs {
    ListWorkbooks,
    ListViews { workbook_id: String },
    GetViewData { view_id: String },
    GetViewImage { view_id: String },
    SearchContent { query: String },
    ListDatasources,
    DownloadDatasource { datasource_id: String, include_extract: bool },
    ListWorkbookPermissions { workbook_id: String },
    ListAllUsers,
    ListAllGroups,
    GetUserPermissions { user_id: String },
    ListProjectsPermissions,
    GetSiteInfo,
    AuditWorkbookUsage { workbook_id: String },
    ListUserGroups { user_id: String },
}

impl ToolArgs {
    /// Build the variant for `tool` from arguments that already passed
    /// schema validation.
    pub fn from_arguments(tool: &str, args: &Map<String, Value>) -> Result<Self> {
        Ok(match tool {
            "list_workbooks" => Self::ListWorkbooks,
            "list_views" => Self::ListViews {
                workbook_id: string(args, "workbook_id")?,
            },
            "get_view_data" => Self::GetViewData {
                view_id: string(args, "view_id")?,
            },
            "get_view_image" => Self::GetViewImage {
                view_id: string(args, "view_id")?,
            },
            "search_content" => Self::SearchContent {
                query: string(args, "query")?,
            },
            "list_datasources" => Self::ListDatasources,
            "download_datasource" => Self::DownloadDatasource {
                datasource_id: string(args, "datasource_id")?,
                include_extract: args
                    .get("include_extract")
                    .and_then(Value::as_bool)
                    .unwrap_or(true),
            },
            "list_workbook_permissions" => Self::ListWorkbookPermissions {
                workbook_id: string(args, "workbook_id")?,
            },
            "list_all_users" => Self::ListAllUsers,
            "list_all_groups" => Self::ListAllGroups,
            "get_user_permissions" => Self::GetUserPermissions {
                user_id: string(args, "user_id")?,
            },
            "list_projects_permissions" => Self::ListProjectsPermissions,
            "get_site_info" => Self::GetSiteInfo,
            "audit_workbook_usage" => Self::AuditWorkbookUsage {
                workbook_id: string(args, "workbook_id")?,
            },
            "list_user_groups" => Self::ListUserGroups {
                user_id: string(args, "user_id")?,
            },
            other => return Err(Error::UnknownTool(other.to_owned())),
        })
    }

    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::ListWorkbooks => "list_workbooks",
            Self::ListViews { .. } => "list_views",
            Self::GetViewData { .. } => "get_view_data",
            Self::GetViewImage { .. } => "get_view_image",
            Self::SearchContent { .. } => "search_content",
            Self::ListDatasources => "list_datasources",
            Self::DownloadDatasource { .. } => "download_datasource",
            Self::ListWorkbookPermissions { .. } => "list_workbook_permissions",
            Self::ListAllUsers => "list_all_users",
            Self::ListAllGroups => "list_all_groups",
            Self::GetUserPermissions { .. } => "get_user_permissions",
            Self::ListProjectsPermissions => "list_projects_permissions",
            Self::GetSiteInfo => "get_site_info",
            Self::AuditWorkbookUsage { .. } => "audit_workbook_usage",
            Self::ListUserGroups { .. } => "list_user_groups",
        }
    }
}

/// A trimmed, non-empty string argument.
fn string(args: &Map<String, Value>, key: &str) -> Result<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| Error::invalid_argument(key, format!("{key} must be a non-empty string")))
}
