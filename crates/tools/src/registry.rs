//! Tool registry: the catalog advertised to the client and the mapping
//! from tool name to handler.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use tm_domain::error::{Error, Result};
use tm_domain::tool::ContentBlock;

use crate::args::ToolArgs;
use crate::handlers::{admin, content, ToolContext};
use crate::schema::{input_schema, ParamSpec};

pub type HandlerFuture = BoxFuture<'static, Result<Vec<ContentBlock>>>;

/// Entry point of a tool. Receives arguments that already passed the
/// tool's schema.
pub type Handler = fn(ToolContext, ToolArgs) -> HandlerFuture;

/// Everything the registry knows about one tool.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
    pub handler: Handler,
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("params", &self.params.len())
            .finish()
    }
}

impl ToolDescriptor {
    /// The MCP `tools/list` entry.
    pub fn definition(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": input_schema(&self.params),
        })
    }
}

/// Adapt a typed handler `async fn(ToolContext, fields..)` to [`Handler`].
macro_rules! handler {
    ($variant:ident => $func:path) => {{
        fn adapter(ctx: ToolContext, args: ToolArgs) -> HandlerFuture {
            Box::pin(async move {
                match args {
                    ToolArgs::$variant => $func(ctx).await,
                    other => Err(mismatch(stringify!($variant), &other)),
                }
            })
        }
        adapter as Handler
    }};
    ($variant:ident { $($field:ident),+ } => $func:path) => {{
        fn adapter(ctx: ToolContext, args: ToolArgs) -> HandlerFuture {
            Box::pin(async move {
                match args {
                    ToolArgs::$variant { $($field),+ } => $func(ctx, $($field),+).await,
                    other => Err(mismatch(stringify!($variant), &other)),
                }
            })
        }
        adapter as Handler
    }};
}

fn mismatch(expected: &str, got: &ToolArgs) -> Error {
    Error::Other(format!(
        "handler for {expected} received arguments for {}",
        got.tool_name()
    ))
}

/// Name-indexed set of tools. Names are unique; catalog order is
/// registration order.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    index: HashMap<&'static str, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. A second tool with the same name is rejected.
    pub fn register(&mut self, descriptor: ToolDescriptor) -> Result<()> {
        if self.index.contains_key(descriptor.name) {
            return Err(Error::Other(format!(
                "tool '{}' is already registered",
                descriptor.name
            )));
        }
        self.index.insert(descriptor.name, self.tools.len());
        self.tools.push(descriptor);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&ToolDescriptor> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| Error::UnknownTool(name.to_owned()))
    }

    pub fn definitions(&self) -> Vec<Value> {
        self.tools.iter().map(ToolDescriptor::definition).collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// The process-wide registry of built-in tools, built on first use.
    pub fn global() -> Arc<ToolRegistry> {
        static GLOBAL: OnceLock<Arc<ToolRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Self::builtin())).clone()
    }

    /// The fifteen built-in Tableau tools.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for descriptor in builtin_descriptors() {
            // Built-in names are distinct literals.
            if let Err(e) = registry.register(descriptor) {
                tracing::error!(error = %e, "skipping built-in tool");
            }
        }
        registry
    }
}

fn tool(
    name: &'static str,
    description: &'static str,
    params: Vec<ParamSpec>,
    handler: Handler,
) -> ToolDescriptor {
    ToolDescriptor {
        name,
        description,
        params,
        handler,
    }
}

fn builtin_descriptors() -> Vec<ToolDescriptor> {
    let workbook_id = || ParamSpec::required_string("workbook_id", "ID (LUID) of the workbook");
    let view_id = || ParamSpec::required_string("view_id", "ID (LUID) of the view");
    let user_id = || ParamSpec::required_string("user_id", "ID (LUID) of the user");

    vec![
        // ── content ──────────────────────────────────────────────────
        tool(
            "list_workbooks",
            "List all available Tableau workbooks",
            vec![],
            handler!(ListWorkbooks => content::list_workbooks),
        ),
        tool(
            "list_views",
            "List all views in a specific workbook",
            vec![workbook_id()],
            handler!(ListViews { workbook_id } => content::list_views),
        ),
        tool(
            "get_view_data",
            "Get data from a specific Tableau view as CSV",
            vec![view_id()],
            handler!(GetViewData { view_id } => content::get_view_data),
        ),
        tool(
            "get_view_image",
            "Get a PNG image of a Tableau view or dashboard",
            vec![view_id()],
            handler!(GetViewImage { view_id } => content::get_view_image),
        ),
        tool(
            "search_content",
            "Search for Tableau content (workbooks, views) by name or description",
            vec![ParamSpec::required_string(
                "query",
                "Case-insensitive text to look for",
            )],
            handler!(SearchContent { query } => content::search_content),
        ),
        tool(
            "list_datasources",
            "List all available Tableau data sources",
            vec![],
            handler!(ListDatasources => content::list_datasources),
        ),
        tool(
            "download_datasource",
            "Download the complete packaged data source (.tdsx) and summarise its contents",
            vec![
                ParamSpec::required_string("datasource_id", "ID (LUID) of the data source"),
                ParamSpec::optional_bool(
                    "include_extract",
                    "Include the extract (.hyper) in the download",
                    true,
                ),
            ],
            handler!(DownloadDatasource { datasource_id, include_extract } => content::download_datasource),
        ),
        // ── administration ───────────────────────────────────────────
        tool(
            "list_workbook_permissions",
            "List all users and groups with access to a specific workbook and their permission levels",
            vec![workbook_id()],
            handler!(ListWorkbookPermissions { workbook_id } => admin::list_workbook_permissions),
        ),
        tool(
            "list_all_users",
            "List all users on the Tableau site with their details",
            vec![],
            handler!(ListAllUsers => admin::list_all_users),
        ),
        tool(
            "list_all_groups",
            "List all groups on the Tableau site with member counts",
            vec![],
            handler!(ListAllGroups => admin::list_all_groups),
        ),
        tool(
            "get_user_permissions",
            "Get all permissions and access levels for a specific user",
            vec![user_id()],
            handler!(GetUserPermissions { user_id } => admin::get_user_permissions),
        ),
        tool(
            "list_projects_permissions",
            "List all projects and their permission settings",
            vec![],
            handler!(ListProjectsPermissions => admin::list_projects_permissions),
        ),
        tool(
            "get_site_info",
            "Get Tableau site information and administrative details",
            vec![],
            handler!(GetSiteInfo => admin::get_site_info),
        ),
        tool(
            "audit_workbook_usage",
            "Get usage statistics and an access audit for a workbook",
            vec![workbook_id()],
            handler!(AuditWorkbookUsage { workbook_id } => admin::audit_workbook_usage),
        ),
        tool(
            "list_user_groups",
            "List all groups that a specific user belongs to",
            vec![user_id()],
            handler!(ListUserGroups { user_id } => admin::list_user_groups),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_every_tool_once() {
        let registry = ToolRegistry::builtin();
        assert_eq!(registry.len(), 15);
        let mut names = registry.names();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 15);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ToolRegistry::builtin();
        let copy = registry.lookup("list_workbooks").unwrap().clone();
        assert!(registry.register(copy).is_err());
        assert_eq!(registry.len(), 15);
    }

    #[test]
    fn unknown_lookup_is_unknown_tool() {
        let registry = ToolRegistry::builtin();
        assert!(matches!(
            registry.lookup("drop_site"),
            Err(Error::UnknownTool(name)) if name == "drop_site"
        ));
    }

    #[test]
    fn definitions_carry_required_fields() {
        let registry = ToolRegistry::builtin();
        let defs = registry.definitions();
        let download = defs
            .iter()
            .find(|d| d["name"] == "download_datasource")
            .unwrap();
        assert_eq!(download["inputSchema"]["required"], json!(["datasource_id"]));
        assert_eq!(
            download["inputSchema"]["properties"]["include_extract"]["type"],
            "boolean"
        );

        let list = defs.iter().find(|d| d["name"] == "list_workbooks").unwrap();
        assert_eq!(list["inputSchema"]["type"], "object");
    }

    #[test]
    fn global_registry_is_shared() {
        assert!(Arc::ptr_eq(&ToolRegistry::global(), &ToolRegistry::global()));
    }
}
