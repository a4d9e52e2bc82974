//! Tableau tools for tableau-mcp.
//!
//! - [`registry`]: the fifteen built-in tools and their input schemas
//! - [`dispatch`]: validates a call and runs its handler inside a scoped
//!   Tableau session
//! - [`resources`]: `tableau://` resource reads
//! - [`handlers`]: the tool bodies

pub mod args;
pub mod dispatch;
pub mod handlers;
pub mod registry;
pub mod resources;
pub mod schema;

pub use args::ToolArgs;
pub use dispatch::Dispatcher;
pub use handlers::{ToolContext, ToolSettings};
pub use registry::{ToolDescriptor, ToolRegistry};
pub use resources::{ResourceContent, ResourceEntry, ResourceProvider, ResourceTemplate, ResourceUri};
pub use schema::{ParamKind, ParamSpec};
