//! `tm-domain` — shared types for the Tableau MCP workspace.
//!
//! Everything the other crates agree on lives here: the error taxonomy,
//! credential and tunable resolution from the environment, the tool
//! request/response envelope, and structured trace events.

pub mod config;
pub mod error;
pub mod tool;
pub mod trace;
