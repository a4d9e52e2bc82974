//! `tm-gateway` — the `tableau-mcp` binary: CLI parsing, configuration
//! loading and component wiring.

pub mod bootstrap;
pub mod cli;
pub mod shutdown;
