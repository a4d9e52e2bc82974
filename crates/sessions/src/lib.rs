//! Tableau session management for tableau-mcp.
//!
//! One [`SessionManager`] owns the single authenticated handle to the
//! Tableau site. Tool handlers never see the handle directly; they run
//! inside [`SessionManager::with_session`], which signs in, recovers once
//! from an expired token and always signs out afterwards.

pub mod manager;
pub mod state;

pub use manager::{SessionContext, SessionManager};
pub use state::SessionState;
