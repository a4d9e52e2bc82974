//! Configuration resolved from the process environment.
//!
//! The server is configured entirely through `TABLEAU_*` variables, either
//! exported by the parent process or read from a `.env` file. Resolution is
//! pure: nothing here writes to the environment or touches the network.

mod credentials;
mod env;
mod tableau;

pub use credentials::*;
pub use env::*;
pub use tableau::*;
