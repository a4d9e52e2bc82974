//! Process shutdown signals.
//!
//! MCP hosts usually stop a stdio server with SIGTERM, interactive use
//! with Ctrl-C. Either one ends serving so the open Tableau session is
//! signed out before exit.

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Registered shutdown handlers. Register before serving so a signal that
/// arrives early is not lost to the default disposition.
pub struct ShutdownSignal {
    #[cfg(unix)]
    sigterm: Signal,
}

impl ShutdownSignal {
    pub fn register() -> std::io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for SIGINT or SIGTERM and return the name of the one received.
    pub async fn recv(&mut self) -> &'static str {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => "SIGINT",
                _ = self.sigterm.recv() => "SIGTERM",
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            "SIGINT"
        }
    }
}
