use std::path::Path;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tm_domain::config::TableauConfig;
use tm_gateway::bootstrap;
use tm_gateway::cli::{Cli, Command};
use tm_gateway::shutdown::ShutdownSignal;
use tm_tools::ToolRegistry;

/// Exit code for configuration failures detected before serving.
const EXIT_CONFIG: i32 = 2;
/// Exit code for a failed startup sign-in.
const EXIT_AUTH: i32 = 1;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None => {
            init_tracing(cli.debug, true);
            run_server(load_config_or_exit(cli.env_file()), false).await
        }
        Some(Command::Serve { verify }) => {
            init_tracing(cli.debug, true);
            run_server(load_config_or_exit(cli.env_file()), verify).await
        }
        Some(Command::Check) => {
            init_tracing(cli.debug, false);
            let config = load_config_or_exit(cli.env_file());
            let app = bootstrap::build(&config)?;
            let passed = tm_gateway::cli::check::run(&app.sessions, &mut std::io::stdout()).await?;
            if !passed {
                std::process::exit(EXIT_AUTH);
            }
            Ok(())
        }
        Some(Command::Tools) => {
            let tools = ToolRegistry::global().definitions();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({ "tools": tools }))?
            );
            Ok(())
        }
        Some(Command::Version) => {
            println!("tableau-mcp {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize tracing on stderr; stdout carries the protocol.
///
/// `serve` logs JSON lines, one-shot commands a compact format.
fn init_tracing(debug: bool, json: bool) {
    let env_filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn load_config_or_exit(env_file: Option<&Path>) -> TableauConfig {
    match tm_gateway::cli::load_config(env_file) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            eprintln!("tableau-mcp: configuration error: {e}");
            std::process::exit(EXIT_CONFIG);
        }
    }
}

async fn run_server(config: TableauConfig, verify: bool) -> anyhow::Result<()> {
    tracing::info!(
        server = %config.credentials.server_url,
        site = config.credentials.site_label(),
        auth_mode = %config.credentials.auth_mode(),
        "tableau-mcp starting"
    );

    let app = bootstrap::build(&config)?;

    if verify {
        if let Err(e) = app.sessions.sign_in().await {
            tracing::error!(error = %e, "startup sign-in failed");
            eprintln!("tableau-mcp: {e}");
            std::process::exit(EXIT_AUTH);
        }
        app.sessions.sign_out().await;
        tracing::info!("startup sign-in verified");
    }

    let mut shutdown = ShutdownSignal::register()?;
    let outcome = tokio::select! {
        result = tm_mcp::serve_stdio(&app.server) => result,
        signal = shutdown.recv() => {
            tracing::info!(signal, "received shutdown signal, shutting down");
            Ok(())
        }
    };

    app.sessions.shutdown().await;
    tracing::info!("shutdown complete");
    outcome.map_err(Into::into)
}
