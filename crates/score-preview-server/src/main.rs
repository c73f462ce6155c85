//! ScorePreview server entry point.

use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tokio::signal;
use tokio::sync::Notify;

use score_preview::PreviewCache;
use score_preview_server::{housekeeping, serve, PreviewService, ServerConfig};

#[derive(Parser)]
#[command(
    name = "score-preview-server",
    about = "Preview pages for catalog items and download them as A4 PDFs",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default).
    Serve {
        /// Listen port. Overrides PORT.
        #[arg(short, long)]
        port: Option<u16>,

        /// Preview site base URL. Overrides PREVIEW_ORIGIN.
        #[arg(long)]
        origin: Option<String>,
    },

    /// Print the effective configuration as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   score-preview-server completions bash > ~/.local/share/bash-completion/completions/score-preview-server
    ///   score-preview-server completions zsh > ~/.zfunc/_score-preview-server
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = ServerConfig::from_env();

    match cli.command.unwrap_or(Commands::Serve {
        port: None,
        origin: None,
    }) {
        Commands::Serve { port, origin } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(origin) = origin {
                config.origin = origin;
            }
            run(config).await?;
        }

        Commands::Info => {
            let info = serde_json::json!({
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
                "config": config.to_json(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(
                shell,
                &mut cmd,
                "score-preview-server",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

async fn run(config: ServerConfig) -> anyhow::Result<()> {
    tracing::info!("ScorePreview server");
    tracing::info!("Origin: {}", config.origin);
    tracing::info!("Retention: {}", config.retention);

    let cache = Arc::new(PreviewCache::new());
    let service = Arc::new(PreviewService::from_config(&config, cache.clone())?);

    let shutdown = Arc::new(Notify::new());
    let housekeeping = config
        .clear_schedule
        .map(|schedule| housekeeping::spawn(cache, schedule, shutdown.clone()));

    serve(config.port, service, shutdown_signal()).await?;

    shutdown.notify_one();
    if let Some(handle) = housekeeping {
        handle.await?;
    }
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
