use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tower_lsp::Server;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wpshell_lsp::build_lsp_service;
use wpshell_lsp::completion::service::CompletionService;
use wpshell_lsp::config::Config;
use wpshell_lsp::store::CatalogStore;

#[derive(Parser)]
#[command(name = "wpshell-lsp")]
#[command(version)]
#[command(about = "PHP and WordPress function completion for WordPress shells, over LSP on stdio")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Root of the bundled catalogs (`<ecosystem>/<major.minor>.json`)
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Catalog store file
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `wpshell_lsp=trace`; overrides RUST_LOG
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

fn load_config(cli: &Cli) -> Result<Config, wpshell_lsp::error::ConfigError> {
    let mut config = match cli.config.clone().or_else(Config::default_path) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if let Some(store) = &cli.store {
        config.store_path = Some(store.clone());
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries the protocol stream.
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let store_path = config.resolved_store_path();
    info!(
        "Starting wpshell-lsp (data: {}, store: {})",
        config.resolved_data_dir().display(),
        store_path.display()
    );
    let store = Arc::new(CatalogStore::open(store_path));
    let service = Arc::new(CompletionService::new(store, &config));

    let (lsp_service, socket) = build_lsp_service(service);
    Server::new(tokio::io::stdin(), tokio::io::stdout(), socket)
        .serve(lsp_service)
        .await;
    ExitCode::SUCCESS
}
