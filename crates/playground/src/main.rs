//! Script playground web server
//!
//! Loads one script, asks it to describe its options, then serves a page where
//! visitors paste content, tweak those options and get the script's output
//! back either inline or as a download.

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use playground_engine::{Sandbox, SandboxConfig, ScriptProgram};
use playground_server::{shutdown_signal, PlaygroundServer, ServerConfig, Templates};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Playground - Serve a script behind an interactive web page")]
struct Cli {
    #[clap(long, default_value = "scripts/chart.rhai", help = "Script rendering submitted content")]
    script_path: PathBuf,

    #[clap(long, default_value = "127.0.0.1:8080")]
    listen_address: String,

    #[clap(long, default_value = "chart.svg", help = "File name offered for downloads")]
    artifact_name: String,

    #[clap(long, default_value_t = playground_server::form::DEFAULT_MAX_CONTENT_SIZE, help = "Largest accepted content, in bytes")]
    max_content_size: usize,

    #[clap(long, help = "YAML file overriding the interpreter limits")]
    limits: Option<PathBuf>,

    #[clap(long, short, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    if let Err(e) = run_server(cli).await {
        log::error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn run_server(cli: Cli) -> Result<()> {
    let sandbox_config = match &cli.limits {
        Some(path) => {
            log::info!("Loading interpreter limits from: {}", path.display());
            SandboxConfig::from_yaml_file(path)?
        }
        None => SandboxConfig::default(),
    };

    log::info!("Loading script from: {}", cli.script_path.display());
    let program = ScriptProgram::load(&cli.script_path, &sandbox_config)?;
    let sandbox = Sandbox::new(program, sandbox_config);
    log::info!("Compiled script {}", sandbox.program().origin().display());

    let templates = Templates::from_assets().context("failed loading page templates")?;

    let server_config = ServerConfig::default()
        .with_bind_addr_str(&cli.listen_address)?
        .with_artifact_name(cli.artifact_name.as_str())?
        .with_max_content_size(cli.max_content_size)
        .with_logging(true);

    let server = PlaygroundServer::from_sandbox(sandbox, templates, server_config)
        .context("failed deriving config from script")?;
    for option in server.schema() {
        log::debug!("Option --{} (default {:?}, {:?})", option.name, option.value, option.kind);
    }
    log::info!(
        "Accepting up to {} bytes of content, downloads named {}",
        server.config().max_content_size,
        server.config().artifact_name
    );

    server.serve_with_shutdown(shutdown_signal()).await?;
    Ok(())
}
