//! Actuate CLI main entry point

use actuate_cli::{
    cli::{Cli, Commands},
    commands,
    error::CliResult,
    utils::{init_tracing, ColoredOutput},
};
use actuate_config::{EnvResolver, RuntimeSettings};
use anyhow::Context;
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{} {}", ColoredOutput::error("Error:"), e);
            1
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;

    if cli.no_color {
        colored::control::set_override(false);
    }

    info!("Actuate CLI v{}", env!("CARGO_PKG_VERSION"));

    let settings = load_settings(cli.settings.as_deref())?;

    match cli.command {
        Commands::Exec { target, query, header, bindings, run } => {
            commands::exec::execute(&settings, target, query, header, bindings, run).await
        }
        Commands::Upload { target, fields, files, parameter_map, run } => {
            commands::upload::execute(&settings, target, fields, files, parameter_map, run).await
        }
        Commands::Render { file, bindings, lenient, format } => {
            commands::render::execute(&file, &bindings, lenient, format)
        }
    }
}

fn load_settings(path: Option<&str>) -> anyhow::Result<RuntimeSettings> {
    match path {
        Some(path) => RuntimeSettings::load_from_file(path, &EnvResolver::default())
            .with_context(|| format!("Failed to load settings from '{}'", path)),
        None => Ok(RuntimeSettings::default()),
    }
}
