mod cli;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::{error, info};
use scr_core::config::error::ConfigError;
use scr_core::{EngineConfig, TimeoutPolicy};

use cli::Scenario;

/// SCR: service component instance engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Engine config file (.json, .yaml or .toml); SCR_* variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the effective engine configuration as JSON
    Config,
    /// Run a demo component scenario through the engine
    Simulate {
        #[arg(value_enum, default_value_t = Scenario::Cycle)]
        scenario: Scenario,
        /// Fail operations whose waits time out instead of continuing
        #[arg(long)]
        strict: bool,
    },
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let mut config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = CliArgs::parse();

    let mut config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load engine configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        Commands::Config => match serde_json::to_string_pretty(&config) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to print configuration: {}", e);
                return ExitCode::FAILURE;
            }
        },
        Commands::Simulate { scenario, strict } => {
            if strict {
                config.timeout_policy = TimeoutPolicy::Strict;
            }
            info!("Engine configuration: {:?}", config);
            if let Err(e) = cli::simulate(config, scenario).await {
                error!("Simulation failed: {}", e);
                eprintln!("Simulation of the {} scenario failed: {}", scenario, e);
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}
