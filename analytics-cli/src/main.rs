mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::process;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::{Args, Commands},
    commands::{CommandExecutor, Credentials},
    config::{AppConfig, Overrides},
    error::Result,
    output::OutputManager,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        let error_json = serde_json::json!({
            "status": "error",
            "message": e.to_string(),
        });
        eprintln!("{error_json}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet);

    let config_path = args.config.as_deref();
    let mut overrides = Overrides {
        base_url: args.base_url,
        timeout_secs: args.timeout,
        proxy: args.proxy,
        ..Overrides::default()
    };

    // Commands that never talk to the backend.
    match &args.command {
        Commands::Completions { shell } => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Args::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
            return Ok(());
        }
        Commands::Config { show, reset } => {
            if *reset {
                let path = AppConfig::reset(config_path)?;
                println!("Configuration reset to defaults at {}", path.display());
            } else if *show {
                let config = AppConfig::load(config_path)?;
                println!("{}", config.show()?);
            } else {
                println!("Use --show to display current configuration or --reset to reset to defaults");
            }
            return Ok(());
        }
        Commands::Run {
            interval, max_wait, ..
        } => {
            overrides.poll_interval_ms = *interval;
            overrides.max_poll_secs = *max_wait;
        }
        _ => {}
    }

    let config = AppConfig::load(config_path)?;
    debug!(base_url = %config.base_url, "configuration loaded");

    let credentials = Credentials::resolve(args.email.or_else(|| config.email.clone()), args.password)?;
    let executor = CommandExecutor::new(config.client_config(&overrides)?, OutputManager::new(args.output))?;
    let user = executor.login(&credentials).await?;

    let result = match args.command {
        Commands::Login => executor.print_user(&user),
        Commands::Whoami => executor.whoami().await,
        Commands::Datasets(command) => executor.datasets(command).await,
        Commands::Recipes(command) => executor.recipes(command).await,
        Commands::Run {
            dataset,
            recipe,
            params,
            ..
        } => {
            let token = CancellationToken::new();
            let ctrl_c = tokio::spawn({
                let token = token.clone();
                async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        eprintln!("Cancelling, waiting for the current poll to finish...");
                        token.cancel();
                    }
                }
            });
            let result = executor.run(dataset, recipe, &params, &token).await;
            ctrl_c.abort();
            result
        }
        Commands::Corr {
            dataset,
            columns,
            filters,
        } => executor.correlation(dataset, columns, filters.as_deref()).await,
        Commands::Pca {
            dataset,
            columns,
            filters,
            components,
        } => executor.pca(dataset, columns, filters.as_deref(), components).await,
        Commands::Chart { dataset, panel } => executor.chart(dataset, &panel).await,
        Commands::Completions { .. } | Commands::Config { .. } => Ok(()),
    };

    executor.logout().await;
    result
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    subscriber
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .init();
}
