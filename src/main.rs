use betsignal::cli::{self, Cli, Commands};
use betsignal::config::AppConfig;
use betsignal::context::AppContext;
use betsignal::error::{BetSignalError, Result};
use betsignal::strategy::ValueFilter;
use clap::Parser;
use tokio::signal;
use tracing::{error, info};

mod main_runtime;

use main_runtime::{init_logging, init_logging_simple};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)?;

    match cli.command {
        None | Some(Commands::Run) => {
            init_logging(&config.logging);
            run_service(config).await?;
        }
        Some(Commands::Analyze { snapshot, json }) => {
            init_logging_simple();
            let ctx = AppContext::init(config).await?;
            cli::analyze_snapshot(&ctx, &snapshot, json).await?;
        }
        Some(Commands::Train { predictor, dataset }) => {
            init_logging_simple();
            let ctx = AppContext::init(config).await?;
            cli::train_predictor(&ctx, predictor, &dataset).await?;
        }
        Some(Commands::Predictors) => {
            init_logging_simple();
            let ctx = AppContext::init(config).await?;
            cli::show_predictors(&ctx).await?;
        }
        Some(Commands::Value {
            probability,
            odds,
            confidence,
            accuracy,
            sample_size,
        }) => {
            init_logging_simple();
            let filter = ValueFilter::new(config.value_filter.clone());
            cli::assess_value(&filter, probability, odds, confidence, accuracy, sample_size)?;
        }
    }

    Ok(())
}

async fn run_service(config: AppConfig) -> Result<()> {
    info!("Starting betsignal");

    let ctx = match AppContext::init(config).await {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Startup failed: {}", e);
            return Err(e);
        }
    };
    ctx.start().await;

    shutdown_signal().await?;
    ctx.shutdown().await;
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    signal::ctrl_c()
        .await
        .map_err(|e| BetSignalError::Internal(format!("Failed to listen for ctrl-c: {}", e)))?;
    info!("Received shutdown signal");
    Ok(())
}
