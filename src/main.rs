use anyhow::{Context, Result};
use sentiment_longshort::config::{Config, EnvConfig};
use sentiment_longshort::data::provider::FileDataSource;
use sentiment_longshort::engine::driver::RebalanceDriver;
use sentiment_longshort::engine::scheduler::Scheduler;
use sentiment_longshort::execution::persistence::RunDatabase;
use sentiment_longshort::execution::simulator::PaperBroker;
use sentiment_longshort::monitoring::logger::CsvLogger;
use sentiment_longshort::monitoring::RecordSinks;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    tracing::info!("Sentiment long/short backtester starting...");

    // Load configuration
    let env_config = EnvConfig::load()?;
    tracing::info!("Loading configuration from {}", env_config.config_path);
    let mut config = Config::load(&env_config.config_path)?;
    if let Some(path) = env_config.data_path {
        config.system.data_path = path;
    }
    if let Some(dry_run) = env_config.dry_run {
        config.system.dry_run = dry_run;
    }

    let params = config.strategy.resolve()?;
    let rebalance_time = config.schedule.rebalance_time()?;
    tracing::info!("Strategy variant: {:?}", params.variant);
    tracing::info!(
        "Thresholds: long >= {}, short <= {}, quantiles = {}",
        params.long_threshold,
        params.short_threshold,
        params.quantiles
    );
    tracing::info!("Rebalance at {}, record at {}", rebalance_time, config.schedule.session_close);
    tracing::info!("Dry run mode: {}", config.system.dry_run);

    let data = Arc::new(FileDataSource::load(&config.system.data_path, params.filters.clone())?);
    let venue = PaperBroker::new(config.paper_trading.clone(), data.clone());
    let driver = RebalanceDriver::new(&params, rebalance_time);

    let mut sinks = RecordSinks::new();
    if config.monitoring.csv_logging {
        sinks.push(Box::new(CsvLogger::new(config.monitoring.csv_log_path.clone())?));
    }
    if config.monitoring.prometheus_enabled {
        #[cfg(feature = "metrics")]
        sinks.push(Box::new(
            sentiment_longshort::monitoring::metrics::PrometheusSink::new()?,
        ));
        #[cfg(not(feature = "metrics"))]
        tracing::warn!("prometheus_enabled is set but the `metrics` feature is not compiled in");
    }

    let mut scheduler = Scheduler::new(data, venue, driver).with_sinks(sinks);
    if !config.system.dry_run {
        tracing::info!("Initializing database: {}", config.system.database_path);
        scheduler = scheduler.with_journal(RunDatabase::new(&config.system.database_path)?);
    }

    let stop = scheduler.stop_handle();
    let mut run = tokio::task::spawn_blocking(move || scheduler.run());

    let summary = tokio::select! {
        result = &mut run => result.context("Backtest task panicked")??,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down after the current day...");
            stop.store(true, Ordering::SeqCst);
            run.await.context("Backtest task panicked")??
        }
    };

    tracing::info!(
        "Days: {} ({} failed), instructions: {} submitted / {} skipped",
        summary.days_run,
        summary.days_failed,
        summary.instructions_submitted,
        summary.instructions_skipped
    );
    tracing::info!("Total return: {:+.2}%", summary.total_return() * 100.0);

    Ok(())
}
