//! pollerd entry point.
//!
//! Loads configuration and schema modules, starts the worker pool and
//! feeds it orders from the configured queue until the queue is drained
//! or the process receives Ctrl-C.

use clap::Parser;
use poller_schema::{Resolver, Schema};
use poller_snmp::UdpConnector;
use pollerd::config::DEFAULT_CONFIG_PATH;
use pollerd::{
    build_sink, logging, ConfigError, Engine, LineQueue, OrderSource, PollerConfig, QueueKind,
    RedisQueue, Result, RetryPolicy, StaticInventory, WorkerPool,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Queue-driven SNMP telemetry poller
#[derive(Parser, Debug)]
#[command(name = "pollerd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'f', long = "config", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match PollerConfig::load_or_default(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("pollerd: {}", e);
            return ExitCode::FAILURE;
        }
    };
    config.debug |= args.debug;

    if let Err(e) = logging::init_logging(config.debug) {
        eprintln!("pollerd: {}", e);
        return ExitCode::FAILURE;
    }

    info!(config = %args.config.display(), "pollerd: Starting");
    match run(config).await {
        Ok(()) => {
            info!("pollerd: Exiting normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "pollerd: Exiting with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: PollerConfig) -> Result<()> {
    config.validate()?;

    let schema = Schema::load(&config.schema.paths[..], &config.schema.modules[..])?;
    info!(
        modules = schema.modules().len(),
        objects = schema.len(),
        "Schema loaded"
    );
    let resolver = Arc::new(Resolver::new(schema));

    let sink_config = config
        .sink
        .as_ref()
        .ok_or_else(|| ConfigError::invalid("sink", "a sink must be configured"))?;
    let sink = build_sink(sink_config).await?;

    let mut source: Box<dyn OrderSource> = match config.queue.kind {
        QueueKind::Redis => {
            Box::new(RedisQueue::connect(&config.queue.url, &config.queue.name).await?)
        }
        QueueKind::Stdin => {
            info!("Reading orders from stdin");
            Box::new(LineQueue::stdin())
        }
    };

    let engine = Engine::new(
        resolver,
        Arc::new(UdpConnector::new(config.snmp.session_options())),
        Arc::new(StaticInventory::from_config(&config.inventory)),
        sink,
        config.max_map_age(),
    );
    let pool = WorkerPool::start(
        Arc::new(engine),
        config.workers,
        RetryPolicy::from_config(&config.retry),
    );

    let consumed = tokio::select! {
        result = pool.consume(source.as_mut()) => result,
        _ = signal::ctrl_c() => {
            warn!("pollerd: Received interrupt, finishing running orders");
            Ok(())
        }
    };

    let stats = pool.shutdown().await;
    info!(
        ok = stats.ok,
        failed = stats.failed,
        requeued = stats.requeued,
        rejected = stats.rejected,
        "pollerd: Workers stopped"
    );
    consumed?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args() {
        Args::command().debug_assert();
        let args = Args::parse_from(["pollerd", "-f", "/tmp/p.toml", "--debug"]);
        assert_eq!(args.config, PathBuf::from("/tmp/p.toml"));
        assert!(args.debug);

        let args = Args::parse_from(["pollerd"]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(!args.debug);
    }
}
