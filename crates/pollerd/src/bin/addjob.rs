//! Publishes order files to the pollerd Redis queue.
//!
//! Each file holds one JSON order. With `--sleep-ms` set to zero or more
//! the whole set is published again after every pause, until interrupted.

use anyhow::Context;
use clap::Parser;
use pollerd::{logging, RedisPublisher};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Publish pollerd orders
#[derive(Parser, Debug)]
#[command(name = "pollerd-addjob")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Redis URL of the queue broker
    #[arg(long, default_value = "redis://127.0.0.1:6379/")]
    broker: String,

    /// Queue name
    #[arg(long, default_value = "pollerd")]
    queue: String,

    /// Time to live for each published order, in milliseconds
    #[arg(long, default_value_t = 30_000, value_parser = clap::value_parser!(u64).range(1..))]
    ttl_ms: u64,

    /// Pause between two orders of one round, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Pause between rounds, in milliseconds; negative publishes once
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    sleep_ms: i64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Order files
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

impl Args {
    fn round_interval(&self) -> Option<Duration> {
        u64::try_from(self.sleep_ms).ok().map(Duration::from_millis)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_logging(args.debug)?;

    let mut orders = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        orders.push((path, body));
    }

    let mut publisher = RedisPublisher::connect(&args.broker, &args.queue)
        .await
        .with_context(|| format!("connecting to {}", args.broker))?;
    let ttl = Some(Duration::from_millis(args.ttl_ms));

    loop {
        for (n, (path, body)) in orders.iter().enumerate() {
            let size = publisher.publish(body, ttl).await?;
            debug!(file = %path.display(), size, "order published");
            if let Some(delay) = args.delay_ms {
                if n + 1 < orders.len() {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
        info!(orders = orders.len(), queue = %args.queue, "orders published");

        match args.round_interval() {
            Some(interval) => tokio::time::sleep(interval).await,
            None => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        Args::command().debug_assert();
        let args = Args::parse_from(["pollerd-addjob", "order.json"]);
        assert_eq!(args.broker, "redis://127.0.0.1:6379/");
        assert_eq!(args.queue, "pollerd");
        assert_eq!(args.ttl_ms, 30_000);
        assert_eq!(args.delay_ms, None);
        assert_eq!(args.round_interval(), None);
        assert_eq!(args.files, vec![PathBuf::from("order.json")]);
    }

    #[test]
    fn test_repeat_and_limits() {
        let args = Args::parse_from(["pollerd-addjob", "--sleep-ms", "500", "a.json", "b.json"]);
        assert_eq!(args.round_interval(), Some(Duration::from_millis(500)));

        let args = Args::parse_from(["pollerd-addjob", "--sleep-ms", "-5", "a.json"]);
        assert_eq!(args.round_interval(), None);

        assert!(Args::try_parse_from(["pollerd-addjob", "--ttl-ms", "0", "a.json"]).is_err());
        assert!(Args::try_parse_from(["pollerd-addjob"]).is_err());
    }
}
