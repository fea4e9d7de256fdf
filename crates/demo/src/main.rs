//! bqueue Demo - Example driver
//! Feeds jobs with random simulated durations into a queue, then drains it

use anyhow::{Context, Result};
use async_trait::async_trait;
use bqueue_core::{
    cancel_channel, settings, FailurePolicy, Job, JobResult, ProvisioningMode, Queue,
    QueueSettings,
};
use clap::Parser;
use rand::Rng;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "bqueue-demo")]
#[command(about = "Feed simulated jobs through a bounded job queue", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (JSON); flags below override its values
    #[arg(long, env = "BQUEUE_CONFIG")]
    config: Option<PathBuf>,

    /// Provisioning mode: static or dynamic
    #[arg(long, env = "BQUEUE_MODE")]
    mode: Option<ProvisioningMode>,

    /// Worker count (-1 = unbounded, dynamic mode only)
    #[arg(long, env = "BQUEUE_WORKERS", allow_negative_numbers = true)]
    workers: Option<i64>,

    /// Buffer capacity
    #[arg(long, env = "BQUEUE_BUFFER_SIZE", allow_negative_numbers = true)]
    buffer_size: Option<i64>,

    /// What to do with failed jobs: ignore, log or report
    #[arg(long, env = "BQUEUE_FAILURE_POLICY")]
    failure_policy: Option<FailurePolicy>,

    /// Number of jobs to produce
    #[arg(short = 'n', long, default_value = "50")]
    jobs: usize,

    /// Delay between two produced jobs (ms)
    #[arg(long, default_value = "10")]
    tick_ms: u64,

    /// Give up waiting for drain after this many seconds
    #[arg(long, env = "BQUEUE_SHUTDOWN_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

impl Cli {
    fn queue_settings(&self) -> Result<QueueSettings> {
        let mut resolved = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read settings file {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid settings file {}", path.display()))?
            }
            None => QueueSettings::default(),
        };

        if let Some(mode) = self.mode {
            resolved.mode = mode;
        }
        if let Some(workers) = self.workers {
            resolved.workers = workers;
        }
        if let Some(buffer_size) = self.buffer_size {
            resolved.buffer_size = buffer_size;
        }
        if let Some(policy) = self.failure_policy {
            resolved.failure_policy = policy;
        }
        Ok(resolved)
    }
}

/// Simulated job: sleeps to show that jobs do not complete in order
struct DemoJob {
    id: usize,
    duration: Duration,
}

#[async_trait]
impl Job for DemoJob {
    async fn execute(self: Box<Self>) -> JobResult {
        tokio::time::sleep(self.duration).await;
        println!(
            "processed job: {}, job took: {} milliseconds",
            self.id,
            self.duration.as_millis()
        );
        Ok(())
    }
}

/// Random work duration between 100ms and 1s
fn work_duration() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(100..1000))
}

async fn produce(queue: &Queue, jobs: usize, tick: Duration) {
    let mut ticker = tokio::time::interval(tick);
    for id in 1..=jobs {
        ticker.tick().await;
        queue
            .enqueue(DemoJob {
                id,
                duration: work_duration(),
            })
            .await;
    }
}

fn init_logging() -> Result<()> {
    let log_format = std::env::var("BQUEUE_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("bqueue=info,bqueue_core=info,bqueue_demo=info"))
        .context("Failed to create env filter")?;

    match log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Initialize logging
    init_logging()?;
    info!("bqueue demo v{} starting...", VERSION);

    // 2. Resolve settings and start the queue
    let queue_settings = cli.queue_settings()?;
    info!(settings = ?queue_settings, "Starting queue");
    let queue = Queue::new([settings(queue_settings)]).context("Queue construction failed")?;

    // 3. Produce jobs until done or interrupted
    tokio::select! {
        _ = produce(&queue, cli.jobs, Duration::from_millis(cli.tick_ms)) => {
            info!(jobs = cli.jobs, "All jobs enqueued");
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; draining jobs already enqueued");
        }
    }

    // 4. Drain: a second Ctrl+C or the timeout stops the wait
    let (cancel_handle, mut cancel) = cancel_channel();
    if let Some(secs) = cli.timeout_secs {
        cancel = cancel.and_timeout(Duration::from_secs(secs));
    }
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_handle.cancel();
        }
    });

    let outcome = queue.shutdown(cancel).await;

    let summary = serde_json::json!({
        "state": queue.state().to_string(),
        "in_flight": queue.in_flight(),
        "failed_jobs": queue.failed_jobs(),
    });
    info!(summary = %summary, "Shutdown finished");

    outcome.context("Queue did not drain cleanly")?;
    info!("Shutdown complete.");
    Ok(())
}
