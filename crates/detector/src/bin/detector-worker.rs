//! detector-worker: feeds JSON-line readings through every loaded detector model.
//!
//! Each input line is either an envelope, `{"key": "..", "attributes": {..}}`,
//! or a raw payload whose instance key is read from the model's `key`
//! attribute. Every model sees every reading. Alerts go to the channels in
//! the channel config (log channel when none is given).
//!
//! Reads until end of input or Ctrl-C, then drains the pipelines and the
//! dispatcher before exiting.

use std::path::PathBuf;
use std::pin::pin;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use tripwire_core::config::{load_dotenv, Config};
use tripwire_detector::loader::{LoadStatus, ModelLoader};
use tripwire_detector::{DetectorEngine, Pipeline, PipelineStats};
use tripwire_notify::{ChannelsConfig, Dispatcher};

// ── CLI ─────────────────────────────────────────────────────────────

/// Keyed state-machine detectors over a stream of JSON readings.
#[derive(Parser, Debug)]
#[command(name = "detector-worker", version, about)]
struct Cli {
    /// Model file or directory (overrides MODELS_PATH).
    #[arg(long)]
    models: Option<PathBuf>,

    /// Channel config YAML (overrides CHANNELS_PATH).
    #[arg(long)]
    channels: Option<PathBuf>,

    /// Evaluation partitions per model (overrides DETECTOR_PARTITIONS).
    #[arg(long)]
    partitions: Option<usize>,

    /// Queue size per partition (overrides DETECTOR_QUEUE_CAPACITY).
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Validate the models and exit without reading input.
    #[arg(long)]
    check: bool,

    /// JSON-lines file with readings; stdin when omitted.
    input: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(models) = &self.models {
            config.detector.models_path = models.clone();
        }
        if let Some(channels) = &self.channels {
            config.notify.channels_path = Some(channels.clone());
        }
        if let Some(partitions) = self.partitions {
            config.detector.partitions = partitions.max(1);
        }
        if let Some(capacity) = self.queue_capacity {
            config.detector.queue_capacity = capacity.max(1);
        }
    }
}

// ── Models ──────────────────────────────────────────────────────────

fn load_models(config: &Config) -> anyhow::Result<(ModelLoader, usize)> {
    let loader = ModelLoader::new(&config.detector.models_path);
    let results = loader
        .load_all()
        .with_context(|| format!("loading models from {}", config.detector.models_path.display()))?;

    let mut failed = 0;
    for result in &results {
        match &result.status {
            LoadStatus::Loaded { model } => {
                info!(model = %model, path = %result.path.display(), "model loaded")
            }
            LoadStatus::Skipped { reason } => {
                debug!(path = %result.path.display(), reason = %reason, "file skipped")
            }
            LoadStatus::Failed { error } => {
                failed += 1;
                error!(path = %result.path.display(), error = %error, "model rejected")
            }
        }
    }
    Ok((loader, failed))
}

fn build_dispatcher(config: &Config) -> anyhow::Result<Dispatcher> {
    let channels = match &config.notify.channels_path {
        Some(path) => ChannelsConfig::from_file(path)?,
        None => ChannelsConfig::default(),
    };
    Ok(Dispatcher::from_config(&channels)?)
}

// ── Ingestion ───────────────────────────────────────────────────────

async fn feed<R>(input: R, pipelines: &[Pipeline]) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut interrupt = pin!(tokio::signal::ctrl_c());
    let mut line_no = 0u64;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("reading input")?,
            _ = &mut interrupt => {
                info!("interrupt received, draining");
                break;
            }
        };
        let Some(line) = line else { break };
        line_no += 1;

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(line = line_no, error = %e, "reading rejected: not JSON");
                continue;
            }
        };

        for pipeline in pipelines {
            match pipeline.engine().reading_from_json(&value) {
                Ok(reading) => pipeline.submit(reading).await?,
                Err(e) => warn!(
                    line = line_no,
                    model = %pipeline.engine().model().name(),
                    error = %e,
                    "reading rejected"
                ),
            }
        }
    }
    Ok(())
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let mut config = Config::from_env();
    cli.apply(&mut config);
    config.log_summary();

    let (loader, failed) = load_models(&config)?;
    let models = loader.models();
    if cli.check {
        info!(valid = models.len(), failed, "model check complete");
        anyhow::ensure!(failed == 0, "{failed} model file(s) failed to load");
        return Ok(());
    }
    anyhow::ensure!(
        !models.is_empty(),
        "no valid models under {}",
        config.detector.models_path.display()
    );

    let dispatcher = Arc::new(build_dispatcher(&config)?);
    let (alerts_tx, alerts_rx) = mpsc::channel(config.notify.queue_capacity);
    let dispatch = tokio::spawn(dispatcher.run(alerts_rx));

    let pipelines: Vec<Pipeline> = models
        .into_iter()
        .map(|model| {
            Pipeline::spawn(
                Arc::new(DetectorEngine::new(model)),
                config.detector.partitions,
                config.detector.queue_capacity,
                alerts_tx.clone(),
            )
        })
        .collect();
    drop(alerts_tx);

    info!(models = pipelines.len(), "detector-worker started");
    let fed = match &cli.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            feed(BufReader::new(file), &pipelines).await
        }
        None => feed(BufReader::new(tokio::io::stdin()), &pipelines).await,
    };

    // Drain even when input failed, so queued alerts still go out.
    let mut total = PipelineStats::default();
    for pipeline in pipelines {
        total.merge(pipeline.shutdown().await);
    }
    let delivery = dispatch.await.context("dispatcher task failed")?;

    info!(
        readings = total.readings,
        alerts = total.alerts,
        dropped_alerts = total.dropped_alerts,
        delivered = delivery.delivered,
        failed = delivery.failed,
        "detector-worker exited"
    );
    fed
}
