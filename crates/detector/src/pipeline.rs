//! Partitioned async driver around a [`DetectorEngine`].
//!
//! Readings are routed to one of N partition tasks by a hash of their key,
//! so every key always lands on the same task and its readings are applied
//! in arrival order, while different partitions run in parallel. Alerts are
//! handed to the sink over a channel with `try_send`: a slow or stalled sink
//! drops alerts (with a warning) instead of holding up evaluation.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tripwire_core::{Alert, Reading};

use crate::engine::DetectorEngine;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("partition {0} is no longer accepting readings")]
    Closed(usize),
}

/// Counters from one or all partitions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub readings: u64,
    pub created: u64,
    pub transitions: u64,
    pub alerts: u64,
    /// Alerts lost because the sink queue was full or closed.
    pub dropped_alerts: u64,
}

impl PipelineStats {
    pub fn merge(&mut self, other: PipelineStats) {
        self.readings += other.readings;
        self.created += other.created;
        self.transitions += other.transitions;
        self.alerts += other.alerts;
        self.dropped_alerts += other.dropped_alerts;
    }
}

pub struct Pipeline {
    engine: Arc<DetectorEngine>,
    senders: Vec<mpsc::Sender<Reading>>,
    handles: Vec<JoinHandle<PipelineStats>>,
}

impl Pipeline {
    /// Start `partitions` tasks (at least one), each with a queue of
    /// `queue_capacity` readings (at least one).
    pub fn spawn(
        engine: Arc<DetectorEngine>,
        partitions: usize,
        queue_capacity: usize,
        alerts: mpsc::Sender<Alert>,
    ) -> Self {
        let partitions = partitions.max(1);
        let mut senders = Vec::with_capacity(partitions);
        let mut handles = Vec::with_capacity(partitions);

        for index in 0..partitions {
            let (tx, rx) = mpsc::channel(queue_capacity.max(1));
            senders.push(tx);
            handles.push(tokio::spawn(run_partition(
                index,
                Arc::clone(&engine),
                rx,
                alerts.clone(),
            )));
        }

        tracing::info!(
            model = %engine.model().name(),
            partitions,
            queue_capacity,
            "detector pipeline started"
        );
        Self {
            engine,
            senders,
            handles,
        }
    }

    pub fn engine(&self) -> &Arc<DetectorEngine> {
        &self.engine
    }

    pub fn partitions(&self) -> usize {
        self.senders.len()
    }

    /// Partition that owns `key`. Stable for the life of the process.
    pub fn partition_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.senders.len() as u64) as usize
    }

    /// Queue a reading, waiting while its partition's queue is full.
    pub async fn submit(&self, reading: Reading) -> Result<(), PipelineError> {
        let partition = self.partition_for(&reading.key);
        self.senders[partition]
            .send(reading)
            .await
            .map_err(|_| PipelineError::Closed(partition))
    }

    /// Stop accepting readings, drain every queue, and wait for the tasks.
    pub async fn shutdown(self) -> PipelineStats {
        drop(self.senders);
        let mut total = PipelineStats::default();
        for (index, handle) in self.handles.into_iter().enumerate() {
            match handle.await {
                Ok(stats) => total.merge(stats),
                Err(e) => tracing::warn!(partition = index, error = %e, "partition task failed"),
            }
        }
        tracing::info!(
            readings = total.readings,
            created = total.created,
            transitions = total.transitions,
            alerts = total.alerts,
            dropped_alerts = total.dropped_alerts,
            "detector pipeline drained"
        );
        total
    }
}

async fn run_partition(
    index: usize,
    engine: Arc<DetectorEngine>,
    mut readings: mpsc::Receiver<Reading>,
    alerts: mpsc::Sender<Alert>,
) -> PipelineStats {
    let mut stats = PipelineStats::default();
    while let Some(reading) = readings.recv().await {
        let evaluation = engine.process_reading(&reading);
        stats.readings += 1;
        stats.created += u64::from(evaluation.created);
        stats.transitions += u64::from(evaluation.transitioned());

        for alert in evaluation.into_alerts() {
            match alerts.try_send(alert) {
                Ok(()) => stats.alerts += 1,
                Err(mpsc::error::TrySendError::Full(alert)) => {
                    stats.dropped_alerts += 1;
                    tracing::warn!(partition = index, key = %alert.key, event = %alert.event_name, "alert queue full, alert dropped");
                }
                Err(mpsc::error::TrySendError::Closed(alert)) => {
                    stats.dropped_alerts += 1;
                    tracing::warn!(partition = index, key = %alert.key, event = %alert.event_name, "alert sink closed, alert dropped");
                }
            }
        }
    }
    tracing::debug!(partition = index, readings = stats.readings, "partition drained");
    stats
}
