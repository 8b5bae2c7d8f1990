use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::batching::list::ImageEntry;
use crate::error::ClassifyError;
use crate::pipeline::{Decision, Pipeline};

// Configuration for the batcher
#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Upper bound on calls in flight at once
    pub max_in_flight: usize,
}

/// Result for one entry of the input list.
#[derive(Debug)]
pub struct InputOutcome {
    /// Position in the input list
    pub index: usize,
    pub path: PathBuf,
    pub expected: Option<usize>,
    /// Wall time from dispatch to decision
    pub latency: Duration,
    pub result: Result<Decision, ClassifyError>,
}

/// Dispatches every entry as an independent unit of work and hands back the
/// outcomes in input order.
pub struct Batcher {
    pipeline: Arc<Pipeline>,
    config: BatcherConfig,
}

impl Batcher {
    pub fn new(pipeline: Arc<Pipeline>, config: BatcherConfig) -> Self {
        Self { pipeline, config }
    }

    pub async fn run(&self, entries: Vec<ImageEntry>) -> Vec<InputOutcome> {
        // Kept so an input whose task dies still gets an outcome
        let inputs: Vec<(PathBuf, Option<usize>)> = entries
            .iter()
            .map(|e| (e.path.clone(), e.expected))
            .collect();
        let permits = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let mut tasks = JoinSet::new();

        for (index, entry) in entries.into_iter().enumerate() {
            let pipeline = Arc::clone(&self.pipeline);
            let permits = Arc::clone(&permits);

            tasks.spawn(async move {
                // The semaphore is never closed, so acquiring only waits
                let _permit = permits.acquire_owned().await.ok();
                let start = Instant::now();
                let result = pipeline.classify_file(&entry.path, entry.expected).await;
                InputOutcome {
                    index,
                    path: entry.path,
                    expected: entry.expected,
                    latency: start.elapsed(),
                    result,
                }
            });
        }

        // Completions arrive in any order; re-sequence by input position
        let mut slots: Vec<Option<InputOutcome>> = inputs.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    debug!(
                        "Input {} finished in {:.2} ms",
                        outcome.index,
                        outcome.latency.as_secs_f64() * 1000.0
                    );
                    let index = outcome.index;
                    slots[index] = Some(outcome);
                }
                Err(e) => warn!("Batch task did not complete: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(inputs)
            .enumerate()
            .map(|(index, (slot, (path, expected)))| {
                slot.unwrap_or_else(|| InputOutcome {
                    index,
                    path,
                    expected,
                    latency: Duration::ZERO,
                    result: Err(ClassifyError::TaskFailed(
                        "worker task ended without a result".to_string(),
                    )),
                })
            })
            .collect()
    }
}
