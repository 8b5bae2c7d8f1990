use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::batching::queue::InputOutcome;

/// Aggregate view of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Successful inputs that carried an expected label index
    pub compared: usize,
    pub matched: usize,
    pub mean_latency_ms: f64,
    pub p50_latency_ms: f64,
    pub p90_latency_ms: f64,
    pub max_latency_ms: f64,
    pub wall_time_ms: f64,
    pub throughput: f64,
}

impl RunSummary {
    pub fn from_outcomes(outcomes: &[InputOutcome], wall: Duration) -> Self {
        let mut succeeded = 0;
        let mut compared = 0;
        let mut matched = 0;
        for outcome in outcomes {
            if let Ok(decision) = &outcome.result {
                succeeded += 1;
                if let Some(m) = decision.matched {
                    compared += 1;
                    if m {
                        matched += 1;
                    }
                }
            }
        }

        let mut latencies: Vec<f64> = outcomes
            .iter()
            .map(|o| o.latency.as_secs_f64() * 1000.0)
            .collect();
        latencies.sort_by(|a, b| a.total_cmp(b));

        let mean = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        };
        let wall_secs = wall.as_secs_f64();
        let throughput = if wall_secs > 0.0 {
            outcomes.len() as f64 / wall_secs
        } else {
            0.0
        };

        Self {
            total: outcomes.len(),
            succeeded,
            failed: outcomes.len() - succeeded,
            compared,
            matched,
            mean_latency_ms: mean,
            p50_latency_ms: percentile(&latencies, 50.0),
            p90_latency_ms: percentile(&latencies, 90.0),
            max_latency_ms: latencies.last().copied().unwrap_or(0.0),
            wall_time_ms: wall_secs * 1000.0,
            throughput,
        }
    }

    /// Fraction of compared inputs whose top-1 matched, if any were compared.
    pub fn accuracy(&self) -> Option<f64> {
        if self.compared == 0 {
            None
        } else {
            Some(self.matched as f64 / self.compared as f64)
        }
    }
}

// Nearest-rank percentile over sorted values
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inputs: {} succeeded, {} failed",
            self.total, self.succeeded, self.failed
        )?;
        if let Some(accuracy) = self.accuracy() {
            write!(
                f,
                "; {}/{} matched ({:.2}%)",
                self.matched,
                self.compared,
                accuracy * 100.0
            )?;
        }
        write!(
            f,
            "\nlatency ms: mean {:.2}, p50 {:.2}, p90 {:.2}, max {:.2}; {:.2} inputs/s",
            self.mean_latency_ms,
            self.p50_latency_ms,
            self.p90_latency_ms,
            self.max_latency_ms,
            self.throughput
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::{ClassLabel, ClassificationResult};
    use crate::error::ClassifyError;
    use crate::pipeline::Decision;
    use std::path::PathBuf;

    fn outcome(index: usize, latency_ms: u64, matched: Option<bool>) -> InputOutcome {
        let best = ClassificationResult {
            class_index: 1,
            label: ClassLabel::Known {
                index: 1,
                name: "goldfish".to_string(),
            },
            confidence: 0.9,
        };
        InputOutcome {
            index,
            path: PathBuf::from(format!("{index}.jpeg")),
            expected: matched.map(|_| 1),
            latency: Duration::from_millis(latency_ms),
            result: Ok(Decision {
                ranked: vec![best],
                matched,
            }),
        }
    }

    fn failure(index: usize, latency_ms: u64) -> InputOutcome {
        InputOutcome {
            index,
            path: PathBuf::from("broken.jpeg"),
            expected: Some(3),
            latency: Duration::from_millis(latency_ms),
            result: Err(ClassifyError::TransportFailure("connection refused".into())),
        }
    }

    #[test]
    fn test_counts_and_accuracy() {
        let outcomes = vec![
            outcome(0, 10, Some(true)),
            outcome(1, 20, Some(false)),
            outcome(2, 30, None),
            failure(3, 40),
            outcome(4, 50, Some(true)),
        ];
        let summary = RunSummary::from_outcomes(&outcomes, Duration::from_millis(500));

        assert_eq!(summary.total, 5);
        assert_eq!(summary.succeeded, 4);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.compared, 3);
        assert_eq!(summary.matched, 2);
        assert!((summary.accuracy().unwrap() - 2.0 / 3.0).abs() < 1e-9);
        assert!((summary.throughput - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_latency_percentiles() {
        let outcomes: Vec<InputOutcome> =
            (1..=10).map(|i| outcome(i as usize, i * 10, None)).collect();
        let summary = RunSummary::from_outcomes(&outcomes, Duration::from_secs(1));

        assert!((summary.mean_latency_ms - 55.0).abs() < 1e-6);
        assert!((summary.p50_latency_ms - 50.0).abs() < 1e-6);
        assert!((summary.p90_latency_ms - 90.0).abs() < 1e-6);
        assert!((summary.max_latency_ms - 100.0).abs() < 1e-6);
        assert_eq!(summary.accuracy(), None);
    }

    #[test]
    fn test_empty_run() {
        let summary = RunSummary::from_outcomes(&[], Duration::ZERO);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.p90_latency_ms, 0.0);
        assert_eq!(summary.throughput, 0.0);
        assert!(summary.to_string().starts_with("0 inputs"));
    }

    #[test]
    fn test_display() {
        let outcomes = vec![outcome(0, 10, Some(true)), failure(1, 30)];
        let text = RunSummary::from_outcomes(&outcomes, Duration::from_secs(1)).to_string();
        assert!(text.contains("2 inputs: 1 succeeded, 1 failed"));
        assert!(text.contains("1/1 matched (100.00%)"));
        assert!(text.contains("max 30.00"));
    }
}
