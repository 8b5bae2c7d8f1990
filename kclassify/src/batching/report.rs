use std::path::Path;

use serde::Serialize;

use crate::batching::queue::InputOutcome;
use crate::classification::{ClassificationResult, LabelTable};
use crate::pipeline::Decision;

#[derive(Serialize)]
struct Record<'a> {
    index: usize,
    path: &'a Path,
    expected: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decision: Option<&'a Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// One JSON object per input.
pub fn render_json(outcome: &InputOutcome) -> serde_json::Result<String> {
    serde_json::to_string(&Record {
        index: outcome.index,
        path: &outcome.path,
        expected: outcome.expected,
        decision: outcome.result.as_ref().ok(),
        error: outcome.result.as_ref().err().map(|e| e.to_string()),
    })
}

/// Human-readable lines for one input: the best class, a mismatch note when
/// an expected index was given, then any further ranked classes.
pub fn render_text(outcome: &InputOutcome, labels: &LabelTable) -> String {
    let decision = match &outcome.result {
        Ok(decision) => decision,
        Err(e) => return format!("input {}: {}", outcome.path.display(), e),
    };

    let mut text = format!(
        "{} classified as {}",
        outcome.path.display(),
        describe(decision.best())
    );
    if let (Some(expected), Some(false)) = (outcome.expected, decision.matched) {
        let name = labels.get(expected).unwrap_or("<unknown>");
        text.push_str(&format!("; should be {expected} {name}"));
    }
    for (rank, result) in decision.ranked.iter().enumerate().skip(1) {
        text.push_str(&format!("\n  {}. {}", rank + 1, describe(result)));
    }
    text
}

/// Whether every input produced a decision.
pub fn all_succeeded(outcomes: &[InputOutcome]) -> bool {
    outcomes.iter().all(|o| o.result.is_ok())
}

fn describe(result: &ClassificationResult) -> String {
    format!(
        "{} ({:.2}%) [output {}]",
        result.label,
        result.confidence * 100.0,
        result.class_index
    )
}
