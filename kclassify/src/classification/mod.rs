//! Turning class scores into a labelled decision.
//!
//! Models trained on ImageNet come in two flavours: 1000 outputs mapping
//! directly onto the label list, and 1001 outputs where index 0 is a
//! reserved background class. The convention is inferred from the class
//! count; anything else is reported instead of guessed.

pub mod labels;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::ClassifyError;

pub use labels::LabelTable;

/// Numerically stable softmax: `exp(x_i - max(x)) / sum`.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let Some(max) = logits.iter().copied().reduce(f32::max) else {
        return Vec::new();
    };

    let exps: Vec<f64> = logits
        .iter()
        .map(|&x| f64::from(x - max).exp())
        .collect();
    let sum: f64 = exps.iter().sum();

    exps.into_iter().map(|e| (e / sum) as f32).collect()
}

/// Index and value of the maximum; the first occurrence wins ties.
pub fn arg_max(values: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b || v.is_nan() => {}
            None if v.is_nan() => {}
            _ => best = Some((i, v)),
        }
    }
    best
}

/// The `k` highest values in descending order, lower index first on ties.
pub fn top_k(values: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = values
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .collect();
    // Stable sort keeps the lower index first among equal values
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.truncate(k);
    ranked
}

/// How model output indices map onto label table indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOffset {
    /// Output index N is label N
    Direct,
    /// Output index 0 is background; output index N is label N - 1
    Background,
}

impl LabelOffset {
    pub fn infer(class_count: usize, label_count: usize) -> Result<Self, ClassifyError> {
        if class_count == label_count {
            Ok(LabelOffset::Direct)
        } else if class_count == label_count + 1 {
            Ok(LabelOffset::Background)
        } else {
            Err(ClassifyError::UnsupportedClassCount {
                classes: class_count,
                labels: label_count,
            })
        }
    }

    /// Label table index for an output index, `None` for the background slot.
    pub fn label_index(self, class_index: usize) -> Option<usize> {
        match self {
            LabelOffset::Direct => Some(class_index),
            LabelOffset::Background => class_index.checked_sub(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ClassLabel {
    Known { index: usize, name: String },
    /// Reserved background slot or an index outside the label table
    Unknown,
}

impl ClassLabel {
    pub fn index(&self) -> Option<usize> {
        match self {
            ClassLabel::Known { index, .. } => Some(*index),
            ClassLabel::Unknown => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            ClassLabel::Known { name, .. } => Some(name),
            ClassLabel::Unknown => None,
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassLabel::Known { index, name } => write!(f, "{index} {name}"),
            ClassLabel::Unknown => f.write_str("<unknown>"),
        }
    }
}

/// Resolves an output index to a label under the offset convention implied
/// by `class_count`.
pub fn resolve_label(
    index: usize,
    labels: &LabelTable,
    class_count: usize,
) -> Result<ClassLabel, ClassifyError> {
    let offset = LabelOffset::infer(class_count, labels.len())?;
    Ok(offset
        .label_index(index)
        .and_then(|i| labels.get(i).map(|name| (i, name)))
        .map_or(ClassLabel::Unknown, |(index, name)| ClassLabel::Known {
            index,
            name: name.to_string(),
        }))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    /// Index in the model output
    pub class_index: usize,
    pub label: ClassLabel,
    /// Softmax probability of `class_index`
    pub confidence: f32,
}

impl ClassificationResult {
    /// Whether the resolved label is the expected label table entry.
    pub fn matches(&self, expected: usize) -> bool {
        self.label.index() == Some(expected)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub result: ClassificationResult,
    pub expected: usize,
    pub matched: bool,
}

/// Classification decisions against one shared, immutable label table.
#[derive(Debug, Clone)]
pub struct Classifier {
    labels: Arc<LabelTable>,
    top_k: usize,
}

impl Classifier {
    pub fn new(labels: Arc<LabelTable>) -> Self {
        Self { labels, top_k: 1 }
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k.max(1);
        self
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn classify(&self, logits: &[f32]) -> Result<ClassificationResult, ClassifyError> {
        let probabilities = self.probabilities(logits)?;
        let (index, confidence) = arg_max(&probabilities).ok_or_else(|| {
            ClassifyError::malformed("logits", "no finite class score to select")
        })?;
        self.result(index, confidence, logits.len())
    }

    /// The best `top_k` classes, best first.
    pub fn rank(&self, logits: &[f32]) -> Result<Vec<ClassificationResult>, ClassifyError> {
        let probabilities = self.probabilities(logits)?;
        let ranked = top_k(&probabilities, self.top_k);
        if ranked.is_empty() {
            return Err(ClassifyError::malformed(
                "logits",
                "no finite class score to select",
            ));
        }
        ranked
            .into_iter()
            .map(|(index, confidence)| self.result(index, confidence, logits.len()))
            .collect()
    }

    pub fn compare(&self, logits: &[f32], expected: usize) -> Result<Comparison, ClassifyError> {
        let result = self.classify(logits)?;
        let matched = result.matches(expected);
        Ok(Comparison {
            result,
            expected,
            matched,
        })
    }

    fn probabilities(&self, logits: &[f32]) -> Result<Vec<f32>, ClassifyError> {
        // Check the convention before doing any work
        LabelOffset::infer(logits.len(), self.labels.len())?;
        if logits.is_empty() {
            return Err(ClassifyError::malformed("logits", "empty class vector"));
        }
        Ok(softmax(logits))
    }

    fn result(
        &self,
        index: usize,
        confidence: f32,
        class_count: usize,
    ) -> Result<ClassificationResult, ClassifyError> {
        Ok(ClassificationResult {
            class_index: index,
            label: resolve_label(index, &self.labels, class_count)?,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imagenet_like(n: usize) -> LabelTable {
        LabelTable::new((0..n).map(|i| format!("class_{i}")).collect())
    }

    fn sum(values: &[f32]) -> f64 {
        values.iter().map(|&v| f64::from(v)).sum()
    }

    #[test]
    fn test_softmax_is_a_distribution() {
        let logits = [1.0, -2.0, 0.5, 3.0, 3.0, -7.25];
        let probs = softmax(&logits);
        assert!(probs.iter().all(|&p| p >= 0.0));
        assert!((sum(&probs) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_softmax_is_shift_invariant() {
        let logits = [0.3, -1.2, 2.5, 0.0];
        let shifted: Vec<f32> = logits.iter().map(|x| x + 100.0).collect();
        let a = softmax(&logits);
        let b = softmax(&shifted);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_softmax_handles_large_magnitudes() {
        let logits = [1000.0, 999.0, -1000.0];
        let probs = softmax(&logits);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!((sum(&probs) - 1.0).abs() < 1e-6);
        assert!(probs[0] > probs[1]);
    }

    #[test]
    fn test_softmax_of_long_vector_sums_to_one() {
        let logits: Vec<f32> = (0..1001).map(|i| ((i * 37) % 101) as f32 / 7.0).collect();
        let probs = softmax(&logits);
        assert!((sum(&probs) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_arg_max_first_maximum_wins() {
        assert_eq!(arg_max(&[0.2, 0.5, 0.5, 0.1]), Some((1, 0.5)));
        assert_eq!(arg_max(&[]), None);
        assert_eq!(arg_max(&[f32::NAN, 0.1]), Some((1, 0.1)));
    }

    #[test]
    fn test_top_k_order_and_ties() {
        let ranked = top_k(&[0.1, 0.4, 0.4, 0.1], 3);
        assert_eq!(ranked, vec![(1, 0.4), (2, 0.4), (0, 0.1)]);
        assert_eq!(top_k(&[0.5], 5).len(), 1);
    }

    #[test]
    fn test_resolve_label_direct() {
        let table = imagenet_like(1000);
        let label = resolve_label(5, &table, 1000).unwrap();
        assert_eq!(label.name(), table.get(5));
        assert_eq!(label.index(), Some(5));
    }

    #[test]
    fn test_resolve_label_background_offset() {
        let table = imagenet_like(1000);
        let label = resolve_label(5, &table, 1001).unwrap();
        assert_eq!(label.name(), table.get(4));
        assert_eq!(resolve_label(0, &table, 1001).unwrap(), ClassLabel::Unknown);
    }

    #[test]
    fn test_resolve_label_unsupported_class_count() {
        let table = imagenet_like(1000);
        match resolve_label(5, &table, 10) {
            Err(ClassifyError::UnsupportedClassCount { classes, labels }) => {
                assert_eq!(classes, 10);
                assert_eq!(labels, 1000);
            }
            other => panic!("Expected UnsupportedClassCount, got {other:?}"),
        }
        assert!(resolve_label(5, &table, 1002).is_err());
    }

    #[test]
    fn test_classify_one_hot_logits() {
        let classifier = Classifier::new(Arc::new(imagenet_like(1000)));
        let mut logits = vec![0.0; 1000];
        logits[417] = 10.0;

        let result = classifier.classify(&logits).unwrap();
        assert_eq!(result.class_index, 417);
        assert_eq!(result.label.name(), Some("class_417"));
        // e^10 / (e^10 + 999)
        assert!((result.confidence - 0.956_613).abs() < 1e-4);
    }

    #[test]
    fn test_classify_background_model() {
        let classifier = Classifier::new(Arc::new(imagenet_like(1000)));
        let mut logits = vec![0.0; 1001];
        logits[418] = 20.0;

        let result = classifier.classify(&logits).unwrap();
        assert_eq!(result.class_index, 418);
        assert_eq!(result.label.index(), Some(417));
        assert!(result.confidence > 0.999);
    }

    #[test]
    fn test_rank_returns_top_k() {
        let classifier = Classifier::new(Arc::new(imagenet_like(4))).with_top_k(2);
        let ranked = classifier.rank(&[0.0, 3.0, 1.0, 2.0]).unwrap();
        let indices: Vec<usize> = ranked.iter().map(|r| r.class_index).collect();
        assert_eq!(indices, vec![1, 3]);
        assert!(ranked[0].confidence > ranked[1].confidence);
    }

    #[test]
    fn test_compare_reports_match() {
        let classifier = Classifier::new(Arc::new(imagenet_like(3)));
        let logits = [0.0, 0.0, 5.0, 0.0];

        let hit = classifier.compare(&logits, 1).unwrap();
        assert!(hit.matched);
        assert_eq!(hit.result.class_index, 2);

        let miss = classifier.compare(&logits, 2).unwrap();
        assert!(!miss.matched);
    }

    #[test]
    fn test_classify_rejects_mismatched_class_count() {
        let classifier = Classifier::new(Arc::new(imagenet_like(1000)));
        assert!(matches!(
            classifier.classify(&[0.0; 10]),
            Err(ClassifyError::UnsupportedClassCount { .. })
        ));
    }
}
