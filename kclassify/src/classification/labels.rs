use std::path::Path;

use tracing::debug;

use crate::error::ClassifyError;

/// Ordered class names; line N of the source is class N.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// One label per line. Trailing line endings are stripped; empty lines
    /// keep their slot so indices stay aligned with line numbers.
    pub fn from_text(text: &str) -> Self {
        let mut labels: Vec<String> = text
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect();
        // A final newline does not add a class
        while labels.last().is_some_and(|l| l.is_empty()) {
            labels.pop();
        }
        Self { labels }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifyError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let table = Self::from_text(&text);
        debug!("Loaded {} labels from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }
}
