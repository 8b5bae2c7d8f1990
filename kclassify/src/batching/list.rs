use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ClassifyError;

/// One line of an images list: a file and, optionally, the label index it
/// is expected to classify as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub path: PathBuf,
    pub expected: Option<usize>,
}

impl ImageEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            expected: None,
        }
    }
}

/// Parses `<path> [expected index]` lines. Blank lines and lines starting
/// with `#` are skipped.
pub fn parse_image_list(text: &str) -> Result<Vec<ImageEntry>, ClassifyError> {
    let mut entries = Vec::new();

    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let path = match fields.next() {
            Some(p) => PathBuf::from(p),
            None => continue,
        };
        let expected = match fields.next() {
            Some(raw) => Some(raw.parse::<usize>().map_err(|_| {
                ClassifyError::Config(format!(
                    "images list line {}: invalid expected label index '{}'",
                    number + 1,
                    raw
                ))
            })?),
            None => None,
        };
        if let Some(extra) = fields.next() {
            return Err(ClassifyError::Config(format!(
                "images list line {}: unexpected field '{}'",
                number + 1,
                extra
            )));
        }

        entries.push(ImageEntry { path, expected });
    }

    Ok(entries)
}

pub fn load_image_list(path: impl AsRef<Path>) -> Result<Vec<ImageEntry>, ClassifyError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        ClassifyError::Config(format!("cannot read images list {}: {}", path.display(), e))
    })?;
    let entries = parse_image_list(&text)?;
    debug!("Loaded {} entries from {}", entries.len(), path.display());
    Ok(entries)
}
