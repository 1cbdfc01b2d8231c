//! Filtering of a file selection before upload

use super::{MAX_FILES, MAX_FILE_SIZE_MB};

/// A file chosen for upload
pub trait NamedFile {
    fn file_name(&self) -> &str;
    fn size(&self) -> u64;
}

/// Limits applied to a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionLimits {
    pub max_files: usize,
    pub max_file_size: u64,
}

impl Default for SelectionLimits {
    fn default() -> Self {
        Self {
            max_files: MAX_FILES,
            max_file_size: MAX_FILE_SIZE_MB * 1024 * 1024,
        }
    }
}

/// Outcome of [`filter_selection`]
#[derive(Debug)]
pub struct Selection<T> {
    /// Files to upload, in selection order
    pub accepted: Vec<T>,
    /// Names already present on the record (or repeated in the selection)
    pub duplicates: Vec<String>,
    /// Names larger than the size limit
    pub oversized: Vec<String>,
    /// Names dropped because the record would exceed the file count limit
    pub over_limit: Vec<String>,
}

impl<T> Selection<T> {
    /// Whether anything was filtered out and the user should be told
    pub fn has_rejections(&self) -> bool {
        !(self.duplicates.is_empty() && self.oversized.is_empty() && self.over_limit.is_empty())
    }
}

/// Drop files whose name already exists, oversized files, and anything beyond
/// the remaining file capacity. Rejections never block the other files.
pub fn filter_selection<T: NamedFile>(
    existing_keys: &[&str],
    selected: Vec<T>,
    limits: SelectionLimits,
) -> Selection<T> {
    let mut accepted: Vec<T> = Vec::with_capacity(selected.len());
    let mut duplicates = Vec::new();
    let mut oversized = Vec::new();

    for file in selected {
        let name = file.file_name();
        if existing_keys.contains(&name) || accepted.iter().any(|f| f.file_name() == name) {
            duplicates.push(name.to_string());
        } else if file.size() > limits.max_file_size {
            oversized.push(name.to_string());
        } else {
            accepted.push(file);
        }
    }

    let capacity = limits.max_files.saturating_sub(existing_keys.len());
    let over_limit = if accepted.len() > capacity {
        accepted
            .split_off(capacity)
            .iter()
            .map(|f| f.file_name().to_string())
            .collect()
    } else {
        Vec::new()
    };

    if !duplicates.is_empty() {
        tracing::info!(files = ?duplicates, "This filename already exists");
    }

    Selection {
        accepted,
        duplicates,
        oversized,
        over_limit,
    }
}
