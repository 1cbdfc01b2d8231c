//! File list reconciliation
//!
//! The backend lists every version of every file as a flat list. The editor
//! works on one entry per key (the head) carrying its older versions.

use super::{FileEntry, FileView};
use std::collections::HashMap;

/// Merge raw file entries into head files with nested version history.
///
/// Only entries whose metadata type is `file` are kept. Versions are sorted by
/// creation time ascending and heads by their record order ascending; both
/// sorts are stable and entries without an order go last.
pub fn reconcile(entries: Vec<FileEntry>) -> Vec<FileView> {
    let mut versions: HashMap<String, Vec<FileEntry>> = HashMap::new();
    let mut heads: Vec<FileEntry> = Vec::new();

    for entry in entries.into_iter().filter(FileEntry::is_file) {
        if entry.is_head {
            if heads.iter().any(|head| head.key == entry.key) {
                tracing::warn!(key = %entry.key, "Duplicate head entry ignored");
                continue;
            }
            heads.push(entry);
        } else {
            versions.entry(entry.key.clone()).or_default().push(entry);
        }
    }

    let mut views: Vec<FileView> = heads
        .into_iter()
        .map(|head| {
            let mut history = versions.remove(&head.key).unwrap_or_default();
            history.sort_by_key(FileEntry::created);
            FileView {
                head,
                versions: history,
            }
        })
        .collect();

    views.sort_by_key(|view| view.head.order().unwrap_or(i64::MAX));

    tracing::debug!(
        files = views.len(),
        orphan_keys = versions.len(),
        "Reconciled file list"
    );

    views
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::{entry, FileMetadata};

    fn keys(views: &[FileView]) -> Vec<&str> {
        views.iter().map(FileView::key).collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(reconcile(vec![]).is_empty());
    }

    #[test]
    fn test_heads_ordered_with_versions() {
        let views = reconcile(vec![
            entry("a", true, Some(2), Some(2)),
            entry("a", false, None, Some(1)),
            entry("b", true, Some(1), Some(3)),
        ]);

        assert_eq!(keys(&views), vec!["b", "a"]);
        assert!(views[0].versions.is_empty());
        assert_eq!(views[1].versions.len(), 1);
        assert_eq!(views[1].versions[0].created(), entry("a", false, None, Some(1)).created());
    }

    #[test]
    fn test_versions_sorted_and_exclude_heads() {
        let views = reconcile(vec![
            entry("a", false, None, Some(30)),
            entry("a", true, Some(1), Some(40)),
            entry("a", false, None, Some(10)),
            entry("a", false, None, Some(20)),
        ]);

        assert_eq!(views.len(), 1);
        let created: Vec<_> = views[0]
            .versions
            .iter()
            .map(|v| v.created().unwrap().timestamp())
            .collect();
        assert_eq!(created, vec![10, 20, 30]);
        assert!(views[0].versions.iter().all(|v| !v.is_head));
    }

    #[test]
    fn test_non_file_entries_discarded() {
        let mut thumbnail = entry("a.jpg", true, Some(1), Some(1));
        if let Some(metadata) = thumbnail.metadata.as_mut() {
            metadata.file_type = Some("thumbnail".into());
        }
        let mut unknown = entry("c", true, Some(3), Some(1));
        unknown.metadata = None;

        let views = reconcile(vec![thumbnail, unknown, entry("b", true, Some(2), Some(1))]);
        assert_eq!(keys(&views), vec!["b"]);
    }

    #[test]
    fn test_one_view_per_key() {
        let views = reconcile(vec![
            entry("a", true, Some(1), Some(1)),
            entry("a", true, Some(5), Some(2)),
            entry("b", true, Some(2), Some(1)),
        ]);
        assert_eq!(keys(&views), vec!["a", "b"]);
        assert_eq!(views[0].head.order(), Some(1));
    }

    #[test]
    fn test_versions_without_head_dropped() {
        let views = reconcile(vec![
            entry("gone", false, None, Some(1)),
            entry("a", true, Some(1), Some(1)),
        ]);
        assert_eq!(keys(&views), vec!["a"]);
    }

    #[test]
    fn test_missing_order_sorts_last_and_ties_are_stable() {
        let mut unordered = entry("z", true, None, Some(1));
        unordered.metadata = Some(FileMetadata {
            key: "z".into(),
            file_type: Some("file".into()),
            ..FileMetadata::default()
        });
        let views = reconcile(vec![
            unordered,
            entry("x", true, Some(1), Some(1)),
            entry("y", true, Some(1), Some(1)),
        ]);
        assert_eq!(keys(&views), vec!["x", "y", "z"]);
    }
}
