//! Record-level file metadata: labels, display order and public listing

use super::FileMetadata;
use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Assign `order = position + 1` to the record files, following `ordered_keys`.
///
/// `ordered_keys` must name every file of the record exactly once.
pub fn reorder(record_files: &mut [FileMetadata], ordered_keys: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(ordered_keys.len());
    for key in ordered_keys {
        if !record_files.iter().any(|f| &f.key == key) {
            return Err(AppError::FileNotFound { key: key.clone() });
        }
        if !seen.insert(key.as_str()) {
            return Err(AppError::Validation {
                message: format!("File {} is listed more than once", key),
                field: Some("keys".to_string()),
            });
        }
    }
    let missing: Vec<&str> = record_files
        .iter()
        .filter(|f| f.is_file() && !seen.contains(f.key.as_str()))
        .map(|f| f.key.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Validation {
            message: format!("New order is missing files: {}", missing.join(", ")),
            field: Some("keys".to_string()),
        });
    }
    for (index, key) in ordered_keys.iter().enumerate() {
        if let Some(file) = record_files.iter_mut().find(|f| &f.key == key) {
            file.order = Some(index as i64 + 1);
        }
    }
    Ok(())
}

/// Set the trimmed label of a record file
pub fn update_label(record_files: &mut [FileMetadata], key: &str, label: &str) -> Result<()> {
    let file = record_files
        .iter_mut()
        .find(|f| f.key == key)
        .ok_or_else(|| AppError::FileNotFound {
            key: key.to_string(),
        })?;
    file.label = Some(label.trim().to_string());
    Ok(())
}

/// A downloadable file shown on the public document page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicFile {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    pub download: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// Files other than the main one (order 1), one per key, sorted by label
pub fn other_files(record_files: &[FileMetadata]) -> Vec<PublicFile> {
    let mut by_key: HashMap<&str, PublicFile> = HashMap::new();

    for file in record_files {
        if !file.is_file() || file.order == Some(1) {
            continue;
        }
        let Some(links) = file.links.as_ref() else {
            continue;
        };
        let Some(download) = links.download.clone() else {
            continue;
        };
        by_key.insert(
            file.key.as_str(),
            PublicFile {
                label: file.label.clone().unwrap_or_else(|| file.key.clone()),
                mimetype: file.mimetype.clone(),
                download,
                preview: links.preview.clone(),
                thumbnail: file.thumbnail.clone(),
            },
        );
    }

    let mut files: Vec<PublicFile> = by_key.into_values().collect();
    files.sort_by(|a, b| natural_cmp(&a.label, &b.label));
    files
}

/// Case-insensitive label filter; an empty filter keeps everything
pub fn filter_by_label<'a>(files: &'a [PublicFile], text: &str) -> Vec<&'a PublicFile> {
    if text.is_empty() {
        return files.iter().collect();
    }
    let needle = text.to_lowercase();
    files
        .iter()
        .filter(|f| f.label.to_lowercase().contains(&needle))
        .collect()
}

/// Compare labels with digit runs ordered numerically ("file2" < "file10")
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_num = take_digits(&mut left);
                let r_num = take_digits(&mut right);
                let l_trim = l_num.trim_start_matches('0');
                let r_trim = r_num.trim_start_matches('0');
                let ord = l_trim
                    .len()
                    .cmp(&r_trim.len())
                    .then_with(|| l_trim.cmp(r_trim));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                let ord = l.to_lowercase().cmp(r.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::FileLinks;

    fn record_file(key: &str, order: i64, label: Option<&str>) -> FileMetadata {
        FileMetadata {
            key: key.into(),
            file_type: Some("file".into()),
            order: Some(order),
            label: label.map(str::to_string),
            links: Some(FileLinks {
                self_link: None,
                download: Some(format!("/documents/1/files/{key}")),
                preview: None,
            }),
            ..FileMetadata::default()
        }
    }

    #[test]
    fn test_reorder() {
        let mut files = vec![record_file("a", 1, None), record_file("b", 2, None)];
        reorder(&mut files, &["b".to_string(), "a".to_string()]).unwrap();
        assert_eq!(files[0].order, Some(2));
        assert_eq!(files[1].order, Some(1));
    }

    #[test]
    fn test_reorder_unknown_key_leaves_record_untouched() {
        let mut files = vec![record_file("a", 1, None)];
        let err = reorder(&mut files, &["b".to_string(), "a".to_string()]).unwrap_err();
        assert!(matches!(err, AppError::FileNotFound { .. }));
        assert_eq!(files[0].order, Some(1));
    }

    #[test]
    fn test_reorder_requires_every_file() {
        let mut files = vec![
            record_file("a", 1, None),
            record_file("b", 2, None),
            record_file("c", 3, None),
        ];
        let err = reorder(&mut files, &["c".to_string()]).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(err.to_string(), "Validation failed: New order is missing files: a, b");
        assert_eq!(files[2].order, Some(3));
    }

    #[test]
    fn test_reorder_rejects_repeated_keys() {
        let mut files = vec![record_file("a", 1, None), record_file("b", 2, None)];
        let keys = ["a".to_string(), "a".to_string(), "b".to_string()];
        let err = reorder(&mut files, &keys).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(files[0].order, Some(1));
        assert_eq!(files[1].order, Some(2));
    }

    #[test]
    fn test_reorder_ignores_non_file_entries() {
        let mut thumbnail = record_file("a.jpg", 3, None);
        thumbnail.file_type = Some("thumbnail".into());
        let mut files = vec![record_file("a", 1, None), record_file("b", 2, None), thumbnail];
        reorder(&mut files, &["b".to_string(), "a".to_string()]).unwrap();
        assert_eq!(files[1].order, Some(1));
        assert_eq!(files[2].order, Some(3));
    }

    #[test]
    fn test_update_label_trims() {
        let mut files = vec![record_file("a", 1, None)];
        update_label(&mut files, "a", "  Appendix  ").unwrap();
        assert_eq!(files[0].label.as_deref(), Some("Appendix"));
        assert!(update_label(&mut files, "zz", "x").is_err());
    }

    #[test]
    fn test_other_files_skip_main_and_sort_naturally() {
        let mut thumbnail = record_file("cover.jpg", 5, None);
        thumbnail.file_type = Some("thumbnail".into());
        let files = vec![
            record_file("main.pdf", 1, None),
            record_file("annex10.pdf", 2, Some("Annex 10")),
            record_file("annex2.pdf", 3, Some("Annex 2")),
            record_file("data.csv", 4, None),
            thumbnail,
        ];

        let listed = other_files(&files);
        let labels: Vec<&str> = listed.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["Annex 2", "Annex 10", "data.csv"]);
    }

    #[test]
    fn test_filter_by_label() {
        let files = other_files(&[
            record_file("a", 2, Some("Raw Data")),
            record_file("b", 3, Some("Slides")),
        ]);
        assert_eq!(filter_by_label(&files, "data").len(), 1);
        assert_eq!(filter_by_label(&files, "").len(), 2);
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("file2", "file10"), Ordering::Less);
        assert_eq!(natural_cmp("File", "file"), Ordering::Less);
        assert_eq!(natural_cmp("b", "A"), Ordering::Greater);
        assert_eq!(natural_cmp("v01", "v1"), Ordering::Less);
    }
}
