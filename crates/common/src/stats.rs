//! Document usage statistics (views and file downloads)

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const RECORD_VIEW: &str = "record-view";
pub const FILE_DOWNLOAD: &str = "file-download";

/// Body of the stats request for one document
pub fn stats_query(pid: &str, bucket_id: &str) -> Value {
    json!({
        RECORD_VIEW: {
            "stat": RECORD_VIEW,
            "params": {"pid_value": pid, "pid_type": "doc"}
        },
        FILE_DOWNLOAD: {
            "stat": FILE_DOWNLOAD,
            "params": {"bucket_id": bucket_id}
        }
    })
}

#[derive(Debug, Deserialize)]
struct Bucket {
    key: String,
    #[serde(default)]
    unique_count: u64,
}

#[derive(Debug, Deserialize)]
struct Downloads {
    #[serde(default)]
    buckets: Vec<Bucket>,
}

#[derive(Debug, Deserialize)]
struct Views {
    #[serde(default)]
    unique_count: u64,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    #[serde(rename = "record-view")]
    record_view: Option<Views>,
    #[serde(rename = "file-download")]
    file_download: Option<Downloads>,
}

/// Unique counts keyed by file key, plus `record-view` for the document itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageStats(BTreeMap<String, u64>);

impl UsageStats {
    pub fn from_response(response: Value) -> Result<Self> {
        let response: StatsResponse = serde_json::from_value(response)?;
        let views = response.record_view.ok_or_else(|| AppError::MissingField {
            field: RECORD_VIEW.to_string(),
        })?;

        let mut counts = BTreeMap::new();
        for bucket in response.file_download.map(|d| d.buckets).unwrap_or_default() {
            counts.insert(bucket.key, bucket.unique_count);
        }
        counts.insert(RECORD_VIEW.to_string(), views.unique_count);
        Ok(Self(counts))
    }

    pub fn views(&self) -> u64 {
        self.0.get(RECORD_VIEW).copied().unwrap_or_default()
    }

    pub fn downloads(&self, key: &str) -> u64 {
        self.0.get(key).copied().unwrap_or_default()
    }

    /// Keep only the given file keys and the view count
    pub fn retain_keys(mut self, keys: &[&str]) -> Self {
        self.0.retain(|k, _| k == RECORD_VIEW || keys.contains(&k.as_str()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_shape() {
        let query = stats_query("42", "b-1");
        assert_eq!(query["record-view"]["params"]["pid_type"], "doc");
        assert_eq!(query["record-view"]["params"]["pid_value"], "42");
        assert_eq!(query["file-download"]["params"]["bucket_id"], "b-1");
    }

    #[test]
    fn test_fold_response() {
        let stats = UsageStats::from_response(json!({
            "record-view": {"unique_count": 12, "count": 30},
            "file-download": {"buckets": [
                {"key": "thesis.pdf", "unique_count": 7},
                {"key": "data.csv", "unique_count": 1}
            ]}
        }))
        .unwrap();

        assert_eq!(stats.views(), 12);
        assert_eq!(stats.downloads("thesis.pdf"), 7);
        assert_eq!(stats.downloads("missing"), 0);

        let only_main = stats.retain_keys(&["thesis.pdf"]);
        assert_eq!(
            serde_json::to_value(&only_main).unwrap(),
            json!({"record-view": 12, "thesis.pdf": 7})
        );
    }

    #[test]
    fn test_downloads_optional_views_required() {
        let stats = UsageStats::from_response(json!({
            "record-view": {"unique_count": 3},
            "file-download": null
        }))
        .unwrap();
        assert_eq!(stats.views(), 3);

        assert!(UsageStats::from_response(json!({})).is_err());
    }
}
