//! Mapping of PDF metadata extraction results

use super::ImportResult;
use serde_json::{json, Map, Value};

/// Fields copied verbatim from an extraction result
const METADATA_FIELDS: [&str; 5] = ["title", "documentDate", "publication", "abstracts", "language"];

/// Language assumed for an abstract when the extraction found none
const DEFAULT_LANGUAGE: &str = "eng";

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| match v {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

/// Normalize an extraction result.
///
/// Returns `None` when the backend reported that nothing could be extracted
/// (`false`) or the result is not an object.
pub fn map_pdf_extraction(result: &Value) -> Option<ImportResult> {
    let fields = result.as_object()?;
    let first_language = fields
        .get("languages")
        .and_then(Value::as_array)
        .and_then(|languages| languages.first())
        .and_then(Value::as_str);

    let mut metadata = Map::new();
    for field in METADATA_FIELDS {
        if let Some(value) = present(fields.get(field)) {
            metadata.insert(field.to_string(), value.clone());
        }
    }

    if !metadata.contains_key("abstracts") {
        if let Some(text) = present(fields.get("abstract")) {
            metadata.insert(
                "abstracts".to_string(),
                json!([{
                    "language": first_language.unwrap_or(DEFAULT_LANGUAGE),
                    "abstract": text,
                }]),
            );
        }
    }

    if !metadata.contains_key("language") {
        if let Some(language) = first_language {
            metadata.insert("language".to_string(), Value::String(language.to_string()));
        }
    }

    let contributors = present(fields.get("authors")).map(|authors| json!({ "contributors": authors }));

    Some(ImportResult {
        metadata: Some(metadata).filter(|m| !m.is_empty()),
        contributors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_failure() {
        assert!(map_pdf_extraction(&json!(false)).is_none());
        assert!(map_pdf_extraction(&Value::Null).is_none());
    }

    #[test]
    fn test_allow_list() {
        let import = map_pdf_extraction(&json!({
            "title": "On Glaciers",
            "documentDate": "2021",
            "publication": {"publishedIn": "Nature"},
            "pages": "12",
            "subject": "ignored"
        }))
        .unwrap();

        let metadata = import.metadata.unwrap();
        assert_eq!(metadata.len(), 3);
        assert_eq!(metadata["title"], "On Glaciers");
        assert!(!metadata.contains_key("pages"));
        assert!(import.contributors.is_none());
    }

    #[test]
    fn test_singular_abstract_and_languages() {
        let import = map_pdf_extraction(&json!({
            "abstract": "Summary",
            "languages": ["fre", "eng"]
        }))
        .unwrap();

        let metadata = import.metadata.unwrap();
        assert_eq!(metadata["abstracts"], json!([{"language": "fre", "abstract": "Summary"}]));
        assert_eq!(metadata["language"], "fre");
    }

    #[test]
    fn test_abstract_defaults_to_english() {
        let import = map_pdf_extraction(&json!({"abstract": "Summary"})).unwrap();
        let metadata = import.metadata.unwrap();
        assert_eq!(metadata["abstracts"][0]["language"], "eng");
        assert!(!metadata.contains_key("language"));
    }

    #[test]
    fn test_authors_become_contributors_update() {
        let import = map_pdf_extraction(&json!({
            "title": "",
            "authors": [{"name": "Doe, J."}]
        }))
        .unwrap();

        assert!(import.metadata.is_none());
        assert_eq!(
            import.contributors,
            Some(json!({"contributors": [{"name": "Doe, J."}]}))
        );
    }
}
