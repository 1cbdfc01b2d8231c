//! Local PDF metadata extraction
//!
//! Reads the document information dictionary, the catalog language and the
//! text of the first page using lopdf, and builds a result shaped like the
//! backend's `extract_pdf_metadata` response.

use crate::errors::ImportError;
use lopdf::{Dictionary, Document, Object};
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{debug, warn};

/// Longest first-page text block accepted as a title
const MAX_TITLE_LEN: usize = 300;

/// Load a PDF file and extract its metadata
pub fn extract_metadata_from_file(path: &Path) -> Result<Value, ImportError> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    let doc = Document::load(path).map_err(|e| ImportError::PdfParse {
        path: path.display().to_string(),
        message: format!("Failed to load PDF: {}", e),
    })?;
    Ok(extract_metadata(&doc))
}

/// Extraction result of a loaded document; `false` when nothing was found
pub fn extract_metadata(doc: &Document) -> Value {
    let info = trailer_dictionary(doc, b"Info");
    let mut result = Map::new();

    let title = info
        .and_then(|info| text_entry(info, b"Title"))
        .or_else(|| first_page_title(doc));
    if let Some(title) = title {
        result.insert("title".into(), Value::String(title));
    }

    if let Some(date) = info
        .and_then(|info| text_entry(info, b"CreationDate"))
        .and_then(|raw| document_date(&raw))
    {
        result.insert("documentDate".into(), Value::String(date));
    }

    if let Some(subject) = info.and_then(|info| text_entry(info, b"Subject")) {
        result.insert("abstract".into(), Value::String(subject));
    }

    if let Some(language) = trailer_dictionary(doc, b"Root")
        .and_then(|catalog| text_entry(catalog, b"Lang"))
        .and_then(|tag| language_code(&tag))
    {
        result.insert("languages".into(), json!([language]));
    }

    let authors = info
        .and_then(|info| text_entry(info, b"Author"))
        .map(|raw| authors(&raw))
        .unwrap_or_default();
    if !authors.is_empty() {
        result.insert("authors".into(), Value::Array(authors));
    }

    debug!(fields = result.len(), "PDF metadata extracted");
    if result.is_empty() {
        Value::Bool(false)
    } else {
        Value::Object(result)
    }
}

fn trailer_dictionary<'a>(doc: &'a Document, key: &[u8]) -> Option<&'a Dictionary> {
    match doc.trailer.get(key).ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn text_entry(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::String(bytes, _) => {
            let text = decode_text_string(bytes);
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        _ => None,
    }
}

/// Decode a PDF text string (UTF-16BE with BOM, or single-byte)
fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => bytes.iter().map(|&b| b as char).collect(),
        },
    }
}

/// `D:YYYYMMDDHHmmSS...` to `YYYY-MM-DD`, or `YYYY` when the date is partial
fn document_date(raw: &str) -> Option<String> {
    let digits: String = raw
        .trim_start_matches("D:")
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    match digits.len() {
        0..=3 => None,
        4..=7 => Some(digits[..4].to_string()),
        _ => Some(format!("{}-{}-{}", &digits[..4], &digits[4..6], &digits[6..8])),
    }
}

/// BCP 47 tag (`fr-CH`) to the bibliographic language code used by records
fn language_code(tag: &str) -> Option<&'static str> {
    let primary = tag.split(['-', '_']).next()?.to_ascii_lowercase();
    match primary.as_str() {
        "en" | "eng" => Some("eng"),
        "fr" | "fre" | "fra" => Some("fre"),
        "de" | "ger" | "deu" => Some("ger"),
        "it" | "ita" => Some("ita"),
        "rm" | "roh" => Some("roh"),
        "es" | "spa" => Some("spa"),
        _ => None,
    }
}

/// Split an `Author` entry into contributor records
fn authors(raw: &str) -> Vec<Value> {
    raw.split(';')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            json!({
                "agent": {"preferred_name": name},
                "role": ["cre"]
            })
        })
        .collect()
}

/// First text block of the first page, used when the document has no title
fn first_page_title(doc: &Document) -> Option<String> {
    let (_, page_id) = doc.get_pages().into_iter().next()?;
    let content = match doc.get_page_content(page_id) {
        Ok(content) => content,
        Err(e) => {
            warn!(error = %e, "Failed to read first page, no title fallback");
            return None;
        }
    };

    text_blocks(&content)
        .into_iter()
        .map(|block| clean_text(&block))
        .find(|block| !block.is_empty() && block.len() <= MAX_TITLE_LEN)
}

/// Text of each BT/ET block of a content stream
fn text_blocks(content: &[u8]) -> Vec<String> {
    let content_str = String::from_utf8_lossy(content);
    let mut blocks = Vec::new();
    let mut in_text_block = false;
    let mut current = String::new();

    for line in content_str.lines() {
        let trimmed = line.trim();

        if trimmed == "BT" {
            in_text_block = true;
            continue;
        }

        if trimmed == "ET" {
            in_text_block = false;
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }

        if in_text_block {
            if let Some(text) = text_from_operator(trimmed) {
                current.push_str(&text);
            }
        }
    }

    blocks
}

/// Text shown by a Tj, ', " or TJ operator line
fn text_from_operator(line: &str) -> Option<String> {
    if line.ends_with("Tj") || line.ends_with('\'') || line.ends_with('"') {
        let start = line.find('(')?;
        let end = line.rfind(')')?;
        return (start < end).then(|| decode_pdf_string(&line[start + 1..end]));
    }

    // [(text) num (text) num] TJ
    if line.ends_with("TJ") {
        let mut result = String::new();
        let mut in_paren = false;
        let mut current = String::new();

        for ch in line.chars() {
            match ch {
                '(' => in_paren = true,
                ')' => {
                    in_paren = false;
                    result.push_str(&decode_pdf_string(&current));
                    current.clear();
                }
                _ if in_paren => current.push(ch),
                _ => {}
            }
        }

        return (!result.is_empty()).then_some(result);
    }

    None
}

/// Decode PDF string escapes
fn decode_pdf_string(s: &str) -> String {
    let mut result = String::new();
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some(c) => result.push(c),
                None => {}
            }
        } else {
            result.push(ch);
        }
    }

    result
}

fn clean_text(text: &str) -> String {
    text.replace('\u{FEFF}', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
