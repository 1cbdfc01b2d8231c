//! SONAR Deposit Importer
//!
//! Command-line access to the metadata imports of the deposit editor:
//! - `pdf`: extract metadata from a local PDF file
//! - `swisscovery`: look up a catalog record through the SONAR backend
//!
//! Both print the normalized import (metadata and contributors) as JSON.

mod errors;
mod pdf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sonar_deposit_common::{
    client::{DepositBackend, HttpBackend},
    config::AppConfig,
    import::{map_pdf_extraction, map_swisscovery, ImportResult, SearchType, SwisscoveryQuery},
    VERSION,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deposit-import", version = VERSION, about = "SONAR deposit metadata import")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract metadata from a PDF file
    Pdf {
        /// Path to the PDF file
        path: PathBuf,
        /// Print the raw extraction result instead of the normalized import
        #[arg(long)]
        raw: bool,
    },
    /// Search the swisscovery catalog
    Swisscovery {
        /// Field to search
        #[arg(long = "type", value_enum, default_value = "all-for-ui")]
        search_type: SearchTypeArg,
        /// Search text
        #[arg(long)]
        query: String,
        /// SONAR base URL, overrides APP__BACKEND__BASE_URL
        #[arg(long, env = "SONAR_URL")]
        backend_url: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SearchTypeArg {
    AllForUi,
    DigitalObjectIdentifier,
    MmsId,
    Isbn,
    Issn,
}

impl From<SearchTypeArg> for SearchType {
    fn from(arg: SearchTypeArg) -> Self {
        match arg {
            SearchTypeArg::AllForUi => SearchType::AllForUi,
            SearchTypeArg::DigitalObjectIdentifier => SearchType::DigitalObjectIdentifier,
            SearchTypeArg::MmsId => SearchType::MmsId,
            SearchTypeArg::Isbn => SearchType::Isbn,
            SearchTypeArg::Issn => SearchType::Issn,
        }
    }
}

/// Output of a lookup; `found` is false when there is nothing to import
#[derive(Serialize)]
struct Output {
    found: bool,
    #[serde(flatten)]
    import: ImportResult,
}

impl From<Option<ImportResult>> for Output {
    fn from(import: Option<ImportResult>) -> Self {
        let import = import.filter(|import| !import.is_empty());
        Self {
            found: import.is_some(),
            import: import.unwrap_or_default(),
        }
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Logs go to stderr so stdout stays valid JSON
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn swisscovery(
    search_type: SearchType,
    query: String,
    backend_url: Option<String>,
) -> anyhow::Result<Option<ImportResult>> {
    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if let Some(url) = backend_url {
        config.backend.base_url = url;
    }

    let backend = HttpBackend::from_config(&config.backend)?;
    let query = SwisscoveryQuery::new(search_type, query);
    if query.is_blank() {
        return Ok(None);
    }

    tracing::info!(backend = %config.backend.base_url, search_type = %search_type, "Searching swisscovery");
    let response = backend.search_swisscovery(&query).await?;
    Ok(response.map(map_swisscovery))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Pdf { path, raw } => {
            let result = pdf::extract_metadata_from_file(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if raw {
                print_json(&result)?;
            } else {
                print_json(&Output::from(map_pdf_extraction(&result)))?;
            }
        }
        Commands::Swisscovery {
            search_type,
            query,
            backend_url,
        } => {
            let import = swisscovery(search_type.into(), query, backend_url).await?;
            print_json(&Output::from(import))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_swisscovery() {
        let cli = Cli::try_parse_from([
            "deposit-import",
            "swisscovery",
            "--type",
            "digital-object-identifier",
            "--query",
            "10.1000/182",
        ])
        .unwrap();
        match cli.command {
            Commands::Swisscovery {
                search_type, query, ..
            } => {
                assert_eq!(SearchType::from(search_type), SearchType::DigitalObjectIdentifier);
                assert_eq!(query, "10.1000/182");
            }
            Commands::Pdf { .. } => panic!("expected swisscovery"),
        }
    }

    #[test]
    fn test_output_from_extraction() {
        let output = Output::from(map_pdf_extraction(&json!({
            "title": "On moraines",
            "languages": ["ger"]
        })));
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["found"], true);
        assert_eq!(value["metadata"]["language"], "ger");

        let output = Output::from(map_pdf_extraction(&json!(false)));
        assert!(!output.found);
    }

    #[tokio::test]
    async fn test_blank_query_skips_backend() {
        let import = swisscovery(SearchType::Isbn, "   ".into(), Some("http://localhost:1".into())).await;
        tokio_test::assert_ok!(&import);
        assert!(import.unwrap().is_none());
    }
}
