//! Where questionnaire documents come from.
//!
//! Fetching and decoding the source document is the only asynchronous step
//! of ingestion, and the only one whose failure is fatal.

pub mod file;
pub mod http;
pub mod sheet;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::info;
use serde_json::Value;

use crate::config::IngestConfig;
use crate::questionnaire::builder::{BuildOptions, Ingested, build_questionnaire_chunked};
use crate::questionnaire::framework::FrameworkRegistry;
use crate::questionnaire::model::ParseError;
use crate::questionnaire::row::RawRow;

pub use file::FileSource;
pub use http::HttpSource;
pub use sheet::SheetSource;

/// A provider of raw questionnaire rows.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch and decode the document named by `stem` (e.g. `"GRI202"`).
    async fn fetch_rows(&self, stem: &str) -> Result<Vec<Value>>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// Pick a source for the configured location: HTTP for `http(s)://` URLs,
/// the filesystem otherwise.
pub fn source_for(config: &IngestConfig) -> Result<Box<dyn DocumentSource>> {
    let location = config.source.trim();
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Box::new(HttpSource::new(location, config.timeout())?))
    } else {
        Ok(Box::new(FileSource::new(location)))
    }
}

/// Decode a whole document body. The top level must be a JSON array.
pub fn decode_document(body: &str, origin: &str) -> Result<Vec<Value>> {
    let value: Value = serde_json::from_str(body).with_context(|| format!("Failed to decode {}", origin))?;
    match value {
        Value::Array(rows) => Ok(rows),
        _ => Err(anyhow!("{} does not contain a JSON array of rows", origin)),
    }
}

/// Fetch a document and build its questionnaire.
///
/// Fetch and decode failures are returned as errors with no partial result;
/// everything after that lands in [`Ingested::errors`].
pub async fn load_questionnaire(
    source: &dyn DocumentSource,
    stem: &str,
    registry: &FrameworkRegistry,
    framework: &str,
    options: BuildOptions,
) -> Result<Ingested> {
    info!("Loading questionnaire '{}' from {}", stem, source.describe());
    let values = source.fetch_rows(stem).await?;

    // Non-object entries are rejected here, at their document index; the
    // builder's indices are mapped back to document positions afterwards.
    let mut positions = Vec::with_capacity(values.len());
    let mut rows = Vec::with_capacity(values.len());
    let mut shape_errors = Vec::new();
    for (index, value) in values.into_iter().enumerate() {
        match RawRow::from_value(value) {
            Ok(row) => {
                positions.push(index);
                rows.push(row);
            }
            Err(failure) => shape_errors.push(ParseError {
                row_index: Some(index),
                question_external_id: None,
                reason: failure.reason,
                row: None,
            }),
        }
    }

    let mut ingested = build_questionnaire_chunked(&rows, registry, framework, options).await;
    if !shape_errors.is_empty() {
        for error in &mut ingested.errors {
            if let Some(i) = error.row_index {
                error.row_index = positions.get(i).copied();
            }
        }
        ingested.errors.extend(shape_errors);
        // Row errors in document order, group errors last.
        ingested.errors.sort_by_key(|e| e.row_index.unwrap_or(usize::MAX));
    }
    Ok(ingested)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_document_requires_array() {
        assert_eq!(decode_document("[{}]", "doc").unwrap().len(), 1);
        assert!(decode_document("{}", "doc").is_err());
        assert!(decode_document("not json", "doc").is_err());
    }

    #[test]
    fn test_source_for_picks_http_for_urls() {
        let mut config = IngestConfig::default();
        config.source = "https://example.com/questionnaires".into();
        assert!(source_for(&config).unwrap().describe().starts_with("https://"));
        config.source = "data".into();
        assert_eq!(source_for(&config).unwrap().describe(), "data");
    }
}
