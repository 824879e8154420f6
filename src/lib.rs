//! Ingestion pipeline for ESG disclosure questionnaires.
//!
//! Raw spreadsheet-style rows are validated, grouped and folded into a
//! [`questionnaire::Questionnaire`] of sections, cards and questions, with
//! every rejected row or group reported next to it.

pub mod config;
pub mod questionnaire;
pub mod source;

pub use config::IngestConfig;
pub use questionnaire::{FrameworkRegistry, Ingested, ParseError, Questionnaire, build_questionnaire};
pub use source::{DocumentSource, FileSource, HttpSource, SheetSource, load_questionnaire};
