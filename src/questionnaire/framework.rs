//! Reporting framework configuration: row normalization hooks and the
//! question-class to widget mapping.
//!
//! The registry is plain data built once at startup and passed by reference
//! into ingestion, so concurrent builds can share it freely.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::Value;

use super::model::QuestionClass;
use super::row::RawRow;

/// Row rewrite applied before validation.
pub type NormalizeFn = fn(RawRow) -> RawRow;

/// How a question's inputs are laid out by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    /// One input, one answer.
    SingleInput,
    /// Several inputs side by side, one answer row.
    InputRow,
    /// A repeatable table of inputs.
    InputGrid,
    /// Generic free-form rendering for anything unrecognised.
    Fallback,
}

#[derive(Debug, Clone)]
pub struct FrameworkEntry {
    pub key: &'static str,
    pub normalize: NormalizeFn,
    pub widgets: HashMap<String, WidgetKind>,
}

impl FrameworkEntry {
    /// Entry with identity normalization and the default widget mapping.
    pub fn placeholder(key: &'static str) -> Self {
        Self {
            key,
            normalize: identity,
            widgets: default_widgets(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameworkRegistry {
    entries: Vec<FrameworkEntry>,
}

static SHARED: Lazy<FrameworkRegistry> = Lazy::new(FrameworkRegistry::builtin);

impl FrameworkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// GRI plus placeholder entries for the frameworks not yet configured.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(FrameworkEntry {
            key: "GRI",
            normalize: normalize_gri,
            widgets: default_widgets(),
        });
        for key in ["SASB", "TCFD", "BRSR"] {
            registry.register(FrameworkEntry::placeholder(key));
        }
        registry
    }

    /// Process-wide instance of [`FrameworkRegistry::builtin`].
    pub fn shared() -> &'static FrameworkRegistry {
        &SHARED
    }

    /// Add an entry, replacing any existing one with the same key.
    pub fn register(&mut self, entry: FrameworkEntry) {
        self.entries.retain(|e| !e.key.eq_ignore_ascii_case(entry.key));
        self.entries.push(entry);
    }

    pub fn get(&self, framework: &str) -> Option<&FrameworkEntry> {
        self.entries.iter().find(|e| e.key.eq_ignore_ascii_case(framework.trim()))
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.key).collect()
    }

    /// Apply the framework's row hook. Unknown frameworks leave the row as is.
    pub fn normalize(&self, row: RawRow, framework: &str) -> RawRow {
        match self.get(framework) {
            Some(entry) => (entry.normalize)(row),
            None => row,
        }
    }

    /// Widget layout for a question class. Unknown frameworks and unmapped
    /// classes get [`WidgetKind::Fallback`].
    pub fn widget_kind_for(&self, question_class: &str, framework: &str) -> WidgetKind {
        self.get(framework)
            .and_then(|entry| entry.widgets.get(question_class).copied())
            .unwrap_or(WidgetKind::Fallback)
    }
}

fn identity(row: RawRow) -> RawRow {
    row
}

/// GRI sheets sometimes omit the report type and pad ids with spaces.
fn normalize_gri(mut row: RawRow) -> RawRow {
    if row.get("report_type").is_none() {
        row.set("report_type", Value::String("GRI".to_string()));
    }
    for column in ["question_external_id", "section_external_id"] {
        let trimmed = match row.get(column) {
            Some(Value::String(id)) if id.trim().len() != id.len() => Some(id.trim().to_string()),
            _ => None,
        };
        if let Some(id) = trimmed {
            row.set(column, Value::String(id));
        }
    }
    row
}

fn default_widgets() -> HashMap<String, WidgetKind> {
    QuestionClass::KNOWN
        .iter()
        .map(|class| (class.as_tag().to_string(), class.default_widget()))
        .collect()
}
