//! Raw spreadsheet rows and their validation into typed rows.
//!
//! A row is one flattened spreadsheet line describing a single question plus
//! the card and section it belongs to. Validation runs the framework's
//! normalization hook first, then walks [`FIELD_RULES`] to coerce each value.

use std::collections::HashMap;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::framework::FrameworkRegistry;

/// One untyped input row, keyed by column name.
///
/// Both `snake_case` and `camelCase` column names are understood; when a row
/// carries both spellings the `snake_case` one wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRow {
    columns: Map<String, Value>,
}

impl RawRow {
    pub fn new(columns: Map<String, Value>) -> Self {
        Self { columns }
    }

    /// Wrap a decoded JSON value. Anything other than an object is rejected.
    pub fn from_value(value: Value) -> Result<Self, ValidationFailure> {
        match value {
            Value::Object(columns) => Ok(Self { columns }),
            other => Err(ValidationFailure::new(format!(
                "row is not an object (found {})",
                json_kind(&other)
            ))),
        }
    }

    /// Look up a column by its snake_case name, falling back to camelCase.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.columns
            .get(field)
            .or_else(|| self.columns.get(&camel_case(field)))
            .filter(|v| !v.is_null())
    }

    /// Set a column under its snake_case name, dropping any camelCase twin.
    pub fn set(&mut self, field: &str, value: Value) {
        self.columns.remove(&camel_case(field));
        self.columns.insert(field.to_string(), value);
    }

    pub fn columns(&self) -> &Map<String, Value> {
        &self.columns
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.columns)
    }
}

impl From<Map<String, Value>> for RawRow {
    fn from(columns: Map<String, Value>) -> Self {
        Self::new(columns)
    }
}

/// A row that passed validation, with every value coerced to its type.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRow {
    pub card_sequence: i64,
    pub card_standards: String,
    pub card_title: String,
    pub esg_type: String,
    pub is_card_active: bool,
    pub is_enabled_for_facility: Option<bool>,
    pub monthly: Option<bool>,
    pub question_class: String,
    pub question_description: Option<String>,
    pub question_external_id: String,
    /// Structured when the column held JSON (or a decodable JSON string),
    /// otherwise the raw value passed through untouched.
    pub question_schema: Value,
    pub question_sequence: i64,
    pub question_title: String,
    pub section_description: Option<String>,
    pub section_external_id: String,
    pub section_sequence: i64,
    pub section_title: String,
    pub report_type: String,
    pub subsections: Option<String>,
}

/// Why a row was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub reason: String,
    /// Best effort: absent when the row broke before the id could be read.
    pub question_external_id: Option<String>,
}

impl ValidationFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            question_external_id: None,
        }
    }

    fn with_question(mut self, id: Option<String>) -> Self {
        self.question_external_id = id;
        self
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.question_external_id {
            Some(id) => write!(f, "{} (question '{}')", self.reason, id),
            None => write!(f, "{}", self.reason),
        }
    }
}

impl std::error::Error for ValidationFailure {}

/// How a single column is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Must be present; strings and numbers accepted.
    RequiredString,
    /// Like `RequiredString`, and must not be blank.
    RequiredId,
    OptionalString,
    /// String or number, leading-integer parse, 0 on failure or absence.
    Integer,
    /// `1`, `"1"`, `true` are true; anything else is false.
    Flag,
    /// Absent stays `None`, otherwise coerced like `Flag`.
    OptionalFlag,
    /// JSON strings are decoded when possible, passed through otherwise.
    Schema,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub column: &'static str,
    pub coercion: Coercion,
}

const fn rule(column: &'static str, coercion: Coercion) -> FieldRule {
    FieldRule { column, coercion }
}

/// Every column a row may carry, in validation order.
pub const FIELD_RULES: &[FieldRule] = &[
    rule("question_external_id", Coercion::RequiredId),
    rule("section_external_id", Coercion::RequiredId),
    rule("section_title", Coercion::RequiredString),
    rule("section_description", Coercion::OptionalString),
    rule("section_sequence", Coercion::Integer),
    rule("card_sequence", Coercion::Integer),
    rule("card_standards", Coercion::RequiredString),
    rule("card_title", Coercion::RequiredString),
    rule("is_card_active", Coercion::Flag),
    rule("is_enabled_for_facility", Coercion::OptionalFlag),
    rule("esg_type", Coercion::RequiredString),
    rule("monthly", Coercion::OptionalFlag),
    rule("question_class", Coercion::RequiredString),
    rule("question_description", Coercion::OptionalString),
    rule("question_schema", Coercion::Schema),
    rule("question_sequence", Coercion::Integer),
    rule("question_title", Coercion::RequiredString),
    rule("report_type", Coercion::RequiredString),
    rule("subsections", Coercion::OptionalString),
];

/// A column value after coercion.
#[derive(Debug, Clone, PartialEq)]
enum Coerced {
    Text(String),
    MaybeText(Option<String>),
    Int(i64),
    Bool(bool),
    MaybeBool(Option<bool>),
    Json(Value),
}

/// Validate one row for the given framework.
///
/// The framework's normalization hook runs before any rule is applied.
/// Failures are returned, never raised; recording them is the caller's job.
pub fn validate_row(
    row: &RawRow,
    registry: &FrameworkRegistry,
    framework: &str,
) -> Result<ValidatedRow, ValidationFailure> {
    let row = registry.normalize(row.clone(), framework);

    // Read the id leniently up front so every failure can reference it.
    let question_id = row
        .get("question_external_id")
        .and_then(text_of)
        .filter(|id| !id.trim().is_empty());

    let mut coerced = HashMap::with_capacity(FIELD_RULES.len());
    for rule in FIELD_RULES {
        let value = apply_rule(&row, rule).map_err(|f| f.with_question(question_id.clone()))?;
        coerced.insert(rule.column, value);
    }
    let mut take = |column: &str| coerced.remove(column);

    let question_external_id = take_text(take("question_external_id"));
    let section_external_id = take_text(take("section_external_id"));
    let section_title = take_text(take("section_title"));
    let section_description = take_maybe_text(take("section_description"));
    let section_sequence = take_int(take("section_sequence"));
    let card_sequence = take_int(take("card_sequence"));
    let card_standards = take_text(take("card_standards"));
    let card_title = take_text(take("card_title"));
    let is_card_active = take_bool(take("is_card_active"));
    let is_enabled_for_facility = take_maybe_bool(take("is_enabled_for_facility"));
    let esg_type = take_text(take("esg_type"));
    let monthly = take_maybe_bool(take("monthly"));
    let question_class = take_text(take("question_class"));
    let question_description = take_maybe_text(take("question_description"));
    let question_schema = take_json(take("question_schema"));
    let question_sequence = take_int(take("question_sequence"));
    let question_title = take_text(take("question_title"));
    let report_type = take_text(take("report_type"));
    let subsections = take_maybe_text(take("subsections"));

    Ok(ValidatedRow {
        card_sequence,
        card_standards,
        card_title,
        esg_type,
        is_card_active,
        is_enabled_for_facility,
        monthly,
        question_class,
        question_description,
        question_external_id,
        question_schema,
        question_sequence,
        question_title,
        section_description,
        section_external_id,
        section_sequence,
        section_title,
        report_type,
        subsections,
    })
}

fn apply_rule(row: &RawRow, rule: &FieldRule) -> Result<Coerced, ValidationFailure> {
    let value = row.get(rule.column);
    match rule.coercion {
        Coercion::RequiredString => required_text(rule.column, value).map(Coerced::Text),
        Coercion::RequiredId => {
            let text = required_text(rule.column, value)?;
            if text.trim().is_empty() {
                debug!("Rejecting row: blank '{}'", rule.column);
                return Err(ValidationFailure::new(format!("'{}' must not be empty", rule.column)));
            }
            Ok(Coerced::Text(text))
        }
        Coercion::OptionalString => match value {
            None => Ok(Coerced::MaybeText(None)),
            Some(v) => text_of(v).map(|t| Coerced::MaybeText(Some(t))).ok_or_else(|| {
                ValidationFailure::new(format!(
                    "'{}' must be a string (found {})",
                    rule.column,
                    json_kind(v)
                ))
            }),
        },
        Coercion::Integer => Ok(Coerced::Int(value.map(coerce_int).unwrap_or(0))),
        Coercion::Flag => Ok(Coerced::Bool(value.map(coerce_flag).unwrap_or(false))),
        Coercion::OptionalFlag => Ok(Coerced::MaybeBool(value.map(coerce_flag))),
        Coercion::Schema => Ok(Coerced::Json(value.map(decode_schema).unwrap_or(Value::Null))),
    }
}

fn required_text(column: &str, value: Option<&Value>) -> Result<String, ValidationFailure> {
    let value = value.ok_or_else(|| ValidationFailure::new(format!("missing required field '{}'", column)))?;
    text_of(value).ok_or_else(|| {
        ValidationFailure::new(format!("'{}' must be a string (found {})", column, json_kind(value)))
    })
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer coercion with leading-integer semantics: `"12abc"` is 12,
/// `"abc"` is 0, `3.9` is 3.
pub fn coerce_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => parse_leading_int(s),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

fn parse_leading_int(s: &str) -> i64 {
    let s = s.trim();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    match digits[..end].parse::<i64>() {
        Ok(n) if negative => -n,
        Ok(n) => n,
        Err(_) => 0,
    }
}

/// Boolean coercion: `1`, `"1"` and `true` are true, everything else false.
pub fn coerce_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() == Some(1.0),
        Value::String(s) => s.trim() == "1",
        _ => false,
    }
}

fn decode_schema(value: &Value) -> Value {
    match value {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!("questionSchema is not valid JSON, passing it through: {}", e);
                value.clone()
            }
        },
        other => other.clone(),
    }
}

fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn take_text(c: Option<Coerced>) -> String {
    match c {
        Some(Coerced::Text(s)) => s,
        _ => String::new(),
    }
}

fn take_maybe_text(c: Option<Coerced>) -> Option<String> {
    match c {
        Some(Coerced::MaybeText(s)) => s,
        _ => None,
    }
}

fn take_int(c: Option<Coerced>) -> i64 {
    match c {
        Some(Coerced::Int(n)) => n,
        _ => 0,
    }
}

fn take_bool(c: Option<Coerced>) -> bool {
    matches!(c, Some(Coerced::Bool(true)))
}

fn take_maybe_bool(c: Option<Coerced>) -> Option<bool> {
    match c {
        Some(Coerced::MaybeBool(b)) => b,
        _ => None,
    }
}

fn take_json(c: Option<Coerced>) -> Value {
    match c {
        Some(Coerced::Json(v)) => v,
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> RawRow {
        RawRow::from_value(value).unwrap()
    }

    fn base() -> Value {
        json!({
            "section_external_id": "S1",
            "section_title": "Economic Performance",
            "section_sequence": 1,
            "card_sequence": 1,
            "card_standards": "GRI 201-1",
            "card_title": "Direct economic value",
            "is_card_active": 1,
            "esg_type": "economic",
            "question_class": "single_row_single_input_single_answer",
            "question_external_id": "Q1",
            "question_schema": "{\"inputs\":[{\"type\":\"text\",\"field\":\"value1\",\"label\":\"Value\"}]}",
            "question_sequence": "2",
            "question_title": "Revenue",
            "report_type": "GRI"
        })
    }

    fn validate(value: Value) -> Result<ValidatedRow, ValidationFailure> {
        validate_row(&row(value), &FrameworkRegistry::builtin(), "GRI")
    }

    #[test]
    fn test_valid_row_is_coerced() {
        let validated = validate(base()).unwrap();
        assert_eq!(validated.question_external_id, "Q1");
        assert_eq!(validated.question_sequence, 2);
        assert!(validated.is_card_active);
        assert_eq!(validated.is_enabled_for_facility, None);
        assert!(validated.question_schema.is_object());
    }

    #[test]
    fn test_camel_case_columns_are_accepted() {
        let validated = validate(json!({
            "sectionExternalId": "S1",
            "sectionTitle": "T",
            "cardStandards": "",
            "cardTitle": "C",
            "isCardActive": true,
            "isEnabledForFacility": "0",
            "esgType": "social",
            "questionClass": "x",
            "questionExternalId": "Q9",
            "questionTitle": "Q",
            "reportType": "GRI"
        }))
        .unwrap();
        assert_eq!(validated.question_external_id, "Q9");
        assert_eq!(validated.is_enabled_for_facility, Some(false));
        assert!(validated.is_card_active);
    }

    #[test]
    fn test_missing_question_id_fails() {
        let mut value = base();
        value.as_object_mut().unwrap().remove("question_external_id");
        let failure = validate(value).unwrap_err();
        assert!(failure.reason.contains("question_external_id"));
        assert_eq!(failure.question_external_id, None);
    }

    #[test]
    fn test_later_failure_names_the_question() {
        let mut value = base();
        value.as_object_mut().unwrap().remove("card_title");
        let failure = validate(value).unwrap_err();
        assert_eq!(failure.question_external_id.as_deref(), Some("Q1"));
    }

    #[test]
    fn test_unparsable_sequence_defaults_to_zero() {
        let mut value = base();
        value["question_sequence"] = json!("abc");
        assert_eq!(validate(value).unwrap().question_sequence, 0);
    }

    #[test]
    fn test_integer_coercion() {
        assert_eq!(coerce_int(&json!("12abc")), 12);
        assert_eq!(coerce_int(&json!(" -4 ")), -4);
        assert_eq!(coerce_int(&json!(3.9)), 3);
        assert_eq!(coerce_int(&json!("")), 0);
        assert_eq!(coerce_int(&json!(null)), 0);
    }

    #[test]
    fn test_flag_coercion() {
        assert!(coerce_flag(&json!(1)));
        assert!(coerce_flag(&json!("1")));
        assert!(coerce_flag(&json!(true)));
        assert!(!coerce_flag(&json!(0)));
        assert!(!coerce_flag(&json!("")));
        assert!(!coerce_flag(&json!(false)));
        assert!(!coerce_flag(&json!("yes")));
    }

    #[test]
    fn test_undecodable_schema_passes_through() {
        let mut value = base();
        value["question_schema"] = json!("{not json");
        assert_eq!(validate(value).unwrap().question_schema, json!("{not json"));
    }

    #[test]
    fn test_non_object_row_is_rejected() {
        let failure = RawRow::from_value(json!([1, 2])).unwrap_err();
        assert!(failure.reason.contains("array"));
    }

    #[test]
    fn test_camel_case_conversion() {
        assert_eq!(camel_case("is_enabled_for_facility"), "isEnabledForFacility");
        assert_eq!(camel_case("monthly"), "monthly");
    }
}
