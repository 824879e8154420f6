//! Per-question input schemas.
//!
//! A schema is an ordered list of [`InputField`]s. Conditional fields carry a
//! nested schema of their own that renders only while their predicate holds,
//! so the structure is a tree of arbitrary (but bounded) depth.

use std::collections::HashSet;
use std::fmt;

use anyhow::{Result, anyhow, bail};
use log::{debug, warn};
use serde_json::{Map, Value};

use super::row::json_kind;

/// Nesting limit for conditional groups.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Answer key of the fallback field.
pub const FALLBACK_FIELD: &str = "value1";
pub const FALLBACK_LABEL: &str = "Input";

/// Widget type of a field. Unrecognised tags are kept for diagnostics and
/// render as free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Textarea,
    Select,
    Date,
    Checkbox,
    Radio,
    Derived,
    Conditional,
    Unknown(String),
}

impl FieldKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "text" => FieldKind::Text,
            "number" => FieldKind::Number,
            "textarea" => FieldKind::Textarea,
            "select" => FieldKind::Select,
            "date" => FieldKind::Date,
            "checkbox" => FieldKind::Checkbox,
            "radio" => FieldKind::Radio,
            "derived" => FieldKind::Derived,
            "conditional" => FieldKind::Conditional,
            other => FieldKind::Unknown(other.to_string()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Textarea => "textarea",
            FieldKind::Select => "select",
            FieldKind::Date => "date",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Radio => "radio",
            FieldKind::Derived => "derived",
            FieldKind::Conditional => "conditional",
            FieldKind::Unknown(tag) => tag,
        }
    }

    /// The widget actually rendered; unknown tags degrade to text.
    pub fn rendered(&self) -> FieldKind {
        match self {
            FieldKind::Unknown(_) => FieldKind::Text,
            other => other.clone(),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Free-form widget options (placeholder, min/max/step, options, required,
/// rows/columns, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldProps(Map<String, Value>);

impl FieldProps {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.0.get("placeholder").and_then(Value::as_str)
    }

    pub fn required(&self) -> bool {
        self.0.get("required").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn min(&self) -> Option<f64> {
        self.number("min")
    }

    pub fn max(&self) -> Option<f64> {
        self.number("max")
    }

    pub fn step(&self) -> Option<f64> {
        self.number("step")
    }

    pub fn rows(&self) -> Option<u64> {
        self.0.get("rows").and_then(Value::as_u64)
    }

    pub fn columns(&self) -> Option<u64> {
        self.0.get("columns").and_then(Value::as_u64)
    }

    /// Option labels; entries may be plain strings or `{label, value}` objects.
    pub fn options(&self) -> Vec<String> {
        self.0
            .get("options")
            .and_then(Value::as_array)
            .map(|opts| {
                opts.iter()
                    .filter_map(|o| match o {
                        Value::String(s) => Some(s.clone()),
                        Value::Object(obj) => obj
                            .get("label")
                            .or_else(|| obj.get("value"))
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn number(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Arithmetic over other answered fields, for `derived` fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calculation {
    pub operation: String,
    pub fields: Vec<String>,
}

/// Visibility predicate of a `conditional` field. Each part is optional;
/// the predicate applies only when all three are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Condition {
    pub compare_field: Option<String>,
    pub comparison_operation: Option<String>,
    pub compare_value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputField {
    pub kind: FieldKind,
    pub label: String,
    /// Answer key. Empty only for conditional groups that answer nothing
    /// themselves.
    pub field: String,
    pub props: FieldProps,
    pub calculate: Option<Calculation>,
    pub condition: Condition,
    /// Fields shown while the condition holds.
    pub children: Vec<InputField>,
}

impl InputField {
    pub fn text(field: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: FieldKind::Text,
            label: label.into(),
            field: field.into(),
            props: FieldProps::default(),
            calculate: None,
            condition: Condition::default(),
            children: Vec::new(),
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind == FieldKind::Conditional
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputSchema {
    pub inputs: Vec<InputField>,
    /// Layout hint for the renderer, e.g. `"row"` or `"grid"`.
    pub layout: Option<String>,
    /// Set when the source schema was unusable and the fallback was substituted.
    pub is_fallback: bool,
}

impl InputSchema {
    /// The single free-text field used when a schema cannot be parsed.
    pub fn fallback() -> Self {
        Self {
            inputs: vec![InputField::text(FALLBACK_FIELD, FALLBACK_LABEL)],
            layout: None,
            is_fallback: true,
        }
    }

    /// Every answerable field, depth first in document order.
    pub fn leaf_fields(&self) -> Vec<&InputField> {
        let mut out = Vec::new();
        collect_leaves(&self.inputs, &mut out);
        out
    }

    /// Find a field by answer key anywhere in the tree.
    pub fn field(&self, key: &str) -> Option<&InputField> {
        find_field(&self.inputs, key)
    }
}

fn collect_leaves<'a>(fields: &'a [InputField], out: &mut Vec<&'a InputField>) {
    for field in fields {
        if !field.field.is_empty() {
            out.push(field);
        }
        collect_leaves(&field.children, out);
    }
}

fn find_field<'a>(fields: &'a [InputField], key: &str) -> Option<&'a InputField> {
    fields.iter().find_map(|f| {
        if f.field == key {
            Some(f)
        } else {
            find_field(&f.children, key)
        }
    })
}

/// Parse a question schema, substituting [`InputSchema::fallback`] when the
/// raw value is malformed.
///
/// The failure is logged and otherwise swallowed: a broken schema still
/// yields an answerable question, and it is deliberately not reported as a
/// row error.
pub fn parse_schema(raw: &Value) -> InputSchema {
    parse_schema_with_depth(raw, DEFAULT_MAX_DEPTH)
}

pub fn parse_schema_with_depth(raw: &Value, max_depth: usize) -> InputSchema {
    match try_parse_schema(raw, max_depth) {
        Ok(schema) => schema,
        Err(e) => {
            warn!("Invalid question schema, using fallback input: {:#}", e);
            InputSchema::fallback()
        }
    }
}

/// Strict variant of [`parse_schema`] that reports why a schema was rejected.
pub fn try_parse_schema(raw: &Value, max_depth: usize) -> Result<InputSchema> {
    let obj = raw
        .as_object()
        .ok_or_else(|| anyhow!("schema must be an object, found {}", json_kind(raw)))?;

    let inputs = parse_inputs(obj, "schema", 0, max_depth)?;

    let layout = match obj.get("layout") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => bail!("schema.layout must be a string, found {}", json_kind(other)),
    };

    let schema = InputSchema {
        inputs,
        layout,
        is_fallback: false,
    };
    check_unique_keys(&schema)?;
    Ok(schema)
}

fn parse_inputs(
    obj: &Map<String, Value>,
    path: &str,
    depth: usize,
    max_depth: usize,
) -> Result<Vec<InputField>> {
    if depth > max_depth {
        bail!("{} nests deeper than {} levels", path, max_depth);
    }

    let inputs = obj
        .get("inputs")
        .ok_or_else(|| anyhow!("{}.inputs is missing", path))?
        .as_array()
        .ok_or_else(|| anyhow!("{}.inputs must be an array", path))?;

    inputs
        .iter()
        .enumerate()
        .map(|(i, raw)| parse_field(raw, &format!("{}.inputs[{}]", path, i), depth, max_depth))
        .collect()
}

fn parse_field(raw: &Value, path: &str, depth: usize, max_depth: usize) -> Result<InputField> {
    let obj = raw
        .as_object()
        .ok_or_else(|| anyhow!("{} must be an object, found {}", path, json_kind(raw)))?;

    let tag = string_at(obj, "type", path)?.ok_or_else(|| anyhow!("{}.type is missing", path))?;
    let kind = FieldKind::from_tag(&tag);
    if let FieldKind::Unknown(tag) = &kind {
        warn!("{} has unknown type '{}', rendering as text", path, tag);
    }

    let label = string_at(obj, "label", path)?.unwrap_or_default();
    let field = string_at(obj, "field", path)?.unwrap_or_default();

    let props = match obj.get("props") {
        None | Some(Value::Null) => FieldProps::default(),
        Some(Value::Object(map)) => FieldProps::new(map.clone()),
        Some(other) => bail!("{}.props must be an object, found {}", path, json_kind(other)),
    };

    let calculate = match obj.get("calculate") {
        None | Some(Value::Null) => None,
        Some(value) => Some(parse_calculation(value, path)?),
    };
    if kind == FieldKind::Derived && calculate.is_none() {
        debug!("{} is derived but has no calculate block, keeping its answer as entered", path);
    }

    let condition = Condition {
        compare_field: string_at(obj, "compareField", path)?,
        comparison_operation: string_at(obj, "comparisonOperation", path)?,
        compare_value: obj.get("compareValue").filter(|v| !v.is_null()).cloned(),
    };

    let children = match obj.get("schema") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(nested)) => {
            parse_inputs(nested, &format!("{}.schema", path), depth + 1, max_depth)?
        }
        Some(other) => bail!("{}.schema must be an object, found {}", path, json_kind(other)),
    };

    if field.trim().is_empty() && kind != FieldKind::Conditional {
        bail!("{}.field must not be empty", path);
    }

    Ok(InputField {
        kind,
        label,
        field,
        props,
        calculate,
        condition,
        children,
    })
}

fn parse_calculation(raw: &Value, path: &str) -> Result<Calculation> {
    let obj = raw
        .as_object()
        .ok_or_else(|| anyhow!("{}.calculate must be an object", path))?;
    let operation = obj
        .get("operation")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("{}.calculate.operation must be a string", path))?
        .to_string();
    let fields = obj
        .get("fields")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("{}.calculate.fields must be an array", path))?
        .iter()
        .map(|f| {
            f.as_str()
                .map(str::to_string)
                .ok_or_else(|| anyhow!("{}.calculate.fields entries must be strings", path))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Calculation { operation, fields })
}

fn string_at(obj: &Map<String, Value>, key: &str, path: &str) -> Result<Option<String>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => bail!("{}.{} must be a string, found {}", path, key, json_kind(other)),
    }
}

fn check_unique_keys(schema: &InputSchema) -> Result<()> {
    let mut seen = HashSet::new();
    for field in schema.leaf_fields() {
        if !seen.insert(field.field.as_str()) {
            bail!("answer key '{}' is used by more than one field", field.field);
        }
    }
    Ok(())
}
