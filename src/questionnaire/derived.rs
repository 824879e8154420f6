//! Calculated field values and conditional visibility.
//!
//! Renderers call into this module whenever an answer changes. Answers for
//! one question live in a flat map keyed by field.

use std::collections::HashMap;

use log::debug;
use serde_json::{Number, Value};

use super::schema::{InputField, InputSchema};

/// Current answers of one question, keyed by answer field.
pub type Answers = HashMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    Percentage,
}

impl Operation {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "add" => Some(Operation::Add),
            "subtract" => Some(Operation::Subtract),
            "multiply" => Some(Operation::Multiply),
            "divide" => Some(Operation::Divide),
            "percentage" => Some(Operation::Percentage),
            _ => None,
        }
    }

    /// Apply to the gathered operands. An empty operand list yields 0.
    pub fn apply(self, values: &[f64]) -> Value {
        let Some((&first, rest)) = values.split_first() else {
            return match self {
                Operation::Percentage => Value::String("0.00".to_string()),
                _ => number(0.0),
            };
        };

        match self {
            Operation::Add => number(values.iter().sum()),
            Operation::Subtract => number(first - rest.iter().sum::<f64>()),
            Operation::Multiply => number(values.iter().product()),
            Operation::Divide => match rest.first() {
                Some(&second) if second != 0.0 => number(first / second),
                _ => number(0.0),
            },
            Operation::Percentage => match rest.first() {
                Some(&second) if second != 0.0 => Value::String(format!("{:.2}", first / second * 100.0)),
                _ => Value::String("0.00".to_string()),
            },
        }
    }
}

/// Compute the value of a derived field.
///
/// Referenced fields that are missing or not numeric count as 0. Fields
/// without a recognised operation keep their current answer.
pub fn evaluate(field: &InputField, answers: &Answers) -> Value {
    let current = || answers.get(&field.field).cloned().unwrap_or(Value::Null);

    let Some(calc) = &field.calculate else {
        return current();
    };
    let Some(operation) = Operation::from_name(&calc.operation) else {
        debug!("Unknown calculate operation '{}' on '{}'", calc.operation, field.field);
        return current();
    };

    let values: Vec<f64> = calc
        .fields
        .iter()
        .map(|key| answers.get(key).map(to_number).unwrap_or(0.0))
        .collect();
    operation.apply(&values)
}

/// Whether a field (or conditional group) is currently shown.
///
/// Only equality is evaluated; `comparison_operation` must be present for the
/// predicate to apply but its value is not interpreted.
pub fn conditional_visible(field: &InputField, answers: &Answers) -> bool {
    let condition = &field.condition;
    match (
        &condition.compare_field,
        &condition.comparison_operation,
        &condition.compare_value,
    ) {
        (Some(compare_field), Some(_), Some(expected)) => answers
            .get(compare_field)
            .is_some_and(|actual| strict_equals(actual, expected)),
        _ => true,
    }
}

/// Leaf fields currently visible, in document order. A hidden conditional
/// group hides everything beneath it.
pub fn visible_fields<'a>(schema: &'a InputSchema, answers: &Answers) -> Vec<&'a InputField> {
    let mut out = Vec::new();
    collect_visible(&schema.inputs, answers, &mut out);
    out
}

fn collect_visible<'a>(fields: &'a [InputField], answers: &Answers, out: &mut Vec<&'a InputField>) {
    for field in fields {
        if !conditional_visible(field, answers) {
            continue;
        }
        if !field.field.is_empty() {
            out.push(field);
        }
        collect_visible(&field.children, answers, out);
    }
}

/// Re-evaluate every visible derived field in document order, storing each
/// result so later fields can build on earlier ones. Returns the keys whose
/// value changed.
pub fn recompute_derived(schema: &InputSchema, answers: &mut Answers) -> Vec<String> {
    let derived: Vec<InputField> = visible_fields(schema, answers)
        .into_iter()
        .filter(|f| f.calculate.is_some())
        .cloned()
        .collect();

    let mut changed = Vec::new();
    for field in &derived {
        let value = evaluate(field, answers);
        if value.is_null() && !answers.contains_key(&field.field) {
            continue;
        }
        if answers.get(&field.field) != Some(&value) {
            answers.insert(field.field.clone(), value);
            changed.push(field.field.clone());
        }
    }
    changed
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()).unwrap_or(0.0),
        _ => 0.0,
    }
}

fn number(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or_else(|| Value::from(0))
}

/// Type-strict equality; numbers compare by value regardless of
/// integer/float representation.
fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questionnaire::schema::parse_schema;
    use serde_json::json;

    fn answers(pairs: &[(&str, Value)]) -> Answers {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn derived(operation: &str, fields: &[&str]) -> InputField {
        let schema = parse_schema(&json!({"inputs": [
            {"type": "derived", "field": "result", "label": "Result",
             "calculate": {"operation": operation, "fields": fields}}
        ]}));
        schema.inputs[0].clone()
    }

    #[test]
    fn test_percentage() {
        let field = derived("percentage", &["a", "b"]);
        assert_eq!(evaluate(&field, &answers(&[("a", json!(50)), ("b", json!(200))])), json!("25.00"));
        assert_eq!(evaluate(&field, &answers(&[("a", json!(50)), ("b", json!(0))])), json!("0.00"));
        assert_eq!(evaluate(&field, &answers(&[("a", json!(50))])), json!("0.00"));
    }

    #[test]
    fn test_arithmetic() {
        let input = answers(&[("a", json!("10")), ("b", json!(4)), ("c", json!("x"))]);
        assert_eq!(evaluate(&derived("add", &["a", "b", "c"]), &input), json!(14.0));
        assert_eq!(evaluate(&derived("subtract", &["a", "b", "b"]), &input), json!(2.0));
        assert_eq!(evaluate(&derived("subtract", &["a"]), &input), json!(10.0));
        assert_eq!(evaluate(&derived("multiply", &["a", "b"]), &input), json!(40.0));
        assert_eq!(evaluate(&derived("divide", &["a", "b"]), &input), json!(2.5));
        assert_eq!(evaluate(&derived("divide", &["a", "c"]), &input), json!(0.0));
        assert_eq!(evaluate(&derived("divide", &["a"]), &input), json!(0.0));
    }

    #[test]
    fn test_unknown_operation_keeps_value() {
        let field = derived("median", &["a"]);
        let input = answers(&[("a", json!(3)), ("result", json!("manual"))]);
        assert_eq!(evaluate(&field, &input), json!("manual"));
        assert_eq!(evaluate(&field, &answers(&[])), Value::Null);
    }

    #[test]
    fn test_conditional_visibility() {
        let schema = parse_schema(&json!({"inputs": [
            {"type": "select", "field": "scope", "label": "Scope"},
            {"type": "conditional", "compareField": "scope", "comparisonOperation": "equals",
             "compareValue": 2, "schema": {"inputs": [{"type": "number", "field": "tonnes"}]}},
            {"type": "conditional", "compareField": "scope",
             "schema": {"inputs": [{"type": "text", "field": "always"}]}}
        ]}));
        let group = &schema.inputs[1];
        assert!(conditional_visible(group, &answers(&[("scope", json!(2.0))])));
        assert!(!conditional_visible(group, &answers(&[("scope", json!("2"))])));
        assert!(!conditional_visible(group, &answers(&[])));
        // Incomplete predicate: always shown.
        assert!(conditional_visible(&schema.inputs[2], &answers(&[])));

        let keys = |a: &Answers| -> Vec<String> {
            visible_fields(&schema, a).iter().map(|f| f.field.clone()).collect()
        };
        assert_eq!(keys(&answers(&[])), vec!["scope", "always"]);
        assert_eq!(keys(&answers(&[("scope", json!(2))])), vec!["scope", "tonnes", "always"]);
    }

    #[test]
    fn test_recompute_chains_derived_fields() {
        let schema = parse_schema(&json!({"inputs": [
            {"type": "number", "field": "a"},
            {"type": "number", "field": "b"},
            {"type": "derived", "field": "total", "calculate": {"operation": "add", "fields": ["a", "b"]}},
            {"type": "derived", "field": "share", "calculate": {"operation": "percentage", "fields": ["a", "total"]}}
        ]}));
        let mut input = answers(&[("a", json!(1)), ("b", json!(3))]);
        let changed = recompute_derived(&schema, &mut input);
        assert_eq!(changed, vec!["total", "share"]);
        assert_eq!(input["total"], json!(4.0));
        assert_eq!(input["share"], json!("25.00"));
        assert!(recompute_derived(&schema, &mut input).is_empty());
    }

    #[test]
    fn test_recompute_leaves_unknown_operation_unset() {
        let schema = parse_schema(&json!({"inputs": [
            {"type": "number", "field": "a"},
            {"type": "derived", "field": "median", "calculate": {"operation": "median", "fields": ["a"]}},
            {"type": "derived", "field": "manual"}
        ]}));
        let mut input = answers(&[("a", json!(3))]);
        assert!(recompute_derived(&schema, &mut input).is_empty());
        assert!(!input.contains_key("median"));

        input.insert("manual".into(), json!(12));
        assert!(recompute_derived(&schema, &mut input).is_empty());
        assert_eq!(evaluate(schema.field("manual").unwrap(), &input), json!(12));
    }
}
