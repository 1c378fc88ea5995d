//! Flattens nested legacy condition groups into an ordered condition list.
//!
//! A group is one of:
//! - `{"and": [..]}`, `{"or": [..]}`, `{"not": {..}}` combinators,
//! - a single `"stepId.path": value` mapping,
//! - a `{"ref": {"step": .., "path": ..}, "query": {"$op": value}}` leaf,
//! - a raw expression string.
//!
//! The output is in declaration order. The first condition carries no
//! conjunction; every later one is tagged with the combinator it was found
//! under.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::ir::{Comparison, ComparisonOp, Condition, ConditionKind, Conjunction, Reference};

static STEP_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<step>[^.\s]+)\.(?P<path>\S.*)$").unwrap());

const COMBINATOR_KEYS: [&str; 3] = ["and", "or", "not"];

pub fn extract_conditions(group: &Value, kind: ConditionKind) -> Vec<Condition> {
    let mut result = Vec::new();
    collect_conditions(group, kind, None, &mut result);
    if let Some(first) = result.first_mut() {
        first.conjunction = None;
    }
    result
}

fn collect_conditions(
    group: &Value,
    kind: ConditionKind,
    conjunction: Option<Conjunction>,
    out: &mut Vec<Condition>,
) {
    match group {
        Value::String(expression) => {
            out.push(Condition::raw(kind, expression).with_conjunction(conjunction));
        }
        Value::Object(map) => {
            if map.contains_key("ref") {
                if let Some(condition) = ref_query_condition(map, kind) {
                    out.push(condition.with_conjunction(conjunction));
                }
                return;
            }

            let mut combined = false;
            for key in COMBINATOR_KEYS {
                let Some(children) = map.get(key) else {
                    continue;
                };
                let Some(child_conjunction) = Conjunction::from_key(key) else {
                    continue;
                };
                combined = true;
                match children {
                    Value::Array(items) => {
                        for item in items {
                            collect_conditions(item, kind, Some(child_conjunction), out);
                        }
                    }
                    other => collect_conditions(other, kind, Some(child_conjunction), out),
                }
            }
            if combined {
                return;
            }

            if map.len() == 1 {
                if let Some((key, value)) = map.iter().next() {
                    if let Some(condition) = step_path_condition(key, value, kind) {
                        out.push(condition.with_conjunction(conjunction));
                    }
                }
            }
        }
        _ => {}
    }
}

fn step_path_condition(key: &str, value: &Value, kind: ConditionKind) -> Option<Condition> {
    let caps = STEP_PATH_RE.captures(key)?;
    let reference = Reference::new(&caps["step"], &caps["path"]);
    let op = if value.is_boolean() {
        ComparisonOp::Is
    } else {
        ComparisonOp::Eq
    };
    Some(Condition::compare(
        kind,
        reference,
        Comparison {
            op,
            value: stringify_value(value),
        },
    ))
}

fn ref_query_condition(map: &Map<String, Value>, kind: ConditionKind) -> Option<Condition> {
    let reference = map.get("ref")?;
    let step_id = match reference.get("step")? {
        Value::String(id) => id.as_str(),
        step => step.get("id")?.as_str()?,
    };
    let path = reference
        .get("path")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let (op_key, value) = map.get("query")?.as_object()?.iter().next()?;
    let op = ComparisonOp::from_query_key(op_key)?;
    Some(Condition::compare(
        kind,
        Reference::new(step_id, path),
        Comparison {
            op,
            value: stringify_value(value),
        },
    ))
}

fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(stringify_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
