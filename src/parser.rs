use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::ir::{LegacyWorkflow, StepFlowEntry};

/// Keys a workflow document may nest its step-flow list under.
const STEP_FLOW_KEYS: [&str; 2] = ["serializedStepGraph", "stepGraph"];

/// Parses a step-flow list. Accepts a bare JSON array, a workflow document
/// carrying the list under `serializedStepGraph` or `stepGraph`, or
/// hand-written JSON5. Blank input and `null` are the empty flow.
pub fn parse_step_flow(input: &str) -> Result<Vec<StepFlowEntry>> {
    let value = parse_document(input)?;
    let list = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(_) => value,
        Value::Object(mut map) => {
            let nested = STEP_FLOW_KEYS
                .iter()
                .find_map(|key| map.remove(*key).filter(|v| v.is_array() || v.is_null()));
            match nested {
                Some(Value::Null) => return Ok(Vec::new()),
                Some(list) => list,
                None => {
                    return Err(Error::Parse(
                        "expected a step-flow array or a document with `serializedStepGraph`"
                            .to_string(),
                    ));
                }
            }
        }
        other => {
            return Err(Error::Parse(format!(
                "expected a step-flow array, found {}",
                json_kind(&other)
            )));
        }
    };
    decode(list)
}

/// Parses a legacy workflow document (`stepGraph` + `stepSubscriberGraph`).
pub fn parse_legacy_workflow(input: &str) -> Result<LegacyWorkflow> {
    match parse_document(input)? {
        Value::Null => Ok(LegacyWorkflow::default()),
        value @ Value::Object(_) => decode(value),
        other => Err(Error::Parse(format!(
            "expected a legacy workflow object, found {}",
            json_kind(&other)
        ))),
    }
}

fn parse_document(input: &str) -> Result<Value> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Ok(value),
        Err(json_err) => json5::from_str::<Value>(trimmed)
            .map_err(|_| Error::Parse(json_err.to_string())),
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|err| Error::Parse(err.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
