//! Resolution of `ref:step:<id>` references against realized step outputs.

use std::collections::HashMap;

use serde_json::Value;

use crate::core::types::Inputs;

pub const REF_PREFIX: &str = "ref:step:";
const OUTPUT_SUFFIX: &str = ".output";

/// Realized outputs keyed by step id, scoped to a single plan execution.
pub type StepOutputs = HashMap<String, Value>;

/// Step id named by a reference string, if `raw` is one.
///
/// Both `ref:step:<id>` and `ref:step:<id>.output` name step `<id>`.
pub fn parse_reference(raw: &str) -> Option<&str> {
    let rest = raw.strip_prefix(REF_PREFIX)?;
    let id = rest.strip_suffix(OUTPUT_SUFFIX).unwrap_or(rest);
    if id.is_empty() { None } else { Some(id) }
}

/// Return a copy of `inputs` with every resolvable reference substituted.
///
/// References to steps without a recorded output are left verbatim.
pub fn resolve_inputs(inputs: &Inputs, outputs: &StepOutputs) -> Inputs {
    inputs
        .iter()
        .map(|(key, value)| (key.clone(), resolve_value(value, outputs)))
        .collect()
}

pub fn resolve_value(value: &Value, outputs: &StepOutputs) -> Value {
    match value {
        Value::String(raw) => match parse_reference(raw).and_then(|id| outputs.get(id)) {
            Some(output) => substitution(output),
            None => value.clone(),
        },
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| (key.clone(), resolve_value(inner, outputs)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_value(item, outputs))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// A mapping output contributes its `content` field; anything else is used whole.
fn substitution(output: &Value) -> Value {
    match output.get("content") {
        Some(content) if output.is_object() => content.clone(),
        _ => output.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inputs(value: Value) -> Inputs {
        value.as_object().cloned().unwrap_or_default()
    }

    fn outputs(pairs: &[(&str, Value)]) -> StepOutputs {
        pairs
            .iter()
            .map(|(id, value)| ((*id).to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn substitutes_content_of_mapping_output() {
        let realized = outputs(&[("1", json!({"content": "Hello", "path": "/w/a.txt"}))]);
        let resolved = resolve_inputs(
            &inputs(json!({"action": "write_text", "content": "ref:step:1"})),
            &realized,
        );
        assert_eq!(resolved["content"], "Hello");
        assert_eq!(resolved["action"], "write_text");
    }

    #[test]
    fn output_suffix_names_the_same_step() {
        let realized = outputs(&[("1", json!({"content": "Hello"}))]);
        let resolved = resolve_inputs(&inputs(json!({"content": "ref:step:1.output"})), &realized);
        assert_eq!(resolved["content"], "Hello");
    }

    #[test]
    fn non_mapping_output_substitutes_whole() {
        let realized = outputs(&[("a", json!("plain text")), ("b", json!({"stdout": "x"}))]);
        let resolved = resolve_inputs(
            &inputs(json!({"first": "ref:step:a", "second": "ref:step:b"})),
            &realized,
        );
        assert_eq!(resolved["first"], "plain text");
        assert_eq!(resolved["second"], json!({"stdout": "x"}));
    }

    #[test]
    fn unknown_reference_stays_verbatim() {
        let resolved = resolve_inputs(&inputs(json!({"content": "ref:step:99"})), &StepOutputs::new());
        assert_eq!(resolved["content"], "ref:step:99");
    }

    #[test]
    fn recurses_into_nested_mappings_and_lists() {
        let realized = outputs(&[("1", json!({"content": "X"}))]);
        let resolved = resolve_inputs(
            &inputs(json!({
                "nested": {"deep": {"value": "ref:step:1"}},
                "items": ["ref:step:1", 3, {"k": "ref:step:1"}],
                "count": 2,
                "flag": true
            })),
            &realized,
        );
        assert_eq!(resolved["nested"]["deep"]["value"], "X");
        assert_eq!(resolved["items"], json!(["X", 3, {"k": "X"}]));
        assert_eq!(resolved["count"], 2);
        assert_eq!(resolved["flag"], true);
    }

    #[test]
    fn parse_reference_rejects_non_references() {
        assert_eq!(parse_reference("ref:step:2"), Some("2"));
        assert_eq!(parse_reference("ref:step:setup.output"), Some("setup"));
        assert_eq!(parse_reference("ref:step:"), None);
        assert_eq!(parse_reference("step:1"), None);
        assert_eq!(parse_reference("hello"), None);
    }
}
