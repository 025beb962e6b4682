use jsonschema::{Draft, Validator};
use serde_json::{json, Map, Value};
use crate::models::error::ContractError;

const MAX_REF_DEPTH: usize = 64;

/// Copies `value` with every local `$ref` replaced by its target.
///
/// A reference back into a schema that is already being expanded is cut to
/// `{}`, as are external references; both then accept anything.
pub(crate) fn inline_refs(root: &Value, value: &Value) -> Value {
    let mut stack = Vec::new();
    inline(root, value, &mut stack)
}

fn inline(root: &Value, value: &Value, stack: &mut Vec<String>) -> Value {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                if stack.len() >= MAX_REF_DEPTH || stack.contains(reference) {
                    return json!({});
                }
                let Some(target) = reference.strip_prefix('#').and_then(|pointer| root.pointer(pointer)) else {
                    return json!({});
                };
                stack.push(reference.clone());
                let resolved = inline(root, target, stack);
                stack.pop();
                return resolved;
            }
            let mut out = Map::with_capacity(map.len());
            for (key, child) in map {
                out.insert(key.clone(), inline(root, child, stack));
            }
            translate_nullable(&mut out);
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|item| inline(root, item, stack)).collect()),
        other => other.clone(),
    }
}

// OpenAPI 3.0 `nullable: true` is `type: [T, "null"]` in JSON Schema.
fn translate_nullable(schema: &mut Map<String, Value>) {
    if schema.get("nullable") != Some(&Value::Bool(true)) {
        return;
    }
    if let Some(Value::String(kind)) = schema.get("type") {
        let kinds = json!([kind, "null"]);
        schema.insert("type".to_string(), kinds);
    }
    if let Some(Value::Array(values)) = schema.get_mut("enum") {
        if !values.contains(&Value::Null) {
            values.push(Value::Null);
        }
    }
}

pub(crate) fn compile(schema: &Value) -> Result<Validator, ContractError> {
    jsonschema::options()
        .with_draft(Draft::Draft4)
        .build(schema)
        .map_err(|err| ContractError::Schema(err.to_string()))
}

/// Validates `instance` against `schema` (already inlined). All messages are
/// joined into one.
pub(crate) fn validate(schema: &Value, instance: &Value) -> Result<(), String> {
    let validator = compile(schema).map_err(|err| err.to_string())?;
    let messages: Vec<String> = validator.iter_errors(instance).map(|err| err.to_string()).collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(messages.join("; "))
    }
}
