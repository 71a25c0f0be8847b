//! Normalization of native function calls into [`ModelMessage`]s.

use serde_json::Value;
use thiserror::Error;

use crate::schemas::{FunctionCall, ModelMessage};

/// Some providers namespace function names; `functions.add` and `add`
/// are the same tool.
const NAMESPACE_PREFIX: &str = "functions.";

const FALLBACK_THOUGHTS: &str = "Calling a tool to make progress on the goal.";

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("function arguments are not valid JSON: {0}")]
    InvalidArguments(#[from] serde_json::Error),

    #[error("function arguments must be a JSON object")]
    NotAnObject,
}

/// Convert a provider function call into the ReAct decision shape.
pub fn normalize_function_call(
    call: &FunctionCall,
    assistant_text: &str,
) -> Result<ModelMessage, NormalizeError> {
    let name = call
        .name
        .strip_prefix(NAMESPACE_PREFIX)
        .unwrap_or(&call.name);

    let mut params: Value = if call.arguments.trim().is_empty() {
        Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_str(&call.arguments)?
    };
    if !params.is_object() {
        return Err(NormalizeError::NotAnObject);
    }
    normalize_numbers(&mut params);

    let thoughts = if assistant_text.trim().is_empty() {
        FALLBACK_THOUGHTS.to_string()
    } else {
        assistant_text.trim().to_string()
    };

    Ok(ModelMessage::tool_call(name, params).with_thoughts(thoughts))
}

/// Providers spell integral numbers any way they like (`2.0`, `2e0`).
/// Rewrite exactly-integral values to integers so integer-typed
/// parameters validate.
fn normalize_numbers(value: &mut Value) {
    match value {
        Value::Number(n) => {
            if n.as_i64().is_none() && n.as_u64().is_none() {
                if let Some(f) = n.as_f64() {
                    if f.fract() == 0.0 && f.abs() <= (1i64 << 53) as f64 {
                        *value = Value::from(f as i64);
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                normalize_numbers(item);
            }
        }
        Value::Object(map) => {
            for (_, item) in map.iter_mut() {
                normalize_numbers(item);
            }
        }
        _ => {}
    }
}
