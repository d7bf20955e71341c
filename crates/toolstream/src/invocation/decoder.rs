use serde_json::{Map, Value};

use crate::error::DecodeError;

/// One tool call recovered from a finished tool-call payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToolCall {
    /// Name of the tool to run.
    pub name: String,
    /// Arguments keyed by parameter name.
    pub arguments: Map<String, Value>,
    /// Call id carried by the payload itself, if any.
    pub id: Option<String>,
}

/// Turns the text of a finished JSON tool-call segment into tool calls.
///
/// Implemented for closures, so a custom decoder can be injected without a
/// new type:
///
/// ```rust
/// use toolstream::{DecodeError, DecodedToolCall, ToolInvocationAdapter};
///
/// let adapter = ToolInvocationAdapter::with_decoder(|payload: &str| {
///     Ok::<_, DecodeError>(vec![DecodedToolCall {
///         name: "echo".into(),
///         arguments: [("raw".to_string(), payload.into())].into_iter().collect(),
///         id: None,
///     }])
/// });
/// ```
pub trait ToolCallDecoder: Send {
    /// Decodes `payload`. An empty vector means the payload held no calls.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] when the payload is not a tool call.
    fn decode(&self, payload: &str) -> Result<Vec<DecodedToolCall>, DecodeError>;
}

impl<F> ToolCallDecoder for F
where
    F: Fn(&str) -> Result<Vec<DecodedToolCall>, DecodeError> + Send,
{
    fn decode(&self, payload: &str) -> Result<Vec<DecodedToolCall>, DecodeError> {
        self(payload)
    }
}

/// The default decoder for inline JSON tool calls.
///
/// Accepted shapes, each also inside a top-level array or a `tool_calls`
/// array:
///
/// - `{"tool": {"function": "x", "parameters": {..}}}`
/// - `{"tool": "x", "arguments": {..}}`
/// - `{"name": "x", "arguments": {..}}`
/// - `{"function": {"name": "x", "arguments": "{..}"}}`
///
/// Arguments may be given under `arguments`, `parameters`, `args` or `input`,
/// either as an object or as a string holding a JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonToolCallDecoder;

const ARGUMENT_KEYS: [&str; 4] = ["arguments", "parameters", "args", "input"];

fn arguments(obj: &Map<String, Value>) -> Result<Option<Map<String, Value>>, DecodeError> {
    for key in ARGUMENT_KEYS {
        match obj.get(key) {
            None => {}
            Some(Value::Null) => return Ok(Some(Map::new())),
            Some(Value::Object(map)) => return Ok(Some(map.clone())),
            Some(Value::String(raw)) if raw.trim().is_empty() => return Ok(Some(Map::new())),
            Some(Value::String(raw)) => {
                return match serde_json::from_str(raw) {
                    Ok(Value::Object(map)) => Ok(Some(map)),
                    Ok(_) => Err(DecodeError::UnsupportedShape),
                    Err(err) => Err(DecodeError::InvalidJson(err.to_string())),
                };
            }
            Some(_) => return Err(DecodeError::UnsupportedShape),
        }
    }
    Ok(None)
}

fn decode_call(obj: &Map<String, Value>) -> Result<DecodedToolCall, DecodeError> {
    let id = obj.get("id").and_then(Value::as_str).map(ToString::to_string);
    for key in ["tool", "function"] {
        match obj.get(key) {
            Some(Value::Object(inner)) => {
                let mut call = decode_call(inner)?;
                if call.arguments.is_empty() {
                    call.arguments = arguments(obj)?.unwrap_or_default();
                }
                call.id = call.id.or(id);
                return Ok(call);
            }
            Some(Value::String(name)) if !name.is_empty() => {
                return Ok(DecodedToolCall {
                    name: name.clone(),
                    arguments: arguments(obj)?.unwrap_or_default(),
                    id,
                });
            }
            _ => {}
        }
    }
    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or(DecodeError::MissingToolName)?;
    Ok(DecodedToolCall {
        name: name.to_string(),
        arguments: arguments(obj)?.unwrap_or_default(),
        id,
    })
}

fn decode_value(value: &Value) -> Result<Vec<DecodedToolCall>, DecodeError> {
    match value {
        Value::Array(items) => {
            let mut calls = Vec::with_capacity(items.len());
            for item in items {
                calls.extend(decode_value(item)?);
            }
            Ok(calls)
        }
        Value::Object(obj) => match obj.get("tool_calls") {
            Some(calls @ Value::Array(_)) => decode_value(calls),
            Some(_) => Err(DecodeError::UnsupportedShape),
            None => decode_call(obj).map(|call| vec![call]),
        },
        _ => Err(DecodeError::UnsupportedShape),
    }
}

impl ToolCallDecoder for JsonToolCallDecoder {
    fn decode(&self, payload: &str) -> Result<Vec<DecodedToolCall>, DecodeError> {
        let value: Value = serde_json::from_str(payload.trim())
            .map_err(|err| DecodeError::InvalidJson(err.to_string()))?;
        decode_value(&value)
    }
}
