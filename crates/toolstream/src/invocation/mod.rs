//! Decoding finished tool segments into [`ToolInvocation`]s.
mod decoder;

use std::collections::{HashMap, HashSet};

pub use decoder::{DecodedToolCall, JsonToolCallDecoder, ToolCallDecoder};
use serde_json::{Map, Value};

use crate::{
    error::DecodeError,
    markup::arg_elements,
    segment::{Metadata, SegmentEvent, SegmentEventType, SegmentType},
};

/// A tool call ready to be executed.
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize)
)]
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    /// The payload's own call id, else the id of the segment it came from.
    pub id: String,
    /// Name of the tool to run.
    pub name: String,
    /// Arguments keyed by parameter name.
    pub arguments: Map<String, Value>,
    #[cfg_attr(
        any(test, feature = "serde"),
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    /// The turn the call belongs to, when the adapter was given one.
    pub turn_id: Option<String>,
}

#[derive(Debug)]
struct PendingSegment {
    segment_type: SegmentType,
    metadata: Option<Metadata>,
    content: String,
}

impl PendingSegment {
    fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()?
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Arguments of a tool call whose name came from segment metadata: `<arg>`
/// elements when the body is markup, a JSON object otherwise.
fn inline_arguments(body: &str) -> Result<Map<String, Value>, DecodeError> {
    let body = body.trim();
    if body.is_empty() {
        return Ok(Map::new());
    }
    if body.starts_with('<') {
        return Ok(arg_elements(body)
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect());
    }
    match serde_json::from_str(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(DecodeError::UnsupportedShape),
        Err(err) => Err(DecodeError::InvalidJson(err.to_string())),
    }
}

fn single(name: &str, arguments: Map<String, Value>) -> Vec<DecodedToolCall> {
    vec![DecodedToolCall {
        name: name.to_string(),
        arguments,
        id: None,
    }]
}

/// Accumulates tool segments from a [`SegmentEvent`] stream and decodes each
/// one when its end event arrives.
///
/// | segment      | invocation                                   |
/// |--------------|----------------------------------------------|
/// | `tool_call`  | named by `tool_name` metadata, else decoded  |
/// | `write_file` | `write_file {path, content}`                 |
/// | `patch_file` | `patch_file {path, patch}`                   |
/// | `run_bash`   | `run_bash {command}`                         |
///
/// Segments that fail to decode are logged at `warn` and produce nothing.
pub struct ToolInvocationAdapter {
    decoder: Box<dyn ToolCallDecoder>,
    turn_id: Option<String>,
    pending: HashMap<String, PendingSegment>,
    finished: HashSet<String>,
}

impl core::fmt::Debug for ToolInvocationAdapter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ToolInvocationAdapter")
            .field("turn_id", &self.turn_id)
            .field("pending", &self.pending)
            .field("finished", &self.finished.len())
            .finish_non_exhaustive()
    }
}

impl Default for ToolInvocationAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolInvocationAdapter {
    /// An adapter using [`JsonToolCallDecoder`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_decoder(JsonToolCallDecoder)
    }

    /// An adapter decoding metadata-less tool-call segments with `decoder`.
    #[must_use]
    pub fn with_decoder(decoder: impl ToolCallDecoder + 'static) -> Self {
        Self {
            decoder: Box::new(decoder),
            turn_id: None,
            pending: HashMap::new(),
            finished: HashSet::new(),
        }
    }

    /// Stamps every produced invocation with `turn_id`.
    #[must_use]
    pub fn with_turn_id(mut self, turn_id: Option<String>) -> Self {
        self.turn_id = turn_id;
        self
    }

    /// Feeds one event and returns the invocations it completed.
    pub fn process_event(&mut self, event: &SegmentEvent) -> Vec<ToolInvocation> {
        let id = event.segment_id.as_str();
        match event.event_type {
            SegmentEventType::Start => {
                let segment_type = event
                    .segment_type
                    .filter(|ty| ty.is_tool() && !self.finished.contains(id));
                if let Some(segment_type) = segment_type {
                    self.pending.insert(
                        id.to_string(),
                        PendingSegment {
                            segment_type,
                            metadata: event.metadata().cloned(),
                            content: String::new(),
                        },
                    );
                }
                Vec::new()
            }
            SegmentEventType::Content => {
                if let (Some(pending), Some(delta)) = (self.pending.get_mut(id), event.delta()) {
                    pending.content.push_str(delta);
                }
                Vec::new()
            }
            SegmentEventType::End => {
                let Some(pending) = self.pending.remove(id) else {
                    return Vec::new();
                };
                self.finished.insert(id.to_string());
                self.finish(id, &pending)
            }
        }
    }

    /// Feeds a batch of events in order.
    pub fn process_events<'a>(
        &mut self,
        events: impl IntoIterator<Item = &'a SegmentEvent>,
    ) -> Vec<ToolInvocation> {
        events
            .into_iter()
            .flat_map(|event| self.process_event(event))
            .collect()
    }

    /// Forgets all pending and finished segments.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.finished.clear();
    }

    fn finish(&self, segment_id: &str, pending: &PendingSegment) -> Vec<ToolInvocation> {
        match self.decode(pending) {
            Ok(calls) => calls
                .into_iter()
                .enumerate()
                .map(|(i, call)| ToolInvocation {
                    id: call.id.unwrap_or_else(|| match i {
                        0 => segment_id.to_string(),
                        _ => format!("{segment_id}_{i}"),
                    }),
                    name: call.name,
                    arguments: call.arguments,
                    turn_id: self.turn_id.clone(),
                })
                .collect(),
            Err(err) => {
                tracing::warn!(
                    segment_id,
                    segment_type = %pending.segment_type,
                    error = %err,
                    "dropping undecodable tool segment"
                );
                Vec::new()
            }
        }
    }

    fn decode(&self, pending: &PendingSegment) -> Result<Vec<DecodedToolCall>, DecodeError> {
        let body = pending.content.as_str();
        match pending.segment_type {
            SegmentType::ToolCall => match pending
                .meta_str("tool_name")
                .or_else(|| pending.meta_str("name"))
            {
                Some(name) => Ok(single(name, inline_arguments(body)?)),
                None => self.decoder.decode(body),
            },
            SegmentType::WriteFile | SegmentType::PatchFile => {
                let path = pending
                    .meta_str("path")
                    .ok_or(DecodeError::MissingField("path"))?;
                let (name, key) = if pending.segment_type == SegmentType::WriteFile {
                    ("write_file", "content")
                } else {
                    ("patch_file", "patch")
                };
                let mut arguments = Map::new();
                arguments.insert("path".to_string(), path.into());
                arguments.insert(key.to_string(), body.into());
                Ok(single(name, arguments))
            }
            SegmentType::RunBash => {
                let command = body.trim();
                if command.is_empty() {
                    return Err(DecodeError::MissingField("command"));
                }
                let mut arguments = Map::new();
                arguments.insert("command".to_string(), command.into());
                Ok(single("run_bash", arguments))
            }
            SegmentType::Text | SegmentType::Reasoning => Ok(Vec::new()),
        }
    }
}
