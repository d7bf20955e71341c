//! Segment events produced by the streaming parser.
//!
//! A segment is a maximal run of one semantic kind of output, bracketed by a
//! [`SegmentEventType::Start`] and a [`SegmentEventType::End`] event, with any
//! number of [`SegmentEventType::Content`] deltas in between.
//!
//! # Examples
//!
//! ```
//! use toolstream::{SegmentEventType, SegmentType, StreamingParser};
//!
//! let mut parser = StreamingParser::default();
//! let mut events = parser.feed("<run_bash>ls</run_bash>").unwrap();
//! events.extend(parser.finalize().unwrap());
//!
//! assert_eq!(events[0].event_type, SegmentEventType::Start);
//! assert_eq!(events[0].segment_type, Some(SegmentType::RunBash));
//! assert_eq!(events[1].delta(), Some("ls"));
//! assert_eq!(events[2].event_type, SegmentEventType::End);
//! ```
use core::{fmt, str::FromStr};

/// Ordered key/value metadata attached to a segment's start event.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The semantic kind of a segment.
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(any(test, feature = "serde"), serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentType {
    /// Prose for the user.
    Text,
    /// A generic tool call, either raw JSON or named through metadata.
    ToolCall,
    /// Full contents of the file named by the `path` metadata.
    WriteFile,
    /// A patch for the file named by the `path` metadata.
    PatchFile,
    /// A shell command.
    RunBash,
    /// Model reasoning not meant as an answer.
    Reasoning,
}

impl SegmentType {
    /// The snake_case name used in sentinel headers and serialized events.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SegmentType::Text => "text",
            SegmentType::ToolCall => "tool_call",
            SegmentType::WriteFile => "write_file",
            SegmentType::PatchFile => "patch_file",
            SegmentType::RunBash => "run_bash",
            SegmentType::Reasoning => "reasoning",
        }
    }

    /// Whether segments of this type carry a tool invocation.
    #[must_use]
    pub fn is_tool(self) -> bool {
        matches!(
            self,
            SegmentType::ToolCall
                | SegmentType::WriteFile
                | SegmentType::PatchFile
                | SegmentType::RunBash
        )
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(SegmentType::Text),
            "tool_call" | "tool" => Ok(SegmentType::ToolCall),
            "write_file" => Ok(SegmentType::WriteFile),
            "patch_file" => Ok(SegmentType::PatchFile),
            "run_bash" | "run_terminal_cmd" => Ok(SegmentType::RunBash),
            "reasoning" => Ok(SegmentType::Reasoning),
            _ => Err(()),
        }
    }
}

/// What a [`SegmentEvent`] does to its segment.
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(any(test, feature = "serde"), serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentEventType {
    /// Opens a segment and carries its type and metadata.
    Start,
    /// One delta of the open segment.
    Content,
    /// Closes the segment.
    End,
}

/// Payload of a [`SegmentEvent`].
///
/// `delta` is present only on content events and `metadata` only on start
/// events.
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize)
)]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SegmentPayload {
    /// Text appended to the segment.
    #[cfg_attr(
        any(test, feature = "serde"),
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub delta: Option<String>,
    /// Attributes of the segment, such as a file path or tool name.
    #[cfg_attr(
        any(test, feature = "serde"),
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub metadata: Option<Metadata>,
}

/// One START, CONTENT or END event for a segment.
///
/// Serialized (with the `serde` feature) as
/// `{"type": .., "segment_id": .., "segment_type": .., "payload": {..}}`,
/// where `segment_type` is omitted for content and end events.
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize)
)]
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentEvent {
    #[cfg_attr(any(test, feature = "serde"), serde(rename = "type"))]
    /// Start, content or end.
    pub event_type: SegmentEventType,
    /// Unique within one parser between resets.
    pub segment_id: String,
    /// Set on start events only.
    #[cfg_attr(
        any(test, feature = "serde"),
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub segment_type: Option<SegmentType>,
    #[cfg_attr(any(test, feature = "serde"), serde(default))]
    /// Delta or metadata, depending on the event type.
    pub payload: SegmentPayload,
}

impl SegmentEvent {
    pub(crate) fn start(
        segment_id: String,
        segment_type: SegmentType,
        metadata: Option<Metadata>,
    ) -> Self {
        Self {
            event_type: SegmentEventType::Start,
            segment_id,
            segment_type: Some(segment_type),
            payload: SegmentPayload {
                delta: None,
                metadata,
            },
        }
    }

    pub(crate) fn content(segment_id: String, delta: String) -> Self {
        Self {
            event_type: SegmentEventType::Content,
            segment_id,
            segment_type: None,
            payload: SegmentPayload {
                delta: Some(delta),
                metadata: None,
            },
        }
    }

    pub(crate) fn end(segment_id: String) -> Self {
        Self {
            event_type: SegmentEventType::End,
            segment_id,
            segment_type: None,
            payload: SegmentPayload::default(),
        }
    }

    /// The content delta, if this is a content event.
    #[must_use]
    pub fn delta(&self) -> Option<&str> {
        self.payload.delta.as_deref()
    }

    /// The start metadata, if any.
    #[must_use]
    pub fn metadata(&self) -> Option<&Metadata> {
        self.payload.metadata.as_ref()
    }
}
