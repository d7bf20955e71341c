//! Incremental segmentation of streamed LLM output.
//!
//! Model output arrives as arbitrarily split text chunks that interleave prose
//! with tool-call directives in one of several encodings (inline JSON objects,
//! XML-like tags, sentinel headers). [`StreamingParser`] turns that stream into
//! ordered [`SegmentEvent`]s, and [`ToolInvocationAdapter`] decodes finished
//! tool-call segments into [`ToolInvocation`] records.
//! [`StreamingResponseHandler`] wires both together for a single turn.
//!
//! ```rust
//! use toolstream::{ParserVariant, SegmentType, StreamingResponseHandler};
//!
//! let mut handler = StreamingResponseHandler::from_variant(ParserVariant::Json);
//! handler.feed("Hello ").unwrap();
//! handler.feed(r#"{"tool":"x"}"#).unwrap();
//! handler.feed(" world").unwrap();
//! handler.finalize().unwrap();
//!
//! let starts: Vec<_> = handler
//!     .all_events()
//!     .iter()
//!     .filter_map(|e| e.segment_type)
//!     .collect();
//! assert_eq!(
//!     starts,
//!     vec![SegmentType::Text, SegmentType::ToolCall, SegmentType::Text]
//! );
//! assert_eq!(handler.all_invocations()[0].name, "x");
//! ```

mod error;
mod handler;
mod invocation;
mod markup;
mod options;
mod parser;
mod segment;

pub mod chunk_utils;

#[cfg(test)]
mod tests;

pub use error::{DecodeError, ParserError, UnknownVariant};
pub use handler::{HandlerCallbacks, StreamingResponseHandler};
pub use invocation::{
    DecodedToolCall, JsonToolCallDecoder, ToolCallDecoder, ToolInvocation, ToolInvocationAdapter,
};
pub use options::{DEFAULT_JSON_SIGNATURES, ParserConfig, ParserVariant, SentinelMarkers};
pub use parser::{EventEmitter, ParserContext, StreamingParser};
pub use segment::{Metadata, SegmentEvent, SegmentEventType, SegmentPayload, SegmentType};
