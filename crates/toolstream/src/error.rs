use thiserror::Error;

/// Contract violations of the parser and handler.
///
/// Model output never produces these: malformed delimiters degrade to text
/// instead. They surface bugs in a caller (feeding a finalized handler) or in
/// a parsing state (emitting content with no open segment).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParserError {
    /// `feed` was called after `finalize`.
    #[error("feed called after finalize; call reset() to reuse the handler")]
    FeedAfterFinalize,
    /// Content was emitted while no segment was open.
    #[error("no open segment to receive content")]
    NoOpenSegment,
    /// A segment was started while another one was still open.
    #[error("cannot start a segment while {open} is still open")]
    SegmentAlreadyOpen {
        /// Id of the segment that is still open.
        open: String,
    },
}

/// Why a finished tool-call segment could not be turned into an invocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The payload, or a string-encoded argument object, is not valid JSON.
    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),
    /// Valid JSON that is not a tool call.
    #[error("payload does not describe a tool call")]
    UnsupportedShape,
    /// A tool call without a non-empty name.
    #[error("tool call has no name")]
    MissingToolName,
    /// A built-in tool is missing an argument it cannot run without.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
}

/// Returned when a parser variant name is not recognized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown parser variant `{0}`")]
pub struct UnknownVariant(pub String);
