use core::str::FromStr;

use crate::error::UnknownVariant;

/// Environment variable read by [`ParserVariant::from_env`].
pub const PARSER_VARIANT_ENV: &str = "TOOLSTREAM_PARSER";

/// JSON prefixes that confirm a `{` or `[` in the text as the start of a tool
/// call. Whitespace between structural tokens is ignored when matching.
pub const DEFAULT_JSON_SIGNATURES: &[&str] = &[
    r#"{"tool""#,
    r#"{"tool_calls""#,
    r#"{"name""#,
    r#"{"function""#,
    r#"[{"tool""#,
    r#"[{"name""#,
    r#"[{"function""#,
];

/// Which tool-call encodings a parser recognizes.
///
/// Encodings that are not enabled are passed through as plain text.
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(any(test, feature = "serde"), serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParserVariant {
    /// Inline JSON objects only.
    Json,
    /// `<tool name="..">` wrappers and the custom file/bash tags.
    Xml,
    /// Sentinel headers only.
    Sentinel,
    /// Every encoding at once.
    #[default]
    Mixed,
    /// No parsing: everything is one text segment.
    PassThrough,
}

impl ParserVariant {
    /// Whether inline JSON tool calls are recognized.
    #[must_use]
    pub fn json_enabled(self) -> bool {
        matches!(self, ParserVariant::Json | ParserVariant::Mixed)
    }

    /// Whether the XML-like tags are recognized.
    #[must_use]
    pub fn xml_enabled(self) -> bool {
        matches!(self, ParserVariant::Xml | ParserVariant::Mixed)
    }

    /// Whether sentinel headers are recognized.
    #[must_use]
    pub fn sentinel_enabled(self) -> bool {
        matches!(self, ParserVariant::Sentinel | ParserVariant::Mixed)
    }

    /// Reads the variant from `TOOLSTREAM_PARSER`, falling back to
    /// [`ParserVariant::Mixed`] when the variable is unset or unrecognized.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(PARSER_VARIANT_ENV) {
            Ok(raw) => raw.parse().unwrap_or_else(|err| {
                tracing::warn!("{err}; falling back to the mixed parser");
                ParserVariant::Mixed
            }),
            Err(_) => ParserVariant::Mixed,
        }
    }
}

impl FromStr for ParserVariant {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ParserVariant::Json),
            "xml" => Ok(ParserVariant::Xml),
            "sentinel" => Ok(ParserVariant::Sentinel),
            "mixed" | "all" => Ok(ParserVariant::Mixed),
            "passthrough" | "pass_through" | "none" => Ok(ParserVariant::PassThrough),
            _ => Err(UnknownVariant(s.to_string())),
        }
    }
}

/// Start and end markers of the sentinel encoding.
///
/// A sentinel segment looks like
/// `[[SEG_START {"type":"write_file","path":"a.py"}]]...[[SEG_END]]`.
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize)
)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelMarkers {
    /// Opens the header.
    pub start: String,
    /// Closes the JSON header.
    pub header_end: String,
    /// Closes the segment body.
    pub end: String,
}

impl Default for SentinelMarkers {
    fn default() -> Self {
        Self {
            start: "[[SEG_START".to_string(),
            header_end: "]]".to_string(),
            end: "[[SEG_END]]".to_string(),
        }
    }
}

/// Configuration for a [`StreamingParser`](crate::StreamingParser) and the
/// handler built around it.
///
/// # Examples
///
/// ```rust
/// use toolstream::{ParserConfig, ParserVariant, StreamingParser};
///
/// let parser = StreamingParser::new(ParserConfig {
///     variant: ParserVariant::Xml,
///     segment_id_prefix: Some("agent-1".into()),
///     ..Default::default()
/// });
/// ```
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize)
)]
#[cfg_attr(any(test, feature = "serde"), serde(default))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Encodings to recognize.
    pub variant: ParserVariant,

    /// Prefixes confirming a JSON candidate as a tool call. See
    /// [`DEFAULT_JSON_SIGNATURES`].
    pub json_signatures: Vec<String>,

    /// Markers of the sentinel encoding.
    pub sentinel: SentinelMarkers,

    /// Prepended to every segment id so that ids from several parsers in one
    /// process never collide.
    pub segment_id_prefix: Option<String>,

    /// Copied onto every decoded [`ToolInvocation`](crate::ToolInvocation).
    pub turn_id: Option<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            variant: ParserVariant::default(),
            json_signatures: DEFAULT_JSON_SIGNATURES
                .iter()
                .map(ToString::to_string)
                .collect(),
            sentinel: SentinelMarkers::default(),
            segment_id_prefix: None,
            turn_id: None,
        }
    }
}

impl ParserConfig {
    /// Default configuration with the given variant.
    #[must_use]
    pub fn with_variant(variant: ParserVariant) -> Self {
        Self {
            variant,
            ..Self::default()
        }
    }
}
