use serde_json::Value;

use super::{State, flush_truncated};
use crate::{
    error::ParserError,
    options::SentinelMarkers,
    parser::{
        ParserContext,
        scan::{JsonScanner, head},
    },
    segment::{Metadata, SegmentType},
};

/// Longest sentinel header buffered before it is given up on.
const MAX_HEADER_BYTES: usize = 4096;

#[derive(Debug, PartialEq)]
enum Header {
    /// More input is needed.
    Incomplete,
    /// Not a header; the first `len` bytes go out as text.
    Invalid(usize),
    Parsed {
        len: usize,
        segment_type: SegmentType,
        metadata: Option<Metadata>,
    },
}

fn skip_whitespace(text: &str, at: usize) -> usize {
    let rest = &text[at..];
    at + rest.len() - rest.trim_start().len()
}

/// Parses `<start> {json} <header_end>` at the beginning of `text`.
///
/// A header that does not end within [`MAX_HEADER_BYTES`] is invalid; only
/// the start marker is then given back as text.
fn parse_header(text: &str, markers: &SentinelMarkers) -> Header {
    match parse_header_within(head(text, MAX_HEADER_BYTES), markers) {
        Header::Incomplete if text.len() > MAX_HEADER_BYTES => {
            Header::Invalid(markers.start.len())
        }
        header => header,
    }
}

fn parse_header_within(text: &str, markers: &SentinelMarkers) -> Header {
    let Some(after_marker) = text.get(markers.start.len()..) else {
        return Header::Incomplete;
    };
    let json_start = skip_whitespace(text, text.len() - after_marker.len());
    match text[json_start..].chars().next() {
        None => return Header::Incomplete,
        Some('{') => {}
        Some(_) => return Header::Invalid(json_start),
    }
    let Some(json_len) = JsonScanner::default().scan(&text[json_start..]) else {
        return Header::Incomplete;
    };
    let json_end = json_start + json_len;
    let close_at = skip_whitespace(text, json_end);
    let after_json = &text[close_at..];
    if !after_json.starts_with(markers.header_end.as_str()) {
        if markers.header_end.starts_with(after_json) {
            return Header::Incomplete;
        }
        return Header::Invalid(close_at);
    }
    let len = close_at + markers.header_end.len();

    let Ok(Value::Object(mut header)) = serde_json::from_str(&text[json_start..json_end]) else {
        return Header::Invalid(len);
    };
    let Some(segment_type) = header
        .remove("type")
        .and_then(|ty| ty.as_str().and_then(|ty| ty.parse::<SegmentType>().ok()))
    else {
        return Header::Invalid(len);
    };
    Header::Parsed {
        len,
        segment_type,
        metadata: (!header.is_empty()).then_some(header),
    }
}

/// Reads the JSON header that follows a sentinel start marker.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct SentinelInitState;

impl SentinelInitState {
    pub(crate) fn run(self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        match parse_header(ctx.remaining(), &ctx.config().sentinel) {
            Header::Incomplete => {}
            Header::Invalid(len) => {
                tracing::debug!(position = ctx.position(), "malformed sentinel header");
                ctx.flush_text(len)?;
                ctx.transition_to(State::text());
            }
            Header::Parsed {
                len,
                segment_type,
                metadata,
            } => {
                ctx.consume(len);
                let closer = ctx.config().sentinel.end.clone();
                ctx.transition_to(State::SentinelContent(SentinelContentState {
                    segment_type,
                    metadata,
                    closer,
                    started: false,
                }));
            }
        }
        Ok(())
    }
}

/// Body of a sentinel segment, streamed until the end marker.
#[derive(Debug)]
pub(crate) struct SentinelContentState {
    segment_type: SegmentType,
    metadata: Option<Metadata>,
    closer: String,
    started: bool,
}

impl SentinelContentState {
    fn start(&mut self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        if !self.started {
            ctx.emit_segment_start(self.segment_type, self.metadata.take())?;
            self.started = true;
        }
        Ok(())
    }

    pub(crate) fn run(&mut self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        self.start(ctx)?;
        if ctx.stream_content_until(&self.closer)? {
            ctx.emit_segment_end();
            ctx.transition_to(State::text());
        }
        Ok(())
    }

    pub(crate) fn finalize(&mut self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        self.start(ctx)?;
        flush_truncated(ctx, &[self.closer.as_str()])?;
        ctx.emit_segment_end();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn parse(text: &str) -> Header {
        parse_header(text, &SentinelMarkers::default())
    }

    #[test]
    fn parses_type_and_metadata() {
        let text = r#"[[SEG_START {"type":"write_file","path":"a.py"} ]]print(1)"#;
        let Header::Parsed {
            len,
            segment_type,
            metadata,
        } = parse(text)
        else {
            panic!("header should parse");
        };
        assert_eq!(&text[len..], "print(1)");
        assert_eq!(segment_type, SegmentType::WriteFile);
        assert_eq!(
            Value::Object(metadata.unwrap()),
            json!({"path": "a.py"})
        );
    }

    #[test]
    fn header_without_extra_keys_has_no_metadata() {
        let text = "[[SEG_START\n{\"type\": \"reasoning\"}]]";
        assert_eq!(
            parse(text),
            Header::Parsed {
                len: text.len(),
                segment_type: SegmentType::Reasoning,
                metadata: None
            }
        );
    }

    #[rstest]
    #[case("[[SEG_START")]
    #[case("[[SEG_START ")]
    #[case(r#"[[SEG_START {"type":"te"#)]
    #[case(r#"[[SEG_START {"type":"text"} ]"#)]
    fn waits_for_the_rest(#[case] text: &str) {
        assert_eq!(parse(text), Header::Incomplete);
    }

    #[rstest]
    #[case("[[SEG_START x", 12)]
    #[case(r#"[[SEG_START {"type":"bogus"}]] tail"#, 30)]
    #[case(r#"[[SEG_START {"path":"a"}]]"#, 26)]
    #[case(r#"[[SEG_START {"type":"text"} x"#, 28)]
    fn rejects_malformed_headers(#[case] text: &str, #[case] len: usize) {
        assert_eq!(parse(text), Header::Invalid(len));
    }

    #[test]
    fn oversized_header_is_rejected() {
        let text = format!(r#"[[SEG_START {{"type":"text","pad":"{}"#, "x".repeat(MAX_HEADER_BYTES));
        assert_eq!(parse(&text), Header::Invalid("[[SEG_START".len()));
    }
}
