use super::State;
use crate::{
    error::ParserError,
    parser::{
        ParserContext,
        scan::{JsonScanner, head},
    },
    segment::SegmentType,
};

/// Longest candidate examined before a `{` or `[` is given up on.
const MAX_CANDIDATE_BYTES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Candidate {
    Confirmed,
    Undecided,
    Rejected,
}

/// Matches the start of `text` against the signatures, ignoring whitespace
/// outside of strings. The decision is made at the first character that
/// settles it.
fn classify(text: &str, signatures: &[String]) -> Candidate {
    if signatures.is_empty() {
        return Candidate::Confirmed;
    }
    let mut compact = String::new();
    let mut in_string = false;
    let mut escaped = false;
    for ch in head(text, MAX_CANDIDATE_BYTES).chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch.is_whitespace() {
            continue;
        } else if ch == '"' {
            in_string = true;
        }
        compact.push(ch);
        if signatures.iter().any(|sig| compact.starts_with(sig.as_str())) {
            return Candidate::Confirmed;
        }
        if !signatures.iter().any(|sig| sig.starts_with(&compact)) {
            return Candidate::Rejected;
        }
    }
    if text.len() > MAX_CANDIDATE_BYTES {
        Candidate::Rejected
    } else {
        Candidate::Undecided
    }
}

/// Decides whether a `{` or `[` in the text opens a JSON tool call.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct JsonInitState;

impl JsonInitState {
    pub(crate) fn run(self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        match classify(ctx.remaining(), &ctx.config().json_signatures) {
            Candidate::Confirmed => ctx.transition_to(State::JsonTool(JsonToolState::default())),
            Candidate::Undecided => {}
            Candidate::Rejected => {
                tracing::debug!(position = ctx.position(), "not a JSON tool call");
                ctx.flush_text(1)?;
                ctx.transition_to(State::text());
            }
        }
        Ok(())
    }
}

/// Streams a confirmed JSON tool call until its outermost value closes.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct JsonToolState {
    scanner: JsonScanner,
    started: bool,
}

impl JsonToolState {
    fn start(&mut self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        if !self.started {
            ctx.emit_segment_start(SegmentType::ToolCall, None)?;
            self.started = true;
        }
        Ok(())
    }

    pub(crate) fn run(&mut self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        self.start(ctx)?;
        let rest = ctx.remaining();
        let (len, complete) = match self.scanner.scan(rest) {
            Some(end) => (end, true),
            None => (rest.len(), false),
        };
        ctx.flush_content(len)?;
        if complete {
            ctx.emit_segment_end();
            ctx.transition_to(State::text());
        }
        Ok(())
    }

    pub(crate) fn finalize(&mut self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        self.start(ctx)?;
        ctx.flush_content(ctx.remaining().len())?;
        ctx.emit_segment_end();
        Ok(())
    }
}
