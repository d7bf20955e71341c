//! The parsing states. Each variant of [`State`] owns exactly the partial
//! match data of its encoding; a transition always builds a fresh state.
mod json;
mod sentinel;
mod text;
mod xml;

pub(crate) use json::{JsonInitState, JsonToolState};
pub(crate) use sentinel::{SentinelContentState, SentinelInitState};
pub(crate) use text::TextState;
pub(crate) use xml::{
    CustomXmlTagParsingState, XmlTagInitState, XmlToolState, XmlWrappedToolParsingState,
};

use super::{ParserContext, scan::OpenerKind};
use crate::error::ParserError;

#[derive(Debug)]
pub(crate) enum State {
    Text(TextState),
    JsonInit(JsonInitState),
    JsonTool(JsonToolState),
    XmlTagInit(XmlTagInitState),
    XmlTool(XmlToolState),
    XmlWrapped(XmlWrappedToolParsingState),
    CustomTag(CustomXmlTagParsingState),
    SentinelInit(SentinelInitState),
    SentinelContent(SentinelContentState),
}

impl State {
    pub(crate) fn text() -> Self {
        State::Text(TextState)
    }

    /// The state that validates a candidate found by the text scan.
    pub(crate) fn opening(kind: OpenerKind) -> Self {
        match kind {
            OpenerKind::Json => State::JsonInit(JsonInitState),
            OpenerKind::Tag(tag) => State::XmlTagInit(XmlTagInitState::new(tag)),
            OpenerKind::Sentinel => State::SentinelInit(SentinelInitState),
        }
    }

    /// Processes as much buffered input as possible.
    ///
    /// Returns once the state either scheduled a transition or needs more
    /// input.
    pub(crate) fn run(&mut self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        match self {
            State::Text(s) => s.run(ctx),
            State::JsonInit(s) => s.run(ctx),
            State::JsonTool(s) => s.run(ctx),
            State::XmlTagInit(s) => s.run(ctx),
            State::XmlTool(s) => s.run(ctx),
            State::XmlWrapped(s) => s.run(ctx),
            State::CustomTag(s) => s.run(ctx),
            State::SentinelInit(s) => s.run(ctx),
            State::SentinelContent(s) => s.run(ctx),
        }
    }

    /// Flushes whatever the state holds at end of stream and closes its
    /// segment. Input a state cannot use is left for the text state.
    pub(crate) fn finalize(&mut self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        match self {
            State::Text(s) => s.finalize(ctx),
            State::JsonInit(_) | State::XmlTagInit(_) | State::SentinelInit(_) => Ok(()),
            State::JsonTool(s) => s.finalize(ctx),
            State::XmlTool(s) => s.finalize(ctx),
            State::XmlWrapped(s) => s.finalize(ctx),
            State::CustomTag(s) => s.finalize(ctx),
            State::SentinelContent(s) => s.finalize(ctx),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            State::Text(_) => "text",
            State::JsonInit(_) => "json_init",
            State::JsonTool(_) => "json_tool",
            State::XmlTagInit(_) => "xml_tag_init",
            State::XmlTool(_) => "xml_tool",
            State::XmlWrapped(_) => "xml_wrapped",
            State::CustomTag(_) => "custom_tag",
            State::SentinelInit(_) => "sentinel_init",
            State::SentinelContent(_) => "sentinel_content",
        }
    }
}

/// Shortest trailing closer fragment dropped at end of stream. A lone `<` or
/// `[` stays content.
const MIN_CLOSER_FRAGMENT: usize = 2;

/// Length of the trailing fragment of one of `closers` that the stream ended
/// in the middle of, or 0 when the tail is content.
fn closer_fragment_len(rest: &str, closers: &[&str]) -> usize {
    let fragment = closers
        .iter()
        .map(|closer| super::scan::partial_suffix_len(rest, closer))
        .max()
        .unwrap_or(0);
    if fragment < MIN_CLOSER_FRAGMENT {
        0
    } else {
        fragment
    }
}

/// Emits the rest of the buffer as content, minus a trailing closer
/// fragment.
fn flush_truncated(ctx: &mut ParserContext, closers: &[&str]) -> Result<(), ParserError> {
    let rest = ctx.remaining();
    let keep = rest.len() - closer_fragment_len(rest, closers);
    ctx.flush_content(keep)?;
    ctx.consume_remaining();
    Ok(())
}
