use serde_json::Value;

use super::{State, flush_truncated};
use crate::{
    error::ParserError,
    markup::{ARG_CLOSE, find_arg_open, parse_attributes},
    parser::{
        ParserContext,
        scan::{XmlTag, head},
    },
    segment::{Metadata, SegmentType},
};

/// Longest opening tag buffered before the candidate is given up on.
const MAX_OPEN_TAG_BYTES: usize = 1024;

const ARGUMENTS_CLOSE: &str = "</arguments>";

/// Closers that end a wrapped tool call. Models mix them up freely, so any of
/// them closes any wrapper.
const WRAPPER_CLOSERS: [&str; 3] = ["</tool>", "</run_bash>", "</run_terminal_cmd>"];

/// Bodies that start with one of these use the wrapped argument layout.
const ARGUMENT_MARKUP: [&str; 2] = ["<arguments>", "<arg "];

/// How a tool body is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// `<arguments>` / `<arg name="..">` markup.
    Arguments,
    /// The payload itself, verbatim.
    Bare,
}

/// Judges `body` by its first non-blank characters. `None` while it is blank
/// or could still grow into argument markup.
fn sniff_layout(body: &str) -> Option<Layout> {
    let body = body.trim_start();
    if ARGUMENT_MARKUP.iter().any(|marker| body.starts_with(marker)) {
        return Some(Layout::Arguments);
    }
    if body.is_empty() || ARGUMENT_MARKUP.iter().any(|marker| marker.starts_with(body)) {
        return None;
    }
    Some(Layout::Bare)
}

/// Start of the first `<arg ` tag in `text` that has no closing `>` yet.
fn unfinished_arg_open(text: &str) -> Option<usize> {
    text.match_indices("<arg").map(|(at, _)| at).find(|&at| {
        text[at + 4..].starts_with(char::is_whitespace) && find_tag_end(text, at).is_none()
    })
}

/// Position of the `>` closing the tag that starts `text`, skipping quoted
/// attribute values.
fn find_tag_end(text: &str, from: usize) -> Option<usize> {
    let mut quote = None;
    for (idx, ch) in text.get(from..)?.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == '>' => return Some(from + idx),
            None => {}
        }
    }
    None
}

fn attr<'a>(attrs: &'a Metadata, key: &str) -> Option<&'a str> {
    attrs
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// What an accepted opening tag turns into.
struct Opening {
    segment_type: SegmentType,
    metadata: Option<Metadata>,
    next: State,
}

impl Opening {
    fn resolve(tag: XmlTag, attrs: &Metadata) -> Option<Self> {
        match tag {
            XmlTag::Tool => {
                let name = attr(attrs, "name")?;
                let wrapped = match name {
                    "run_bash" | "run_terminal_cmd" => XmlWrappedToolParsingState::run_bash(),
                    "write_file" => XmlWrappedToolParsingState::write_file(),
                    "patch_file" => XmlWrappedToolParsingState::patch_file(),
                    _ => {
                        let mut metadata = Metadata::new();
                        metadata.insert("tool_name".to_string(), name.into());
                        return Some(Self {
                            segment_type: SegmentType::ToolCall,
                            metadata: Some(metadata.clone()),
                            next: State::XmlTool(XmlToolState::new(metadata)),
                        });
                    }
                };
                Some(Self {
                    segment_type: wrapped.segment_type,
                    metadata: None,
                    next: State::XmlWrapped(wrapped),
                })
            }
            XmlTag::WriteFile | XmlTag::PatchFile => {
                let mut metadata = Metadata::new();
                metadata.insert("path".to_string(), attr(attrs, "path")?.into());
                let segment_type = if tag == XmlTag::WriteFile {
                    SegmentType::WriteFile
                } else {
                    SegmentType::PatchFile
                };
                Some(Self {
                    segment_type,
                    metadata: Some(metadata.clone()),
                    next: State::CustomTag(CustomXmlTagParsingState::new(
                        segment_type,
                        tag.closer(),
                        Some(metadata),
                        false,
                    )),
                })
            }
            XmlTag::RunBash | XmlTag::RunTerminalCmd => Some(Self {
                segment_type: SegmentType::RunBash,
                metadata: None,
                next: State::CustomTag(CustomXmlTagParsingState::new(
                    SegmentType::RunBash,
                    tag.closer(),
                    None,
                    true,
                )),
            }),
        }
    }
}

/// Buffers an opening tag until its `>` and decides what it opens.
#[derive(Debug, Clone, Copy)]
pub(crate) struct XmlTagInitState {
    tag: XmlTag,
}

impl XmlTagInitState {
    pub(crate) fn new(tag: XmlTag) -> Self {
        Self { tag }
    }

    fn reject(self, ctx: &mut ParserContext, reason: &str) -> Result<(), ParserError> {
        tracing::debug!(
            tag = self.tag.name(),
            position = ctx.position(),
            reason,
            "not a tool tag"
        );
        ctx.flush_text(1)?;
        ctx.transition_to(State::text());
        Ok(())
    }

    pub(crate) fn run(self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        let rest = ctx.remaining();
        let name_end = 1 + self.tag.name().len();
        match rest.get(name_end..).and_then(|after| after.chars().next()) {
            None => return Ok(()),
            Some(ch) if ch.is_whitespace() || ch == '>' || ch == '/' => {}
            Some(_) => return self.reject(ctx, "tag name continues"),
        }
        let Some(gt) = find_tag_end(head(rest, MAX_OPEN_TAG_BYTES), name_end) else {
            if rest.len() > MAX_OPEN_TAG_BYTES {
                return self.reject(ctx, "opening tag too long");
            }
            return Ok(());
        };
        let inner = &rest[name_end..gt];
        let self_closing = inner.trim_end().ends_with('/');
        let Some(opening) = Opening::resolve(self.tag, &parse_attributes(inner)) else {
            return self.reject(ctx, "missing required attribute");
        };
        ctx.consume(gt + 1);
        if self_closing {
            ctx.emit_segment_start(opening.segment_type, opening.metadata)?;
            ctx.emit_segment_end();
            ctx.transition_to(State::text());
        } else {
            ctx.transition_to(opening.next);
        }
        Ok(())
    }
}

/// A generic `<tool name="..">` call. The inner markup is streamed raw.
#[derive(Debug)]
pub(crate) struct XmlToolState {
    metadata: Option<Metadata>,
    started: bool,
}

impl XmlToolState {
    const CLOSER: &'static str = "</tool>";

    fn new(metadata: Metadata) -> Self {
        Self {
            metadata: Some(metadata),
            started: false,
        }
    }

    fn start(&mut self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        if !self.started {
            ctx.emit_segment_start(SegmentType::ToolCall, self.metadata.take())?;
            self.started = true;
        }
        Ok(())
    }

    pub(crate) fn run(&mut self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        self.start(ctx)?;
        if ctx.stream_content_until(Self::CLOSER)? {
            ctx.emit_segment_end();
            ctx.transition_to(State::text());
        }
        Ok(())
    }

    pub(crate) fn finalize(&mut self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        self.start(ctx)?;
        flush_truncated(ctx, &[Self::CLOSER])?;
        ctx.emit_segment_end();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for the body to show its layout.
    Sniffing,
    /// A body without argument markup, streamed until a wrapper closer.
    Bare,
    /// Discarding wrapper markup and collecting metadata arguments.
    SeekingContent,
    /// Inside the content argument.
    Streaming,
    /// Swallowing closers after the content argument.
    Closing,
}

/// A tool call whose payload sits in one `<arg>` of an `<arguments>` list,
/// e.g. `<tool name="run_bash"><arguments><arg name="command">ls</arg></arguments></tool>`.
///
/// Only the content argument is streamed. Arguments listed in
/// `metadata_args` that precede it are attached to the start event; other
/// markup in the wrapper is dropped. A body with no argument markup at all is
/// the payload itself, e.g. `<tool name="run_bash">ls</tool>`.
#[derive(Debug)]
pub(crate) struct XmlWrappedToolParsingState {
    segment_type: SegmentType,
    content_arg: &'static str,
    metadata_args: &'static [&'static str],
    metadata: Metadata,
    phase: Phase,
}

impl XmlWrappedToolParsingState {
    fn new(
        segment_type: SegmentType,
        content_arg: &'static str,
        metadata_args: &'static [&'static str],
    ) -> Self {
        Self {
            segment_type,
            content_arg,
            metadata_args,
            metadata: Metadata::new(),
            phase: Phase::Sniffing,
        }
    }

    pub(crate) fn run_bash() -> Self {
        Self::new(SegmentType::RunBash, "command", &[])
    }

    pub(crate) fn write_file() -> Self {
        Self::new(SegmentType::WriteFile, "content", &["path"])
    }

    pub(crate) fn patch_file() -> Self {
        Self::new(SegmentType::PatchFile, "patch", &["path"])
    }

    fn take_metadata(&mut self) -> Option<Metadata> {
        (!self.metadata.is_empty()).then(|| std::mem::take(&mut self.metadata))
    }

    pub(crate) fn run(&mut self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        loop {
            let advanced = match self.phase {
                Phase::Sniffing => self.sniff(ctx)?,
                Phase::Bare => return Self::stream_bare(ctx),
                Phase::SeekingContent => self.seek_content(ctx)?,
                Phase::Streaming => self.stream(ctx)?,
                Phase::Closing => return Self::close(ctx),
            };
            if !advanced {
                return Ok(());
            }
        }
    }

    fn sniff(&mut self, ctx: &mut ParserContext) -> Result<bool, ParserError> {
        match sniff_layout(ctx.remaining()) {
            None => Ok(false),
            Some(Layout::Arguments) => {
                self.phase = Phase::SeekingContent;
                Ok(true)
            }
            Some(Layout::Bare) => {
                let metadata = self.take_metadata();
                ctx.emit_segment_start(self.segment_type, metadata)?;
                self.phase = Phase::Bare;
                Ok(true)
            }
        }
    }

    fn stream_bare(ctx: &mut ParserContext) -> Result<(), ParserError> {
        if ctx.stream_content_until_any(&WRAPPER_CLOSERS)? {
            ctx.emit_segment_end();
            ctx.transition_to(State::text());
        }
        Ok(())
    }

    fn seek_content(&mut self, ctx: &mut ParserContext) -> Result<bool, ParserError> {
        let rest = ctx.remaining();
        let closer = WRAPPER_CLOSERS
            .iter()
            .filter_map(|closer| rest.find(closer).map(|at| (at, closer.len())))
            .min();
        let arg = find_arg_open(rest);
        // A closer may sit in the quoted name of an `<arg` still being typed.
        if let Some(open) = unfinished_arg_open(rest) {
            let before_closer = closer.is_none_or(|(at, _)| open < at);
            if before_closer && arg.as_ref().is_none_or(|arg| open < arg.start) {
                return Ok(false);
            }
        }
        match arg {
            Some(arg) if closer.is_none_or(|(at, _)| arg.start < at) => {
                if arg.name == self.content_arg {
                    ctx.consume(arg.end);
                    let metadata = self.take_metadata();
                    ctx.emit_segment_start(self.segment_type, metadata)?;
                    self.phase = Phase::Streaming;
                    return Ok(true);
                }
                let Some(close) = ctx.find(ARG_CLOSE, arg.end) else {
                    return Ok(false);
                };
                if self.metadata_args.contains(&arg.name.as_str()) {
                    let value = ctx.remaining()[arg.end..close].trim().to_string();
                    self.metadata.insert(arg.name, value.into());
                }
                ctx.consume(close + ARG_CLOSE.len());
                Ok(true)
            }
            _ => {
                if let Some((at, len)) = closer {
                    ctx.consume(at + len);
                    let metadata = self.take_metadata();
                    ctx.emit_segment_start(self.segment_type, metadata)?;
                    ctx.emit_segment_end();
                    ctx.transition_to(State::text());
                }
                Ok(false)
            }
        }
    }

    fn stream(&mut self, ctx: &mut ParserContext) -> Result<bool, ParserError> {
        if ctx.stream_content_until(ARG_CLOSE)? {
            ctx.emit_segment_end();
            self.phase = Phase::Closing;
            return Ok(true);
        }
        Ok(false)
    }

    /// Whether `rest` may still grow into markup that belongs to the wrapper.
    fn may_close(rest: &str) -> bool {
        let is_partial = |marker: &str| marker.len() > rest.len() && marker.starts_with(rest);
        rest.is_empty()
            || is_partial(ARGUMENTS_CLOSE)
            || is_partial("<arg ")
            || WRAPPER_CLOSERS.iter().any(|&closer| is_partial(closer))
            || (rest.starts_with("<arg ") && !rest.contains('>'))
    }

    fn close(ctx: &mut ParserContext) -> Result<(), ParserError> {
        loop {
            let mut skipped = 0;
            while let Some(ch) = ctx.peek_char().filter(|ch| ch.is_whitespace()) {
                ctx.advance();
                skipped += ch.len_utf8();
            }
            let rest = ctx.remaining();
            if rest.starts_with(ARGUMENTS_CLOSE) {
                ctx.consume(ARGUMENTS_CLOSE.len());
                continue;
            }
            if let Some(len) = WRAPPER_CLOSERS
                .iter()
                .find(|closer| rest.starts_with(**closer))
                .map(|closer| closer.len())
            {
                ctx.consume(len);
                ctx.transition_to(State::text());
                return Ok(());
            }
            if let Some(arg) = find_arg_open(rest).filter(|arg| arg.start == 0) {
                if let Some(close) = ctx.find(ARG_CLOSE, arg.end) {
                    ctx.consume(close + ARG_CLOSE.len());
                    continue;
                }
                ctx.rewind_by(skipped);
                return Ok(());
            }
            // Whitespace is only part of the wrapper when a closer follows.
            let pending = Self::may_close(rest);
            ctx.rewind_by(skipped);
            if !pending {
                ctx.transition_to(State::text());
            }
            return Ok(());
        }
    }

    /// Consumes wrapper markup the stream ended in: blanks, `<arguments>`
    /// tokens and an unfinished argument. Anything else is prose that followed
    /// an unclosed wrapper and is left for the text state.
    fn drop_truncated_markup(ctx: &mut ParserContext) {
        loop {
            let rest = ctx.remaining();
            let body = rest.trim_start();
            let blank = rest.len() - body.len();
            if let Some(token) = ["<arguments>", ARGUMENTS_CLOSE]
                .into_iter()
                .find(|token| body.starts_with(token))
            {
                ctx.consume(blank + token.len());
                continue;
            }
            let fragment = body.len() > 1
                && ["<arguments>", ARGUMENTS_CLOSE]
                    .into_iter()
                    .chain(WRAPPER_CLOSERS)
                    .any(|token| token.starts_with(body));
            if body.is_empty() || body.starts_with("<arg") || fragment {
                let dropped = ctx.consume_remaining();
                if !dropped.trim().is_empty() {
                    tracing::debug!(
                        position = ctx.position(),
                        dropped = dropped.as_str(),
                        "dropping unfinished wrapper markup"
                    );
                }
            }
            return;
        }
    }

    pub(crate) fn finalize(&mut self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        match self.phase {
            Phase::Sniffing | Phase::SeekingContent => {
                Self::drop_truncated_markup(ctx);
                let metadata = self.take_metadata();
                ctx.emit_segment_start(self.segment_type, metadata)?;
                ctx.emit_segment_end();
            }
            Phase::Bare => {
                flush_truncated(ctx, &WRAPPER_CLOSERS)?;
                ctx.emit_segment_end();
            }
            Phase::Streaming => {
                flush_truncated(ctx, &[ARG_CLOSE])?;
                ctx.emit_segment_end();
            }
            Phase::Closing => {
                let rest = ctx.remaining().trim_start();
                if rest.len() > 1 && Self::may_close(rest) {
                    ctx.consume_remaining();
                }
            }
        }
        Ok(())
    }
}

/// The body of `<write_file>`, `<patch_file>`, `<run_bash>` or
/// `<run_terminal_cmd>`, streamed until the matching closing tag.
#[derive(Debug)]
pub(crate) struct CustomXmlTagParsingState {
    segment_type: SegmentType,
    closer: &'static str,
    metadata: Option<Metadata>,
    started: bool,
    /// Set for the run-bash tags until the first non-blank body characters
    /// show whether the body is wrapped argument markup.
    sniffing: bool,
}

impl CustomXmlTagParsingState {
    fn new(
        segment_type: SegmentType,
        closer: &'static str,
        metadata: Option<Metadata>,
        sniffing: bool,
    ) -> Self {
        Self {
            segment_type,
            closer,
            metadata,
            started: false,
            sniffing,
        }
    }

    fn start(&mut self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        if !self.started {
            ctx.emit_segment_start(self.segment_type, self.metadata.take())?;
            self.started = true;
        }
        Ok(())
    }

    pub(crate) fn run(&mut self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        if self.sniffing {
            match sniff_layout(ctx.remaining()) {
                None => return Ok(()),
                Some(Layout::Arguments) => {
                    tracing::trace!(position = ctx.position(), "run_bash body uses argument markup");
                    ctx.transition_to(State::XmlWrapped(XmlWrappedToolParsingState::run_bash()));
                    return Ok(());
                }
                Some(Layout::Bare) => self.sniffing = false,
            }
        }
        self.start(ctx)?;
        if ctx.stream_content_until(self.closer)? {
            ctx.emit_segment_end();
            ctx.transition_to(State::text());
        }
        Ok(())
    }

    pub(crate) fn finalize(&mut self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        self.start(ctx)?;
        flush_truncated(ctx, &[self.closer])?;
        ctx.emit_segment_end();
        Ok(())
    }
}
