use super::{
    emitter::EventEmitter,
    scan::{Opener, openers_for, partial_suffix_len},
    states::State,
};
use crate::{
    error::ParserError,
    options::ParserConfig,
    segment::{Metadata, SegmentEvent, SegmentType},
};

/// Input buffer, cursor and event sink shared by every parsing state.
///
/// The buffer is append-only between compactions. The cursor is a byte offset
/// into it and always sits on a character boundary. Everything before the
/// cursor has been resolved; [`ParserContext::compact`] drops that prefix at the
/// end of each feed so only the unresolved suffix is retained.
#[derive(Debug)]
pub struct ParserContext {
    buffer: String,
    pos: usize,
    /// Bytes dropped by earlier compactions.
    base: usize,
    emitter: EventEmitter,
    config: ParserConfig,
    openers: Vec<Opener>,
    pending: Option<State>,
}

impl ParserContext {
    /// An empty context for `config`.
    #[must_use]
    pub fn new(config: ParserConfig) -> Self {
        Self {
            buffer: String::new(),
            pos: 0,
            base: 0,
            emitter: EventEmitter::new(config.segment_id_prefix.clone()),
            openers: openers_for(&config),
            config,
            pending: None,
        }
    }

    /// Appends a chunk to the buffer without parsing it.
    pub fn append(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// The unconsumed part of the buffer.
    #[must_use]
    pub fn remaining(&self) -> &str {
        &self.buffer[self.pos..]
    }

    /// Whether unconsumed input is buffered.
    #[must_use]
    pub fn has_more_chars(&self) -> bool {
        self.pos < self.buffer.len()
    }

    /// The character at the cursor.
    #[must_use]
    pub fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    /// Consumes and returns the character at the cursor.
    pub fn advance(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn clamp_end(&self, len: usize) -> usize {
        let mut end = self.pos.saturating_add(len).min(self.buffer.len());
        while !self.buffer.is_char_boundary(end) {
            end += 1;
        }
        end
    }

    /// Moves the cursor forward by `len` bytes, never past the end of the
    /// buffer and never into the middle of a character.
    pub fn consume(&mut self, len: usize) {
        self.pos = self.clamp_end(len);
    }

    /// Consumes and returns everything left in the buffer.
    pub fn consume_remaining(&mut self) -> String {
        let rest = self.remaining().to_string();
        self.pos = self.buffer.len();
        rest
    }

    /// Byte offset of `pattern` relative to the cursor, searching from
    /// `from` bytes past the cursor.
    #[must_use]
    pub fn find(&self, pattern: &str, from: usize) -> Option<usize> {
        let rest = self.remaining();
        let from = from.min(rest.len());
        if !rest.is_char_boundary(from) {
            return None;
        }
        rest[from..].find(pattern).map(|idx| idx + from)
    }

    /// Pushes back the last `len` consumed bytes. Clamped to the retained
    /// buffer: text dropped by [`ParserContext::compact`] cannot be replayed.
    pub fn rewind_by(&mut self, len: usize) {
        let mut pos = self.pos.saturating_sub(len);
        while !self.buffer.is_char_boundary(pos) {
            pos -= 1;
        }
        self.pos = pos;
    }

    /// Absolute byte offset of the cursor in the whole stream.
    #[must_use]
    pub fn position(&self) -> usize {
        self.base + self.pos
    }

    pub(crate) fn compact(&mut self) {
        if self.pos > 0 {
            self.buffer.drain(..self.pos);
            self.base += self.pos;
            self.pos = 0;
        }
    }

    /// The configuration the context was built with.
    #[must_use]
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub(crate) fn openers(&self) -> &[Opener] {
        &self.openers
    }

    /// Schedules `state` to replace the active state once its `run` returns.
    pub(crate) fn transition_to(&mut self, state: State) {
        self.pending = Some(state);
    }

    pub(crate) fn take_transition(&mut self) -> Option<State> {
        self.pending.take()
    }

    /// The emitter recording this context's events.
    #[must_use]
    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    /// Opens a segment, closing an open text run first.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::SegmentAlreadyOpen`] if a non-text segment is
    /// still open.
    pub fn emit_segment_start(
        &mut self,
        segment_type: SegmentType,
        metadata: Option<Metadata>,
    ) -> Result<String, ParserError> {
        if self.emitter.open_segment_type() == Some(SegmentType::Text) {
            self.emitter.emit_segment_end();
        }
        self.emitter.emit_segment_start(segment_type, metadata)
    }

    /// Appends a delta to the open segment.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::NoOpenSegment`] if no segment is open.
    pub fn emit_segment_content(&mut self, delta: &str) -> Result<(), ParserError> {
        self.emitter.emit_segment_content(delta)
    }

    /// Closes the open segment, if any, and returns its id.
    pub fn emit_segment_end(&mut self) -> Option<String> {
        self.emitter.emit_segment_end()
    }

    /// # Errors
    ///
    /// See [`EventEmitter::append_text_segment`].
    pub fn append_text_segment(&mut self, text: &str) -> Result<(), ParserError> {
        self.emitter.append_text_segment(text)
    }

    /// Drains the events recorded since the last call.
    pub fn get_and_clear_events(&mut self) -> Vec<SegmentEvent> {
        self.emitter.get_and_clear_events()
    }

    /// Consumes `len` bytes and appends them to the open text run.
    pub(crate) fn flush_text(&mut self, len: usize) -> Result<(), ParserError> {
        let end = self.clamp_end(len);
        let text = &self.buffer[self.pos..end];
        self.emitter.append_text_segment(text)?;
        self.pos = end;
        Ok(())
    }

    /// Consumes `len` bytes as content of the open segment.
    pub(crate) fn flush_content(&mut self, len: usize) -> Result<(), ParserError> {
        let end = self.clamp_end(len);
        let delta = &self.buffer[self.pos..end];
        self.emitter.emit_segment_content(delta)?;
        self.pos = end;
        Ok(())
    }

    /// Streams content of the open segment up to `closer`.
    ///
    /// When the closer is present, everything before it is emitted, the closer
    /// itself is consumed and `true` is returned. Otherwise everything except
    /// the shortest tail that could still grow into `closer` is emitted.
    pub(crate) fn stream_content_until(&mut self, closer: &str) -> Result<bool, ParserError> {
        self.stream_content_until_any(&[closer])
    }

    /// [`ParserContext::stream_content_until`] for a segment that any of
    /// `closers` ends. The earliest closer wins.
    pub(crate) fn stream_content_until_any(
        &mut self,
        closers: &[&str],
    ) -> Result<bool, ParserError> {
        let found = closers
            .iter()
            .filter_map(|closer| self.find(closer, 0).map(|idx| (idx, closer.len())))
            .min();
        if let Some((idx, len)) = found {
            self.flush_content(idx)?;
            self.consume(len);
            return Ok(true);
        }
        let rest = self.remaining();
        let hold = closers
            .iter()
            .map(|closer| partial_suffix_len(rest, closer))
            .max()
            .unwrap_or(0);
        let emit = rest.len() - hold;
        self.flush_content(emit)?;
        Ok(false)
    }
}
