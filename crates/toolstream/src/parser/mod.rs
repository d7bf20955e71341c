mod context;
mod emitter;
mod scan;
mod states;


pub use context::ParserContext;
pub use emitter::EventEmitter;
use states::State;

use crate::{error::ParserError, options::ParserConfig, segment::SegmentEvent};

/// The incremental segmentation parser.
///
/// Chunks are fed in arrival order and may split delimiters, multi-byte
/// characters and JSON values anywhere. Each call to [`StreamingParser::feed`]
/// returns the events that became certain with that chunk; text that could
/// still be the beginning of a tool call is held back until the next chunk or
/// [`StreamingParser::finalize`] decides it.
///
/// The event sequence is the same however the input is chunked, up to how
/// content deltas are split.
#[derive(Debug)]
pub struct StreamingParser {
    ctx: ParserContext,
    state: State,
    finalized: bool,
}

impl Default for StreamingParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

impl StreamingParser {
    /// A parser for `config`, starting in plain text.
    #[must_use]
    pub fn new(config: ParserConfig) -> Self {
        Self {
            ctx: ParserContext::new(config),
            state: State::text(),
            finalized: false,
        }
    }

    /// Appends a chunk and returns the events it completed.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::FeedAfterFinalize`] once the parser has been
    /// finalized. The other variants indicate a bug in a parsing state.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<SegmentEvent>, ParserError> {
        if self.finalized {
            return Err(ParserError::FeedAfterFinalize);
        }
        self.ctx.append(chunk);
        let driven = self.drive();
        #[cfg(any(test, feature = "fuzzing"))]
        if let Err(err) = &driven {
            panic!("parsing state failed: {err}");
        }
        driven?;
        self.ctx.compact();
        Ok(self.ctx.get_and_clear_events())
    }

    /// Runs the active state, swapping in scheduled transitions, until a
    /// state needs more input.
    fn drive(&mut self) -> Result<(), ParserError> {
        loop {
            self.state.run(&mut self.ctx)?;
            let Some(next) = self.ctx.take_transition() else {
                return Ok(());
            };
            tracing::trace!(
                from = self.state.name(),
                to = next.name(),
                position = self.ctx.position(),
                "state transition"
            );
            self.state = next;
        }
    }

    /// Ends the stream: flushes held-back input, closes the open segment and
    /// returns the last events.
    ///
    /// Calling it again returns no events.
    ///
    /// # Errors
    ///
    /// Only on a bug in a parsing state, as with [`StreamingParser::feed`].
    pub fn finalize(&mut self) -> Result<Vec<SegmentEvent>, ParserError> {
        if self.finalized {
            return Ok(Vec::new());
        }
        self.finalized = true;
        let flushed = self.flush_states();
        #[cfg(any(test, feature = "fuzzing"))]
        if let Err(err) = &flushed {
            panic!("parsing state failed at end of stream: {err}");
        }
        flushed?;
        self.ctx.compact();
        Ok(self.ctx.get_and_clear_events())
    }

    /// Lets the active state close its segment, then hands what it left
    /// behind to the text state.
    fn flush_states(&mut self) -> Result<(), ParserError> {
        self.state.finalize(&mut self.ctx)?;
        self.ctx.take_transition();
        self.state = State::text();
        self.state.finalize(&mut self.ctx)
    }

    /// Discards all buffered input and state. Segment ids restart at 1.
    pub fn reset(&mut self) {
        *self = Self::new(self.ctx.config().clone());
    }

    /// Whether [`StreamingParser::finalize`] has been called since the last
    /// reset.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// The parser's configuration.
    #[must_use]
    pub fn config(&self) -> &ParserConfig {
        self.ctx.config()
    }

    /// The buffer and emitter behind the parser.
    #[must_use]
    pub fn context(&self) -> &ParserContext {
        &self.ctx
    }
}
