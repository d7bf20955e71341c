use crate::{
    error::ParserError,
    invocation::{ToolCallDecoder, ToolInvocation, ToolInvocationAdapter},
    options::{ParserConfig, ParserVariant},
    parser::StreamingParser,
    segment::SegmentEvent,
};

type EventCallback = Box<dyn FnMut(&SegmentEvent) + Send>;
type InvocationCallback = Box<dyn FnMut(&ToolInvocation) + Send>;

/// Optional observers notified as a [`StreamingResponseHandler`] makes
/// progress.
#[derive(Default)]
pub struct HandlerCallbacks {
    /// Called once per segment event, in order.
    pub on_segment_event: Option<EventCallback>,
    /// Called once per decoded invocation, right after the end event that
    /// completed it.
    pub on_tool_invocation: Option<InvocationCallback>,
}

impl core::fmt::Debug for HandlerCallbacks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandlerCallbacks")
            .field("on_segment_event", &self.on_segment_event.is_some())
            .field("on_tool_invocation", &self.on_tool_invocation.is_some())
            .finish()
    }
}

/// One model turn: a [`StreamingParser`] feeding a [`ToolInvocationAdapter`].
///
/// Events and invocations are returned from each call, passed to the
/// callbacks and also accumulated for inspection once the turn is over.
///
/// # Examples
///
/// ```rust
/// use std::sync::{Arc, Mutex};
///
/// use toolstream::{HandlerCallbacks, ParserConfig, StreamingResponseHandler, ToolInvocation};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// let mut handler = StreamingResponseHandler::new(ParserConfig::default()).with_callbacks(
///     HandlerCallbacks {
///         on_tool_invocation: Some(Box::new(move |call: &ToolInvocation| {
///             sink.lock().unwrap().push(call.name.clone());
///         })),
///         ..Default::default()
///     },
/// );
/// handler.feed("Listing: <run_bash>ls</run_").unwrap();
/// handler.feed("bash> done").unwrap();
/// handler.finalize().unwrap();
///
/// assert_eq!(*seen.lock().unwrap(), ["run_bash"]);
/// ```
#[derive(Debug)]
pub struct StreamingResponseHandler {
    config: ParserConfig,
    parser: StreamingParser,
    adapter: ToolInvocationAdapter,
    callbacks: HandlerCallbacks,
    events: Vec<SegmentEvent>,
    invocations: Vec<ToolInvocation>,
}

impl Default for StreamingResponseHandler {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

impl StreamingResponseHandler {
    /// A handler for `config` using the default JSON decoder.
    #[must_use]
    pub fn new(config: ParserConfig) -> Self {
        Self::with_adapter(config, ToolInvocationAdapter::new())
    }

    /// A handler for `variant` with otherwise default configuration.
    #[must_use]
    pub fn from_variant(variant: ParserVariant) -> Self {
        Self::new(ParserConfig::with_variant(variant))
    }

    /// A handler whose JSON tool calls are decoded by `decoder`.
    #[must_use]
    pub fn with_decoder(config: ParserConfig, decoder: impl ToolCallDecoder + 'static) -> Self {
        Self::with_adapter(config, ToolInvocationAdapter::with_decoder(decoder))
    }

    fn with_adapter(config: ParserConfig, adapter: ToolInvocationAdapter) -> Self {
        Self {
            parser: StreamingParser::new(config.clone()),
            adapter: adapter.with_turn_id(config.turn_id.clone()),
            config,
            callbacks: HandlerCallbacks::default(),
            events: Vec::new(),
            invocations: Vec::new(),
        }
    }

    /// Replaces the callbacks.
    #[must_use]
    pub fn with_callbacks(mut self, callbacks: HandlerCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Feeds a chunk and returns the events it completed.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::FeedAfterFinalize`] once the turn has been
    /// finalized.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<SegmentEvent>, ParserError> {
        let events = self.parser.feed(chunk)?;
        self.dispatch(&events);
        Ok(events)
    }

    /// Ends the turn and returns the final events. Idempotent.
    ///
    /// # Errors
    ///
    /// Only on a bug in a parsing state.
    pub fn finalize(&mut self) -> Result<Vec<SegmentEvent>, ParserError> {
        let events = self.parser.finalize()?;
        self.dispatch(&events);
        Ok(events)
    }

    /// Starts a new turn with the same configuration and callbacks.
    pub fn reset(&mut self) {
        self.parser.reset();
        self.adapter.reset();
        self.events.clear();
        self.invocations.clear();
    }

    fn dispatch(&mut self, events: &[SegmentEvent]) {
        for event in events {
            if let Some(callback) = self.callbacks.on_segment_event.as_mut() {
                callback(event);
            }
            for invocation in self.adapter.process_event(event) {
                if let Some(callback) = self.callbacks.on_tool_invocation.as_mut() {
                    callback(&invocation);
                }
                self.invocations.push(invocation);
            }
        }
        self.events.extend_from_slice(events);
    }

    /// Every event of the turn so far.
    #[must_use]
    pub fn all_events(&self) -> &[SegmentEvent] {
        &self.events
    }

    /// Every invocation decoded so far.
    #[must_use]
    pub fn all_invocations(&self) -> &[ToolInvocation] {
        &self.invocations
    }

    /// Drains the invocations decoded so far.
    pub fn take_invocations(&mut self) -> Vec<ToolInvocation> {
        core::mem::take(&mut self.invocations)
    }

    /// Whether the turn has been finalized.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.parser.is_finalized()
    }

    /// The configuration the handler was built with.
    #[must_use]
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }
}
