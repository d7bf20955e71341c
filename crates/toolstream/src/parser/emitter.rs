use crate::{
    error::ParserError,
    segment::{Metadata, SegmentEvent, SegmentType},
};

#[derive(Debug, Clone)]
struct OpenSegment {
    id: String,
    segment_type: SegmentType,
}

/// Tracks the single open segment and records the events describing it.
///
/// Ids are `seg_<n>`, or `<prefix>:seg_<n>` when the emitter was created with
/// an instance prefix, with `n` increasing from 1 for the emitter's lifetime.
///
/// # Examples
///
/// ```rust
/// use toolstream::{EventEmitter, SegmentType};
///
/// let mut emitter = EventEmitter::new(Some("agent-a".into()));
/// emitter.append_text_segment("Hel").unwrap();
/// emitter.append_text_segment("lo").unwrap();
/// assert_eq!(emitter.emit_segment_end().as_deref(), Some("agent-a:seg_1"));
///
/// // START, two CONTENT deltas of the same segment, END
/// assert_eq!(emitter.get_and_clear_events().len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct EventEmitter {
    id_prefix: Option<String>,
    counter: u64,
    open: Option<OpenSegment>,
    events: Vec<SegmentEvent>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(None)
    }
}

impl EventEmitter {
    /// An emitter whose ids carry `id_prefix`, if given.
    #[must_use]
    pub fn new(id_prefix: Option<String>) -> Self {
        Self {
            id_prefix,
            counter: 0,
            open: None,
            events: Vec::new(),
        }
    }

    fn next_id(&mut self) -> String {
        self.counter += 1;
        match &self.id_prefix {
            Some(prefix) => format!("{prefix}:seg_{}", self.counter),
            None => format!("seg_{}", self.counter),
        }
    }

    /// Opens a new segment and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::SegmentAlreadyOpen`] if a segment is open.
    pub fn emit_segment_start(
        &mut self,
        segment_type: SegmentType,
        metadata: Option<Metadata>,
    ) -> Result<String, ParserError> {
        if let Some(open) = &self.open {
            return Err(ParserError::SegmentAlreadyOpen {
                open: open.id.clone(),
            });
        }
        let id = self.next_id();
        self.events
            .push(SegmentEvent::start(id.clone(), segment_type, metadata));
        self.open = Some(OpenSegment {
            id: id.clone(),
            segment_type,
        });
        Ok(id)
    }

    /// Appends a delta to the open segment. Empty deltas are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::NoOpenSegment`] if no segment is open.
    pub fn emit_segment_content(&mut self, delta: &str) -> Result<(), ParserError> {
        let open = self.open.as_ref().ok_or(ParserError::NoOpenSegment)?;
        if !delta.is_empty() {
            self.events
                .push(SegmentEvent::content(open.id.clone(), delta.to_string()));
        }
        Ok(())
    }

    /// Closes the open segment, if any, and returns its id.
    pub fn emit_segment_end(&mut self) -> Option<String> {
        let open = self.open.take()?;
        self.events.push(SegmentEvent::end(open.id.clone()));
        Some(open.id)
    }

    /// Appends plain text, coalescing it into the open text segment.
    ///
    /// A non-text segment that is still open is closed first.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the error type is shared with the other
    /// emitting operations.
    pub fn append_text_segment(&mut self, text: &str) -> Result<(), ParserError> {
        if text.is_empty() {
            return Ok(());
        }
        match self.open_segment_type() {
            Some(SegmentType::Text) => {}
            Some(_) => {
                self.emit_segment_end();
                self.emit_segment_start(SegmentType::Text, None)?;
            }
            None => {
                self.emit_segment_start(SegmentType::Text, None)?;
            }
        }
        self.emit_segment_content(text)
    }

    /// Id of the open segment.
    #[must_use]
    pub fn open_segment_id(&self) -> Option<&str> {
        self.open.as_ref().map(|open| open.id.as_str())
    }

    /// Type of the open segment.
    #[must_use]
    pub fn open_segment_type(&self) -> Option<SegmentType> {
        self.open.as_ref().map(|open| open.segment_type)
    }

    /// Drains the events recorded since the last call.
    pub fn get_and_clear_events(&mut self) -> Vec<SegmentEvent> {
        core::mem::take(&mut self.events)
    }
}
