use crate::{
    Metadata, ParserConfig, SegmentEvent, SegmentEventType, SegmentType, StreamingParser,
};

/// A segment rebuilt from its events, with the content deltas joined.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Segment {
    pub(crate) id: String,
    pub(crate) segment_type: SegmentType,
    pub(crate) metadata: Option<Metadata>,
    pub(crate) content: String,
}

/// Feeds `chunks` in order, finalizes and returns every event.
pub(crate) fn run_chunks(config: &ParserConfig, chunks: &[&str]) -> Vec<SegmentEvent> {
    let mut parser = StreamingParser::new(config.clone());
    let mut events = Vec::new();
    for chunk in chunks {
        events.extend(parser.feed(chunk).unwrap());
    }
    events.extend(parser.finalize().unwrap());
    events
}

/// Rebuilds segments, checking that events are well nested: one open
/// segment at a time, content and end only for the open one, nothing left
/// open at the end.
pub(crate) fn collect_segments(events: &[SegmentEvent]) -> Result<Vec<Segment>, String> {
    let mut segments = Vec::new();
    let mut open: Option<Segment> = None;
    for event in events {
        match event.event_type {
            SegmentEventType::Start => {
                if let Some(current) = &open {
                    return Err(format!("{} started inside {}", event.segment_id, current.id));
                }
                let segment_type = event
                    .segment_type
                    .ok_or_else(|| format!("{} started without a type", event.segment_id))?;
                open = Some(Segment {
                    id: event.segment_id.clone(),
                    segment_type,
                    metadata: event.metadata().cloned(),
                    content: String::new(),
                });
            }
            SegmentEventType::Content => match open.as_mut() {
                Some(current) if current.id == event.segment_id => {
                    let delta = event.delta().unwrap_or_default();
                    if delta.is_empty() {
                        return Err(format!("empty delta for {}", current.id));
                    }
                    current.content.push_str(delta);
                }
                _ => return Err(format!("content for closed {}", event.segment_id)),
            },
            SegmentEventType::End => match open.take() {
                Some(current) if current.id == event.segment_id => segments.push(current),
                _ => return Err(format!("end for closed {}", event.segment_id)),
            },
        }
    }
    match open {
        Some(current) => Err(format!("{} never ended", current.id)),
        None => Ok(segments),
    }
}

/// `(type, content)` of every segment produced for `chunks`.
pub(crate) fn summarize(config: &ParserConfig, chunks: &[&str]) -> Vec<(SegmentType, String)> {
    collect_segments(&run_chunks(config, chunks))
        .unwrap()
        .into_iter()
        .map(|segment| (segment.segment_type, segment.content))
        .collect()
}
