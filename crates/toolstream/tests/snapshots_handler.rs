#![expect(missing_docs)]

mod common;

use std::{
    fmt::Write,
    sync::{Arc, Mutex},
};

use toolstream::{
    HandlerCallbacks, ParserConfig, ParserVariant, SegmentEvent, SegmentEventType,
    StreamingResponseHandler, ToolInvocation, chunk_utils::chunks_of,
};

use crate::common::{STREAM, joined};

fn render_event(out: &mut String, event: &SegmentEvent) {
    let id = &event.segment_id;
    match event.event_type {
        SegmentEventType::Start => {
            let ty = event.segment_type.map(|ty| ty.as_str()).unwrap_or("?");
            write!(out, "start {id} {ty}").unwrap();
            if let Some(metadata) = event.metadata() {
                write!(out, " {}", serde_json::to_string(metadata).unwrap()).unwrap();
            }
            out.push('\n');
        }
        SegmentEventType::Content => {
            writeln!(out, "content {id} {:?}", event.delta().unwrap_or_default()).unwrap();
        }
        SegmentEventType::End => writeln!(out, "end {id}").unwrap(),
    }
}

/// Every event and invocation in the order the callbacks saw them.
fn render_turn(variant: ParserVariant, chunks: &[&str]) -> String {
    let log = Arc::new(Mutex::new(String::new()));
    let (events, calls) = (Arc::clone(&log), Arc::clone(&log));
    let mut handler = StreamingResponseHandler::from_variant(variant).with_callbacks(
        HandlerCallbacks {
            on_segment_event: Some(Box::new(move |event: &SegmentEvent| {
                render_event(&mut events.lock().unwrap(), event);
            })),
            on_tool_invocation: Some(Box::new(move |call: &ToolInvocation| {
                let args = serde_json::to_string(&call.arguments).unwrap();
                writeln!(calls.lock().unwrap(), "call {} {} {args}", call.id, call.name).unwrap();
            })),
        },
    );
    for chunk in chunks {
        handler.feed(chunk).unwrap();
    }
    handler.finalize().unwrap();
    log.lock().unwrap().clone()
}

/// One line per segment with its content joined, so chunking does not show.
fn render_segments(variant: ParserVariant, chunks: &[&str]) -> String {
    let mut handler = StreamingResponseHandler::new(ParserConfig::with_variant(variant));
    for chunk in chunks {
        handler.feed(chunk).unwrap();
    }
    handler.finalize().unwrap();

    let mut out = String::new();
    let mut content = String::new();
    for event in handler.all_events() {
        match event.event_type {
            SegmentEventType::Start => {
                let ty = event.segment_type.map(|ty| ty.as_str()).unwrap_or("?");
                write!(out, "{} {ty} ", event.segment_id).unwrap();
                if let Some(metadata) = event.metadata() {
                    write!(out, "{} ", serde_json::to_string(metadata).unwrap()).unwrap();
                }
            }
            SegmentEventType::Content => content.push_str(event.delta().unwrap_or_default()),
            SegmentEventType::End => {
                writeln!(out, "{content:?}").unwrap();
                content.clear();
            }
        }
    }
    out
}

#[test]
fn snapshot_mixed_turn() {
    insta::assert_snapshot!(render_turn(ParserVariant::Mixed, STREAM), @r##"
    start seg_1 text
    content seg_1 "I'll check the "
    content seg_1 "repo first. "
    end seg_1
    start seg_2 tool_call
    content seg_2 "{\"tool\":\"ru"
    content seg_2 "n_bash\",\"arguments\":{\"command\":\"ls\"}}"
    end seg_2
    call seg_2 run_bash {"command":"ls"}
    start seg_3 text
    content seg_3 " Then I'll write "
    end seg_3
    start seg_4 write_file {"path":"notes.md"}
    content seg_4 "# Notes\n"
    content seg_4 "- done"
    end seg_4
    call seg_4 write_file {"path":"notes.md","content":"# Notes\n- done"}
    start seg_5 text
    content seg_5 "\n"
    end seg_5
    start seg_6 reasoning
    content seg_6 "almost"
    content seg_6 " there"
    end seg_6
    start seg_7 run_bash
    content seg_7 "cargo "
    content seg_7 "test"
    end seg_7
    call seg_7 run_bash {"command":"cargo test"}
    start seg_8 text
    content seg_8 " Done."
    end seg_8
    "##);
}

#[test]
fn snapshot_mixed_segments_any_chunking() {
    let whole = joined();
    let rendered = render_segments(ParserVariant::Mixed, STREAM);
    assert_eq!(render_segments(ParserVariant::Mixed, &chunks_of(&whole, 1)), rendered);
    assert_eq!(render_segments(ParserVariant::Mixed, &[whole.as_str()]), rendered);
    insta::assert_snapshot!(rendered, @r##"
    seg_1 text "I'll check the repo first. "
    seg_2 tool_call "{\"tool\":\"run_bash\",\"arguments\":{\"command\":\"ls\"}}"
    seg_3 text " Then I'll write "
    seg_4 write_file {"path":"notes.md"} "# Notes\n- done"
    seg_5 text "\n"
    seg_6 reasoning "almost there"
    seg_7 run_bash "cargo test"
    seg_8 text " Done."
    "##);
}

#[test]
fn snapshot_xml_only_turn() {
    insta::assert_snapshot!(render_segments(ParserVariant::Xml, STREAM), @r##"
    seg_1 text "I'll check the repo first. {\"tool\":\"run_bash\",\"arguments\":{\"command\":\"ls\"}} Then I'll write "
    seg_2 write_file {"path":"notes.md"} "# Notes\n- done"
    seg_3 text "\n[[SEG_START {\"type\":\"reasoning\"}]]almost there[[SEG_END]]"
    seg_4 run_bash "cargo test"
    seg_5 text " Done."
    "##);
}

#[test]
fn snapshot_pass_through_turn() {
    insta::assert_snapshot!(render_turn(ParserVariant::PassThrough, &STREAM[..2]), @r#"
    start seg_1 text
    content seg_1 "I'll check the "
    content seg_1 "repo first. {\"tool\":\"ru"
    end seg_1
    "#);
}

#[cfg(feature = "serde")]
#[test]
fn snapshot_serialized_events() {
    let mut handler = StreamingResponseHandler::default();
    handler.feed("<run_bash>ls</run_bash>").unwrap();
    handler.finalize().unwrap();
    let lines: Vec<String> = handler
        .all_events()
        .iter()
        .map(|event| serde_json::to_string(event).unwrap())
        .collect();
    insta::assert_snapshot!(lines.join("\n"), @r#"
    {"type":"start","segment_id":"seg_1","segment_type":"run_bash","payload":{}}
    {"type":"content","segment_id":"seg_1","payload":{"delta":"ls"}}
    {"type":"end","segment_id":"seg_1","payload":{}}
    "#);
}
