//! Streams a canned agent turn through a [`StreamingResponseHandler`] and
//! prints what an agent loop would see: prose as it arrives and each tool call
//! as soon as its segment closes.
//!
//! The encoding is chosen with `TOOLSTREAM_PARSER` (`json`, `xml`,
//! `sentinel`, `mixed` or `passthrough`). Run with
//!
//! ```bash
//! TOOLSTREAM_PARSER=mixed cargo run -p toolstream --example agent_stream
//! ```
#![allow(missing_docs)]

use std::io::Write;

use toolstream::{
    HandlerCallbacks, ParserConfig, ParserVariant, SegmentEvent, SegmentEventType, SegmentType,
    StreamingResponseHandler, ToolInvocation, chunk_utils::produce_chunks,
};

const TURN: &str = concat!(
    "Let me look around first. ",
    r#"{"tool":"run_bash","arguments":{"command":"ls src"}}"#,
    "\nNow the fix:\n",
    "<write_file path=\"src/main.rs\">fn main() {\n    println!(\"hi\");\n}\n</write_file>\n",
    r#"[[SEG_START {"type":"reasoning"}]]the build should pass now[[SEG_END]]"#,
    "<tool name=\"run_bash\"><arguments><arg name=\"command\">cargo run</arg></arguments></tool>",
    "\nDone.",
);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ParserConfig {
        variant: ParserVariant::from_env(),
        turn_id: Some("turn-1".into()),
        ..ParserConfig::default()
    };
    println!("parser variant: {:?}", config.variant);

    let mut printing = None;
    let callbacks = HandlerCallbacks {
        on_segment_event: Some(Box::new(move |event: &SegmentEvent| {
            match event.event_type {
                SegmentEventType::Start => printing = event.segment_type,
                SegmentEventType::Content if printing == Some(SegmentType::Text) => {
                    print!("{}", event.delta().unwrap_or_default());
                    let _ = std::io::stdout().flush();
                }
                SegmentEventType::Content => {}
                SegmentEventType::End => printing = None,
            }
        })),
        on_tool_invocation: Some(Box::new(|call: &ToolInvocation| {
            println!(
                "\n>> [{}] {}({})",
                call.id,
                call.name,
                serde_json::Value::Object(call.arguments.clone())
            );
        })),
    };
    let mut handler = StreamingResponseHandler::new(config).with_callbacks(callbacks);

    // Irregular chunks, the way a completion API delivers tokens.
    for (i, chunk) in produce_chunks(TURN, 37).into_iter().enumerate() {
        if i % 5 == 0 {
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        handler.feed(chunk)?;
    }
    handler.finalize()?;

    println!(
        "\n{} events, {} tool calls",
        handler.all_events().len(),
        handler.all_invocations().len()
    );
    Ok(())
}
