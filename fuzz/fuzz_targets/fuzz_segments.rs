#![no_main]
use std::cell::RefCell;

use arbitrary::{Arbitrary, Unstructured};
use libfuzzer_sys::{fuzz_mutator, fuzz_target, fuzzer_mutate};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use toolstream::{
    ParserConfig, ParserVariant, SegmentEventType, StreamingResponseHandler,
    chunk_utils::split_by_lengths,
};

thread_local! {
    static RNG: RefCell<SmallRng> = RefCell::new(SmallRng::from_os_rng());
}

fn with_rng<F, R>(f: F) -> R
where
    F: FnOnce(&mut SmallRng) -> R,
{
    RNG.with(|cell| f(&mut cell.borrow_mut()))
}

/// Delimiters and near-misses of every encoding. Random bytes almost never
/// hit these, so the mutator splices them in.
static MARKUP: &[&str] = &[
    "{",
    "[",
    "<",
    "\"",
    "}",
    "]",
    "<tool name=\"search\">",
    "<tool name=\"run_bash\">",
    "<tool name=\"write_file\">",
    "</tool>",
    "<arguments>",
    "</arguments>",
    "<arg name=\"command\">",
    "<arg name=\"path\">",
    "<arg name=\"content\">",
    "</arg>",
    "<write_file path=\"a\">",
    "</write_file>",
    "<patch_file path='b'/>",
    "<run_bash>",
    "</run_bash>",
    "<run_terminal_cmd>",
    "</run_terminal_cmd>",
    "[[SEG_START",
    "]]",
    "[[SEG_END]]",
];

/// A JSON fragment that passes the tool-call signature check.
fn tool_call(rng: &mut SmallRng) -> String {
    let name: String = (0..rng.random_range(0..6))
        .map(|_| rng.random_range('a'..='z'))
        .collect();
    match rng.random_range(0..3) {
        0 => json!({"tool": name, "arguments": {"q": name}}).to_string(),
        1 => json!([{"name": name}]).to_string(),
        _ => format!("[[SEG_START {} ]]", json!({"type": "tool_call", "tool_name": name})),
    }
}

fn mutator(data: &mut [u8], size: usize, max_size: usize, seed: u32) -> usize {
    let size = fuzzer_mutate(data, size, max_size);
    if !seed.is_multiple_of(3) {
        return size;
    }
    let insert = with_rng(|rng| {
        if rng.random_bool(0.25) {
            tool_call(rng).into_bytes()
        } else {
            MARKUP[rng.random_range(0..MARKUP.len())].as_bytes().to_vec()
        }
    });
    if size + insert.len() > max_size {
        return size;
    }
    let at = with_rng(|rng| rng.random_range(0..=size));
    data.copy_within(at..size, at + insert.len());
    data[at..at + insert.len()].copy_from_slice(&insert);
    size + insert.len()
}

fuzz_mutator!(|data: &mut [u8], size: usize, max_size: usize, seed: u32| {
    mutator(data, size, max_size, seed)
});

#[derive(Debug, Arbitrary)]
struct Input {
    variant: u8,
    splits: Vec<usize>,
    text: String,
}

fn variant(raw: u8) -> ParserVariant {
    match raw % 5 {
        0 => ParserVariant::Json,
        1 => ParserVariant::Xml,
        2 => ParserVariant::Sentinel,
        3 => ParserVariant::PassThrough,
        _ => ParserVariant::Mixed,
    }
}

fn segments(data: &[u8]) {
    let Ok(input) = Input::arbitrary(&mut Unstructured::new(data)) else {
        return;
    };
    let mut handler = StreamingResponseHandler::new(ParserConfig::with_variant(variant(input.variant)));
    for chunk in split_by_lengths(&input.text, &input.splits) {
        handler.feed(chunk).unwrap();
    }
    handler.finalize().unwrap();

    // Every start is closed, and nothing is open when the next one starts.
    let mut open = None;
    for event in handler.all_events() {
        match event.event_type {
            SegmentEventType::Start => assert!(open.replace(&event.segment_id).is_none()),
            SegmentEventType::Content => assert_eq!(open, Some(&event.segment_id)),
            SegmentEventType::End => assert_eq!(open.take(), Some(&event.segment_id)),
        }
    }
    assert!(open.is_none());
}

fuzz_target!(|data: &[u8]| segments(data));
