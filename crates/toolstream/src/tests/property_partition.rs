use quickcheck::{Arbitrary, Gen, QuickCheck};

use super::utils::{collect_segments, run_chunks};
use crate::{ParserConfig, ParserVariant, chunk_utils::split_by_lengths};

/// Pieces of model output that exercise every encoding, including the
/// near-misses that must degrade to text.
const FRAGMENTS: &[&str] = &[
    "Hello ",
    "the {braces} here ",
    "[1, 2] ",
    "é😊 ",
    "\n",
    "{",
    "[",
    "<",
    "]]",
    r#"{"tool":"search","arguments":{"q":"a}b"}}"#,
    r#"[{"name":"ls"}]"#,
    r#"{"too"#,
    "<tool name=\"search\">",
    "<tool name=\"run_bash\">",
    "<tool name=\"write_file\">",
    "<tool name=\"patch_file\">",
    "<arg name=\"a</tool>\">",
    "<arg name=\"x",
    "<tools>",
    "</tool>",
    "<arguments>",
    "</arguments>",
    "<arg name=\"command\">",
    "<arg name=\"path\">",
    "<arg name=\"content\">",
    "</arg>",
    "<write_file path=\"a.py\">",
    "<write_file>",
    "</write_file>",
    "<patch_file path='b.rs'/>",
    "<run_bash>",
    "</run_bash>",
    "<run_terminal_cmd>",
    "</run_terminal_cmd>",
    r#"[[SEG_START {"type":"write_file","path":"c.py"}]]"#,
    r#"[[SEG_START {"type":"bogus"}]]"#,
    "[[SEG_START",
    "[[SEG_END]]",
    "ls -la ",
];

#[derive(Debug, Clone)]
struct Transcript(String);

impl Arbitrary for Transcript {
    fn arbitrary(g: &mut Gen) -> Self {
        let len = usize::arbitrary(g) % 24;
        let mut out = String::new();
        for _ in 0..len {
            out.push_str(g.choose(FRAGMENTS).copied().unwrap_or_default());
        }
        Transcript(out)
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        Box::new(self.0.shrink().map(Transcript))
    }
}

impl Arbitrary for ParserVariant {
    fn arbitrary(g: &mut Gen) -> Self {
        *g.choose(&[
            ParserVariant::Json,
            ParserVariant::Xml,
            ParserVariant::Sentinel,
            ParserVariant::Mixed,
            ParserVariant::PassThrough,
        ])
        .unwrap_or(&ParserVariant::Mixed)
    }
}

fn test_count() -> u64 {
    #[cfg(not(miri))]
    let tests = if is_ci::cached() { 10_000 } else { 1_000 };
    #[cfg(miri)]
    let tests = 10;
    tests
}

/// Property: the segments (ids, types, metadata and joined content) do not
/// depend on how the input is chunked.
#[test]
fn segments_are_chunking_invariant() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(transcript: Transcript, splits: Vec<usize>, variant: ParserVariant) -> bool {
        let config = ParserConfig::with_variant(variant);
        let whole = collect_segments(&run_chunks(&config, &[transcript.0.as_str()]));
        let split = collect_segments(&run_chunks(
            &config,
            &split_by_lengths(&transcript.0, &splits),
        ));
        match (whole, split) {
            (Ok(whole), Ok(split)) => whole == split,
            _ => false,
        }
    }

    QuickCheck::new()
        .tests(test_count())
        .quickcheck(prop as fn(Transcript, Vec<usize>, ParserVariant) -> bool);
}

/// Property: arbitrary input never panics and always yields well-nested
/// segments once finalized.
#[test]
fn arbitrary_input_is_well_nested() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(input: String, splits: Vec<usize>, variant: ParserVariant) -> bool {
        let config = ParserConfig::with_variant(variant);
        let events = run_chunks(&config, &split_by_lengths(&input, &splits));
        collect_segments(&events).is_ok()
    }

    QuickCheck::new()
        .tests(test_count())
        .quickcheck(prop as fn(String, Vec<usize>, ParserVariant) -> bool);
}

/// Property: with parsing disabled the text comes back byte for byte.
#[test]
fn pass_through_preserves_input() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(transcript: Transcript, splits: Vec<usize>) -> bool {
        let config = ParserConfig::with_variant(ParserVariant::PassThrough);
        let events = run_chunks(&config, &split_by_lengths(&transcript.0, &splits));
        let joined: String = events.iter().filter_map(|event| event.delta()).collect();
        joined == transcript.0
    }

    QuickCheck::new()
        .tests(test_count())
        .quickcheck(prop as fn(Transcript, Vec<usize>) -> bool);
}

/// Property: text the parser gives up on is never lost. Segment content is
/// always a subsequence of the input, so every plain-text transcript comes
/// back whole.
#[test]
fn text_without_openers_is_preserved() {
    #[allow(clippy::needless_pass_by_value)]
    fn prop(input: String, splits: Vec<usize>, variant: ParserVariant) -> bool {
        let input: String = input
            .chars()
            .filter(|ch| !matches!(ch, '{' | '[' | '<'))
            .collect();
        let config = ParserConfig::with_variant(variant);
        let events = run_chunks(&config, &split_by_lengths(&input, &splits));
        let joined: String = events.iter().filter_map(|event| event.delta()).collect();
        joined == input
    }

    QuickCheck::new()
        .tests(test_count())
        .quickcheck(prop as fn(String, Vec<usize>, ParserVariant) -> bool);
}
