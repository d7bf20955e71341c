#![allow(missing_docs)]
#![allow(dead_code)]

/// A turn that uses every encoding, split the way a model server might send
/// it.
pub const STREAM: &[&str] = &[
    "I'll check the ",
    r#"repo first. {"tool":"ru"#,
    r#"n_bash","arguments":{"command":"ls"}}"#,
    " Then I'll write <write_",
    "file path=\"notes.md\"># Notes\n",
    "- done</write_file>\n",
    r#"[[SEG_START {"type":"reasoning"}]]almost"#,
    " there[[SEG_E",
    r#"ND]]<tool name="run_bash"><arguments><arg name="command">cargo "#,
    "test</arg></arguments></tool> Done.",
];

pub fn joined() -> String {
    STREAM.concat()
}
