//! Delimiter matching shared by the parsing states.
use crate::options::ParserConfig;

/// The XML-like tags that open a tool segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum XmlTag {
    Tool,
    WriteFile,
    PatchFile,
    RunBash,
    RunTerminalCmd,
}

impl XmlTag {
    pub(crate) const ALL: [XmlTag; 5] = [
        XmlTag::Tool,
        XmlTag::WriteFile,
        XmlTag::PatchFile,
        XmlTag::RunBash,
        XmlTag::RunTerminalCmd,
    ];

    pub(crate) fn name(self) -> &'static str {
        match self {
            XmlTag::Tool => "tool",
            XmlTag::WriteFile => "write_file",
            XmlTag::PatchFile => "patch_file",
            XmlTag::RunBash => "run_bash",
            XmlTag::RunTerminalCmd => "run_terminal_cmd",
        }
    }

    pub(crate) fn closer(self) -> &'static str {
        match self {
            XmlTag::Tool => "</tool>",
            XmlTag::WriteFile => "</write_file>",
            XmlTag::PatchFile => "</patch_file>",
            XmlTag::RunBash => "</run_bash>",
            XmlTag::RunTerminalCmd => "</run_terminal_cmd>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenerKind {
    Json,
    Tag(XmlTag),
    Sentinel,
}

/// A delimiter that makes the text state hand over to another state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Opener {
    pub(crate) pattern: String,
    pub(crate) kind: OpenerKind,
}

pub(crate) fn openers_for(config: &ParserConfig) -> Vec<Opener> {
    let mut openers = Vec::new();
    if config.variant.json_enabled() {
        for pattern in ["{", "["] {
            openers.push(Opener {
                pattern: pattern.to_string(),
                kind: OpenerKind::Json,
            });
        }
    }
    if config.variant.xml_enabled() {
        for tag in XmlTag::ALL {
            openers.push(Opener {
                pattern: format!("<{}", tag.name()),
                kind: OpenerKind::Tag(tag),
            });
        }
    }
    if config.variant.sentinel_enabled() && !config.sentinel.start.is_empty() {
        openers.push(Opener {
            pattern: config.sentinel.start.clone(),
            kind: OpenerKind::Sentinel,
        });
    }
    openers
}

/// Length of the longest suffix of `haystack` that is a proper prefix of
/// `pattern`, i.e. how much of `haystack` must be held back because the next
/// chunk could complete `pattern`.
pub(crate) fn partial_suffix_len(haystack: &str, pattern: &str) -> usize {
    let max = pattern.len().saturating_sub(1).min(haystack.len());
    (1..=max)
        .rev()
        .find(|&k| {
            pattern.is_char_boundary(k)
                && haystack.is_char_boundary(haystack.len() - k)
                && haystack.ends_with(&pattern[..k])
        })
        .unwrap_or(0)
}

/// The first `max` bytes of `text`, shortened to a character boundary.
///
/// Length caps are applied to this view rather than to whatever happens to be
/// buffered, so a candidate is accepted or rejected the same way however the
/// input was chunked.
pub(crate) fn head(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Structural bracket matcher for JSON text.
///
/// Tracks brace and bracket depth outside strings. This is not a validator:
/// it only decides where a value ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct JsonScanner {
    brace_depth: usize,
    bracket_depth: usize,
    in_string: bool,
    escape_pending: bool,
    opened: bool,
}

impl JsonScanner {
    /// Feeds one character. Returns `true` once the outermost value closed.
    pub(crate) fn push(&mut self, ch: char) -> bool {
        if self.in_string {
            if self.escape_pending {
                self.escape_pending = false;
            } else if ch == '\\' {
                self.escape_pending = true;
            } else if ch == '"' {
                self.in_string = false;
            }
            return false;
        }
        match ch {
            '"' => {
                self.in_string = true;
                return false;
            }
            '{' => self.brace_depth += 1,
            '[' => self.bracket_depth += 1,
            '}' => self.brace_depth = self.brace_depth.saturating_sub(1),
            ']' => self.bracket_depth = self.bracket_depth.saturating_sub(1),
            _ => return false,
        }
        if matches!(ch, '{' | '[') {
            self.opened = true;
            return false;
        }
        self.opened && self.brace_depth == 0 && self.bracket_depth == 0
    }

    /// Byte length of the complete value at the start of `text`, if it closes
    /// within `text`.
    pub(crate) fn scan(&mut self, text: &str) -> Option<usize> {
        text.char_indices()
            .find(|&(_, ch)| self.push(ch))
            .map(|(idx, ch)| idx + ch.len_utf8())
    }
}
