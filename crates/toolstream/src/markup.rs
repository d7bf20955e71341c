//! Helpers for the XML-like tool encodings.
//!
//! These only ever run on complete slices (a finished opening tag, a finished
//! `<arg>` element, a finished segment body), never on partial input.
use std::sync::LazyLock;

use regex::Regex;

use crate::segment::Metadata;

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][\w.:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attribute pattern")
});

static ARG_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<arg\s+name\s*=\s*(?:"([^"]*)"|'([^']*)')\s*>"#).expect("valid arg pattern")
});

static ARG_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<arg\s+name\s*=\s*(?:"([^"]*)"|'([^']*)')\s*>(.*?)</arg>"#)
        .expect("valid arg element pattern")
});

pub(crate) const ARG_CLOSE: &str = "</arg>";

/// An `<arg name="..">` opening tag found in a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ArgOpen {
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) name: String,
}

fn quoted(caps: &regex::Captures<'_>, double: usize, single: usize) -> String {
    caps.get(double)
        .or_else(|| caps.get(single))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Parses `key="value"` / `key='value'` pairs of an opening tag.
pub(crate) fn parse_attributes(tag_body: &str) -> Metadata {
    let mut attrs = Metadata::new();
    for caps in ATTRIBUTE.captures_iter(tag_body) {
        let Some(key) = caps.get(1) else { continue };
        attrs.insert(key.as_str().to_string(), quoted(&caps, 2, 3).into());
    }
    attrs
}

/// Finds the first complete `<arg name="..">` opening tag in `haystack`.
pub(crate) fn find_arg_open(haystack: &str) -> Option<ArgOpen> {
    let caps = ARG_OPEN.captures(haystack)?;
    let whole = caps.get(0)?;
    Some(ArgOpen {
        start: whole.start(),
        end: whole.end(),
        name: quoted(&caps, 1, 2),
    })
}

/// Collects every complete `<arg name="k">v</arg>` element in document order.
pub(crate) fn arg_elements(body: &str) -> Vec<(String, String)> {
    ARG_ELEMENT
        .captures_iter(body)
        .filter_map(|caps| {
            let value = caps.get(3)?.as_str().to_string();
            Some((quoted(&caps, 1, 2), value))
        })
        .collect()
}
