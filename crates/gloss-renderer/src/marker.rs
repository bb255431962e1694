//! Sentinel strings carried through the external converter.
//!
//! Sentinels are letters and digits only, so a converter treats them as part
//! of an ordinary word and never escapes, splits or reorders them.

use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use crate::latex::{group_end, skip_ws};

/// Matches any sentinel. Indices are capped at nine digits so they always
/// fit a `usize`.
pub static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"HLSTART(?P<start>\d{1,9})ENDHL|HLEND(?P<end>\d{1,9})ENDHL|ANNMARKER(?P<anchor>\d{1,9})ENDMARKER")
        .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Start,
    End,
    Anchor,
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerKind::Start => f.write_str("highlight start"),
            MarkerKind::End => f.write_str("highlight end"),
            MarkerKind::Anchor => f.write_str("annotation anchor"),
        }
    }
}

/// One sentinel: what it marks and the highlight index it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub index: usize,
}

impl Marker {
    pub fn start(index: usize) -> Self {
        Self {
            kind: MarkerKind::Start,
            index,
        }
    }

    pub fn end(index: usize) -> Self {
        Self {
            kind: MarkerKind::End,
            index,
        }
    }

    pub fn anchor(index: usize) -> Self {
        Self {
            kind: MarkerKind::Anchor,
            index,
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MarkerKind::Start => write!(f, "HLSTART{}ENDHL", self.index),
            MarkerKind::End => write!(f, "HLEND{}ENDHL", self.index),
            MarkerKind::Anchor => write!(f, "ANNMARKER{}ENDMARKER", self.index),
        }
    }
}

/// Remove every sentinel, leaving the literal stream.
pub fn strip_markers(stream: &str) -> String {
    MARKER_RE.replace_all(stream, "").into_owned()
}

/// Remove sentinels from the plain-text argument of every
/// `\texorpdfstring{<latex>}{<plain>}`.
///
/// Converters fill the second argument by flattening the heading text, so it
/// repeats every sentinel of the first. Only the first copy is real.
pub fn strip_pdf_string_markers(stream: &str) -> Cow<'_, str> {
    const COMMAND: &str = "\\texorpdfstring";
    if !stream.contains(COMMAND) {
        return Cow::Borrowed(stream);
    }

    let mut out = String::with_capacity(stream.len());
    let mut copied = 0;
    let mut from = 0;
    while let Some(pos) = stream[from..].find(COMMAND) {
        from += pos + COMMAND.len();
        if stream[from..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            continue;
        }
        let first = skip_ws(stream, from);
        if !stream[first..].starts_with('{') {
            continue;
        }
        let Some(first_end) = group_end(stream, first) else {
            break;
        };
        let second = skip_ws(stream, first_end);
        if !stream[second..].starts_with('{') {
            continue;
        }
        let Some(second_end) = group_end(stream, second) else {
            break;
        };
        out.push_str(&stream[copied..second]);
        out.push_str(&MARKER_RE.replace_all(&stream[second..second_end], ""));
        copied = second_end;
        from = second_end;
    }
    out.push_str(&stream[copied..]);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_match_their_own_pattern() {
        for marker in [Marker::start(0), Marker::end(12), Marker::anchor(345)] {
            let text = marker.to_string();
            let caps = MARKER_RE.captures(&text).unwrap();
            assert_eq!(caps.get(0).unwrap().as_str(), text);
        }
    }

    #[test]
    fn sentinels_survive_inside_words() {
        let stream = "fooHLSTART3ENDHLbar baz";
        assert_eq!(strip_markers(stream), "foobar baz");
    }

    #[test]
    fn start_and_end_do_not_overlap() {
        // "HLEND" must not be read as the tail of some other sentinel.
        let stream = "HLSTART1ENDHLHLEND1ENDHL";
        let found: Vec<_> = MARKER_RE.find_iter(stream).map(|m| m.as_str()).collect();
        assert_eq!(found, vec!["HLSTART1ENDHL", "HLEND1ENDHL"]);
    }

    #[test]
    fn pdf_string_copy_loses_its_sentinels() {
        let stream = "\\section{\\texorpdfstring{R v \\emph{HLSTART0ENDHLSmith}}{R v HLSTART0ENDHLSmith}}HLEND0ENDHL";
        assert_eq!(
            strip_pdf_string_markers(stream),
            "\\section{\\texorpdfstring{R v \\emph{HLSTART0ENDHLSmith}}{R v Smith}}HLEND0ENDHL"
        );
    }

    #[test]
    fn streams_without_pdf_strings_are_borrowed() {
        let stream = "HLSTART0ENDHLa \\texorpdfstringx{b}{HLEND0ENDHL}";
        assert!(matches!(strip_pdf_string_markers("plain"), Cow::Borrowed("plain")));
        assert_eq!(strip_pdf_string_markers(stream), stream);
    }
}
