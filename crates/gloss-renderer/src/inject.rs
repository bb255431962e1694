//! Marker injection over HTML documents.
//!
//! Highlights are addressed in visible-text offsets, so injection first
//! builds the visible-text projection of the markup ([`visible_text`]),
//! remembering for every visible unit where it sits in the raw markup. Each
//! surviving span then gets its sentinels spliced in at the raw positions of
//! its first and last unit.
//!
//! The projection is the offset contract shared with the client that made
//! the selections: tags, comments and the contents of non-content elements
//! are invisible, a character reference counts as the characters it decodes
//! to (almost always one), `<br>` is one unit and, in collapse mode, a
//! whitespace run inside a text node is one unit.

use gloss_common::WhitespaceMode;
use std::ops::Range;
use html5ever::data::NAMED_ENTITIES;
use unicode_segmentation::UnicodeSegmentation;

use crate::marker::Marker;
use crate::types::{HighlightSpan, IndexedSpan, SkipReason, SkippedSpan};

/// Elements whose whole content is invisible.
const HIDDEN_ELEMENTS: &[&str] = &["head", "script", "style", "template", "title", "noscript"];

/// One visible character and the markup bytes it was projected from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleUnit {
    pub ch: char,
    pub raw: Range<usize>,
}

/// The visible-text projection of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibleText {
    pub text: String,
    pub units: Vec<VisibleUnit>,
}

impl VisibleText {
    /// Length in units, the space highlight offsets live in.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    fn push(&mut self, ch: char, raw: Range<usize>) {
        self.text.push(ch);
        self.units.push(VisibleUnit { ch, raw });
    }

    /// `boundaries[k]` is true when offset `k` sits between grapheme clusters.
    fn grapheme_boundaries(&self) -> Vec<bool> {
        let mut boundaries = vec![false; self.units.len() + 1];
        let mut offset = 0;
        boundaries[0] = true;
        for grapheme in self.text.graphemes(true) {
            offset += grapheme.chars().count();
            boundaries[offset] = true;
        }
        boundaries
    }
}

/// Markup with sentinels spliced in, plus the index assignment.
#[derive(Debug, Clone, Default)]
pub struct InjectedDocument {
    pub markup: String,
    /// Surviving spans; `spans[i].index == i`.
    pub spans: Vec<IndexedSpan>,
    pub skipped: Vec<SkippedSpan>,
}

/// Project `markup` to the text a reader sees.
pub fn visible_text(markup: &str, whitespace: WhitespaceMode) -> VisibleText {
    let mut visible = VisibleText::default();
    let bytes = markup.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if markup[i..].starts_with("<!--") {
            i = markup[i + 4..]
                .find("-->")
                .map_or(markup.len(), |pos| i + 4 + pos + 3);
            continue;
        }

        if bytes[i] == b'<' && starts_tag(bytes, i) {
            let tag = scan_tag(markup, i);
            if !tag.closing && tag.name == "br" {
                visible.push('\n', i..tag.end);
                i = tag.end;
            } else if !tag.closing
                && !tag.self_closing
                && HIDDEN_ELEMENTS.contains(&tag.name.as_str())
            {
                i = skip_element(markup, tag.end, &tag.name);
            } else {
                i = tag.end;
            }
            continue;
        }

        let end = text_node_end(markup, i);
        project_text_node(markup, i..end, whitespace, &mut visible);
        i = end;
    }

    visible
}

/// Splice start, end and anchor sentinels for `spans` into `markup`.
///
/// Spans whose offsets do not fit the document are skipped and logged, not
/// treated as errors: offsets may come from a client that saw an older
/// revision of the document.
pub fn inject(
    markup: &str,
    spans: &[HighlightSpan],
    whitespace: WhitespaceMode,
) -> InjectedDocument {
    let visible = visible_text(markup, whitespace);
    let len = visible.len();
    let boundaries = visible.grapheme_boundaries();

    let mut kept = Vec::with_capacity(spans.len());
    let mut skipped = Vec::new();

    for span in spans {
        let reason = if span.start >= span.end {
            Some(SkipReason::Empty)
        } else if span.end > len {
            Some(SkipReason::OutOfBounds { text_len: len })
        } else {
            None
        };
        if let Some(reason) = reason {
            tracing::warn!(
                id = %span.id,
                start = span.start,
                end = span.end,
                text_len = len,
                "skipping highlight that does not fit the document"
            );
            skipped.push(SkippedSpan {
                id: span.id.clone(),
                start: span.start,
                end: span.end,
                reason,
            });
            continue;
        }

        let mut start = span.start;
        while !boundaries[start] {
            start -= 1;
        }
        let mut end = span.end;
        while !boundaries[end] {
            end += 1;
        }
        if (start, end) != (span.start, span.end) {
            tracing::debug!(id = %span.id, start, end, "widened highlight to grapheme boundaries");
        }

        kept.push(IndexedSpan {
            index: kept.len(),
            start,
            end,
            span: span.clone(),
        });
    }

    let mut insertions = Vec::with_capacity(kept.len() * 3);
    for indexed in &kept {
        let index = indexed.index;
        insertions.push(Insertion {
            at: visible.units[indexed.end - 1].raw.end,
            rank: (0, usize::MAX - index, 0),
            marker: Marker::end(index),
        });
        let at = visible.units[indexed.start].raw.start;
        insertions.push(Insertion {
            at,
            rank: (1, index, 0),
            marker: Marker::anchor(index),
        });
        insertions.push(Insertion {
            at,
            rank: (1, index, 1),
            marker: Marker::start(index),
        });
    }
    insertions.sort_by_key(|ins| (ins.at, ins.rank));

    let mut out = String::with_capacity(markup.len() + insertions.len() * 16);
    let mut last = 0;
    for ins in &insertions {
        out.push_str(&markup[last..ins.at]);
        out.push_str(&ins.marker.to_string());
        last = ins.at;
    }
    out.push_str(&markup[last..]);

    tracing::debug!(
        kept = kept.len(),
        skipped = skipped.len(),
        text_len = len,
        "injected highlight markers"
    );

    InjectedDocument {
        markup: out,
        spans: kept,
        skipped,
    }
}

#[derive(Debug)]
struct Insertion {
    at: usize,
    /// Order among insertions at the same byte: ends (highest index first),
    /// then each span's anchor followed by its start, lowest index first.
    rank: (u8, usize, u8),
    marker: Marker,
}

#[derive(Debug)]
struct Tag {
    name: String,
    closing: bool,
    self_closing: bool,
    end: usize,
}

fn starts_tag(bytes: &[u8], i: usize) -> bool {
    matches!(bytes.get(i + 1), Some(b) if b.is_ascii_alphabetic() || matches!(b, b'/' | b'!' | b'?'))
}

/// Scan a tag starting at `<`, honouring quoted attribute values.
fn scan_tag(markup: &str, start: usize) -> Tag {
    let bytes = markup.as_bytes();
    let mut i = start + 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }
    let name_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    let name = markup[name_start..i].to_ascii_lowercase();

    let mut quote = None;
    while i < bytes.len() {
        match (quote, bytes[i]) {
            (None, b'"' | b'\'') => quote = Some(bytes[i]),
            (Some(q), b) if b == q => quote = None,
            (None, b'>') => break,
            _ => {}
        }
        i += 1;
    }
    let end = (i + 1).min(bytes.len());
    let self_closing = end >= 2 && bytes[end - 2] == b'/' && bytes[end - 1] == b'>';

    Tag {
        name,
        closing,
        self_closing,
        end,
    }
}

/// Byte offset just past `</name ...>`, or the end of input.
fn skip_element(markup: &str, from: usize, name: &str) -> usize {
    let bytes = markup.as_bytes();
    let mut i = from;
    while let Some(pos) = markup[i..].find("</") {
        let at = i + pos;
        let candidate = &bytes[at + 2..];
        if candidate.len() >= name.len()
            && candidate[..name.len()].eq_ignore_ascii_case(name.as_bytes())
            && !candidate
                .get(name.len())
                .is_some_and(|b| b.is_ascii_alphanumeric())
        {
            return scan_tag(markup, at).end;
        }
        i = at + 2;
    }
    markup.len()
}

fn text_node_end(markup: &str, from: usize) -> usize {
    let bytes = markup.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'<' && starts_tag(bytes, i) {
            return i;
        }
        i += 1;
    }
    bytes.len()
}

fn project_text_node(
    markup: &str,
    range: Range<usize>,
    whitespace: WhitespaceMode,
    visible: &mut VisibleText,
) {
    let node = &markup[range.clone()];
    let collapse = whitespace == WhitespaceMode::Collapse;
    if collapse && node.contains('\n') && node.bytes().all(|b| b.is_ascii_whitespace()) {
        return;
    }

    let mut i = range.start;
    let mut pending_ws: Option<Range<usize>> = None;
    while i < range.end {
        let Atom { ch, second, len } = decode_atom(&markup[i..range.end]);
        let raw = i..i + len;
        i += len;

        if collapse && ch.is_ascii_whitespace() && second.is_none() {
            pending_ws = Some(match pending_ws {
                Some(run) => run.start..raw.end,
                None => raw,
            });
            continue;
        }
        if let Some(run) = pending_ws.take() {
            visible.push(' ', run);
        }
        if let Some(second) = second {
            visible.push(ch, raw.clone());
            visible.push(second, raw);
        } else {
            visible.push(ch, raw);
        }
    }
    if let Some(run) = pending_ws {
        visible.push(' ', run);
    }
}

/// One decoded character or character reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Atom {
    ch: char,
    /// A handful of named references decode to two characters.
    second: Option<char>,
    len: usize,
}

/// Decode one character or character reference at the start of `text`.
fn decode_atom(text: &str) -> Atom {
    let Some(first) = text.chars().next() else {
        return Atom {
            ch: '\0',
            second: None,
            len: 0,
        };
    };
    if first == '&' {
        if let Some(atom) = decode_reference(text) {
            return atom;
        }
    }
    Atom {
        ch: first,
        second: None,
        len: first.len_utf8(),
    }
}

fn decode_reference(text: &str) -> Option<Atom> {
    if let Some(num) = text.strip_prefix("&#") {
        let semi = num.bytes().take(10).position(|b| b == b';')?;
        let digits = &num[..semi];
        let code = match digits.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => digits.parse().ok()?,
        };
        return Some(Atom {
            ch: char::from_u32(code)?,
            second: None,
            len: "&#".len() + semi + 1,
        });
    }
    named_reference(text)
}

/// Longest HTML5 named reference at the start of `text`, the way a browser
/// reads it in running text. Legacy names such as `&copy` also match without
/// the semicolon.
fn named_reference(text: &str) -> Option<Atom> {
    let name_len = text[1..]
        .bytes()
        .take(LONGEST_ENTITY_NAME)
        .take_while(u8::is_ascii_alphanumeric)
        .count();
    if name_len == 0 {
        return None;
    }
    if text[1 + name_len..].starts_with(';') {
        if let Some(atom) = lookup_entity(&text[1..name_len + 2]) {
            return Some(atom);
        }
    }
    (1..=name_len).rev().find_map(|n| lookup_entity(&text[1..1 + n]))
}

/// `&CounterClockwiseContourIntegral;` without its delimiters.
const LONGEST_ENTITY_NAME: usize = 31;

fn lookup_entity(key: &str) -> Option<Atom> {
    // The table also maps every proper prefix of a name to (0, 0).
    let &(first, second) = NAMED_ENTITIES.get(key)?;
    let ch = char::from_u32(first).filter(|&ch| ch != '\0')?;
    Some(Atom {
        ch,
        second: char::from_u32(second).filter(|&ch| ch != '\0'),
        len: key.len() + 1,
    })
}
