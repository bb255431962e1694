//! Slicing converted output around the sentinels.
//!
//! The tokenizer does not interpret the surrounding markup; literal runs keep
//! whatever the converter produced, byte for byte.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::TokenizeError;
use crate::marker::{MARKER_RE, Marker, MarkerKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MarkerToken<'a> {
    Text(&'a str),
    Start(usize),
    End(usize),
    Anchor(usize),
}

#[derive(Debug, Default)]
struct Seen {
    start: Option<usize>,
    end: Option<usize>,
    anchor: Option<usize>,
}

/// Split `stream` into literal runs and markers.
///
/// An empty literal is emitted between two adjacent markers so the region
/// builder sees the transition, but never at either end of the stream.
///
/// Fails when the markers cannot have come from one injection: a start or
/// end without its partner, an end before its start, or any marker repeated.
pub fn tokenize(stream: &str) -> Result<Vec<MarkerToken<'_>>, TokenizeError> {
    let mut tokens = Vec::new();
    let mut seen: BTreeMap<usize, Seen> = BTreeMap::new();
    let mut last = 0;
    let mut prev_was_marker = false;

    for caps in MARKER_RE.captures_iter(stream) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let literal = &stream[last..whole.start()];
        if !literal.is_empty() || prev_was_marker {
            tokens.push(MarkerToken::Text(literal));
        }

        let (kind, digits) = if let Some(m) = caps.name("start") {
            (MarkerKind::Start, m.as_str())
        } else if let Some(m) = caps.name("end") {
            (MarkerKind::End, m.as_str())
        } else if let Some(m) = caps.name("anchor") {
            (MarkerKind::Anchor, m.as_str())
        } else {
            continue;
        };
        // At most nine digits, so this always fits.
        let Ok(index) = digits.parse::<usize>() else {
            continue;
        };
        let offset = whole.start();

        let entry = seen.entry(index).or_default();
        let slot = match kind {
            MarkerKind::Start => &mut entry.start,
            MarkerKind::End => &mut entry.end,
            MarkerKind::Anchor => &mut entry.anchor,
        };
        if slot.is_some() {
            return Err(TokenizeError::Duplicate {
                kind,
                index,
                offset,
            });
        }
        *slot = Some(offset);

        tokens.push(match kind {
            MarkerKind::Start => MarkerToken::Start(index),
            MarkerKind::End => MarkerToken::End(index),
            MarkerKind::Anchor => MarkerToken::Anchor(index),
        });
        last = whole.end();
        prev_was_marker = true;
    }

    if last < stream.len() {
        tokens.push(MarkerToken::Text(&stream[last..]));
    }

    for (&index, seen) in &seen {
        match (seen.start, seen.end) {
            (Some(offset), None) => return Err(TokenizeError::UnmatchedStart { index, offset }),
            (None, Some(offset)) => return Err(TokenizeError::UnmatchedEnd { index, offset }),
            (Some(start), Some(end)) if end < start => {
                return Err(TokenizeError::EndBeforeStart { index, start, end });
            }
            _ => {}
        }
    }

    tracing::debug!(tokens = tokens.len(), highlights = seen.len(), "tokenized converted output");
    Ok(tokens)
}

/// Check that every one of `expected` injected highlights came back with
/// all three markers, and that nothing else did.
pub fn verify_round_trip(tokens: &[MarkerToken<'_>], expected: usize) -> Result<(), TokenizeError> {
    let mut found = vec![[false; 3]; expected];
    let mut offset = 0;
    for token in tokens {
        let (kind, index) = match *token {
            MarkerToken::Text(text) => {
                offset += text.len();
                continue;
            }
            MarkerToken::Start(i) => (MarkerKind::Start, i),
            MarkerToken::End(i) => (MarkerKind::End, i),
            MarkerToken::Anchor(i) => (MarkerKind::Anchor, i),
        };
        let Some(slots) = found.get_mut(index) else {
            return Err(TokenizeError::UnknownIndex { index, offset });
        };
        slots[kind as usize] = true;
        offset += Marker { kind, index }.to_string().len();
    }

    for (index, slots) in found.iter().enumerate() {
        for kind in [MarkerKind::Start, MarkerKind::End, MarkerKind::Anchor] {
            if !slots[kind as usize] {
                return Err(TokenizeError::MissingMarker { kind, index });
            }
        }
    }
    Ok(())
}
