use chrono::{DateTime, Utc};
use gloss_common::HexColor;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::collections::BTreeMap;

/// A reply attached to a highlight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: SmolStr,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// One user highlight over the visible text of a document.
///
/// `start` and `end` are offsets in Unicode scalar values into the visible
/// text projection, `end` exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightSpan {
    pub id: SmolStr,
    pub start: usize,
    pub end: usize,
    pub tag: SmolStr,
    pub author: SmolStr,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Paragraph or section reference shown in the margin note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub para_ref: Option<SmolStr>,
}

/// A highlight that survived injection, with the index its markers carry.
///
/// `start`/`end` are the offsets actually used, after widening to grapheme
/// cluster boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedSpan {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub span: HighlightSpan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// `end` lies past the end of the visible text.
    OutOfBounds { text_len: usize },
    /// `start >= end`.
    Empty,
}

/// A highlight dropped during injection because its offsets no longer fit
/// the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSpan {
    pub id: SmolStr,
    pub start: usize,
    pub end: usize,
    pub reason: SkipReason,
}

/// Display name and colour for one tag.
///
/// `color` is `None` when the map held something that is not a hex colour;
/// the style table substitutes the configured default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TagInfoRepr")]
pub struct TagInfo {
    pub name: Option<SmolStr>,
    pub color: Option<HexColor>,
}

impl TagInfo {
    pub fn new(name: Option<&str>, color: HexColor) -> Self {
        Self {
            name: name.map(SmolStr::new),
            color: Some(color),
        }
    }
}

/// Tag maps come either as `{"tag": "#rrggbb"}` or with a display name.
#[derive(Deserialize)]
#[serde(untagged)]
enum TagInfoRepr {
    Color(String),
    Full {
        #[serde(default)]
        name: Option<SmolStr>,
        color: String,
    },
}

impl From<TagInfoRepr> for TagInfo {
    fn from(repr: TagInfoRepr) -> Self {
        let (name, raw) = match repr {
            TagInfoRepr::Color(raw) => (None, raw),
            TagInfoRepr::Full { name, color } => (name, color),
        };
        let color = match raw.parse::<HexColor>() {
            Ok(color) => Some(color),
            Err(e) => {
                tracing::warn!(error = %e, "tag colour is not a hex colour, using default");
                None
            }
        };
        Self { name, color }
    }
}

/// Tag id to display information.
pub type TagColors = BTreeMap<SmolStr, TagInfo>;
