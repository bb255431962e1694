//! Margin notes for annotation anchors.

use chrono::{DateTime, Utc};

use super::styles::TagStyle;
use crate::types::HighlightSpan;
use crate::utils::escape_latex;

const TIME_FORMAT: &str = "%d %b %Y %H:%M";

/// Render `\annot{<key>}{<body>}` for one highlight.
///
/// The body carries the bold tag name, the optional paragraph reference,
/// author and creation time, then any comments under a rule.
pub(crate) fn write_annotation(out: &mut String, span: &HighlightSpan, style: &TagStyle) {
    out.push_str("\\annot{");
    out.push_str(&style.key());
    out.push_str("}{\\textbf{");
    out.push_str(&escape_latex(&style.name));
    out.push('}');
    if let Some(para) = span.para_ref.as_deref().filter(|p| !p.trim().is_empty()) {
        out.push(' ');
        out.push_str(&escape_latex(para.trim()));
    }
    out.push_str("\\par{\\scriptsize ");
    out.push_str(&escape_latex(&span.author));
    out.push_str(", ");
    out.push_str(&timestamp(&span.created_at));
    out.push('}');

    if !span.comments.is_empty() {
        out.push_str("\\par\\hrulefill");
        for comment in &span.comments {
            out.push_str("\\par{\\scriptsize\\textbf{");
            out.push_str(&escape_latex(&comment.author));
            out.push_str("}, ");
            out.push_str(&timestamp(&comment.timestamp));
            out.push_str(":} ");
            out.push_str(&comment_body(&comment.text));
        }
    }
    out.push('}');
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.format(TIME_FORMAT).to_string()
}

/// Escape comment text, keeping blank-line paragraph breaks.
fn comment_body(text: &str) -> String {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }
    paragraphs
        .iter()
        .map(|p| escape_latex(p))
        .collect::<Vec<_>>()
        .join("\\par ")
}
