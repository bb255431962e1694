use super::*;
use crate::boundary::{RestrictedContexts, relocate_illegal_annotations};
use crate::regions::build_regions;
use crate::tokenize::tokenize;
use crate::types::{HighlightSpan, TagColors, TagInfo};
use chrono::{TimeZone, Utc};
use gloss_common::{HexColor, StyleConfig};

const NOTE_A: &str = r"\annot{tag-a}{\textbf{Alpha}\par{\scriptsize Ada, 03 Feb 2025 14:22}}";
const NOTE_B: &str = r"\annot{tag-b}{\textbf{Beta}\par{\scriptsize Ada, 03 Feb 2025 14:22}}";

fn spans(tags: &[&str]) -> Vec<IndexedSpan> {
    tags.iter()
        .enumerate()
        .map(|(index, tag)| IndexedSpan {
            index,
            start: 0,
            end: 1,
            span: HighlightSpan {
                id: format!("hl-{index}").into(),
                start: 0,
                end: 1,
                tag: (*tag).into(),
                author: "Ada".into(),
                created_at: Utc.with_ymd_and_hms(2025, 2, 3, 14, 22, 0).unwrap(),
                comments: vec![],
                para_ref: None,
            },
        })
        .collect()
}

fn tag_colors() -> TagColors {
    let mut tags = TagColors::new();
    tags.insert("a".into(), TagInfo::new(Some("Alpha"), HexColor::new(0x1f, 0x77, 0xb4)));
    tags.insert("b".into(), TagInfo::new(Some("Beta"), HexColor::new(0xff, 0x7f, 0x0e)));
    tags.insert("c".into(), TagInfo::new(Some("Gamma"), HexColor::new(0x2c, 0xa0, 0x2c)));
    tags
}

fn render(stream: &str, tags: &[&str]) -> String {
    let spans = spans(tags);
    let styles = TagStyles::new(&tag_colors(), &spans, &StyleConfig::default());
    let tokens = tokenize(stream).unwrap();
    RegionRenderer::new(&spans, &styles).render_all(&build_regions(&tokens))
}

#[test]
fn test_unhighlighted_text_is_unchanged() {
    let text = "plain \\emph{text}\n\nmore";
    assert_eq!(render(text, &[]), text);
}

#[test]
fn test_crossing_overlap_renders_three_shapes() {
    let stream = "The ANNMARKER0ENDMARKERHLSTART0ENDHLquick \
                  ANNMARKER1ENDMARKERHLSTART1ENDHLbrown HLEND0ENDHLfox HLEND1ENDHLjumps";
    let expected = [
        "The ",
        NOTE_A,
        r"\highLight[tag-a-light]{\underLine[color=tag-a-dark, height=1pt, bottom=-3pt]{quick }}",
        NOTE_B,
        r"\highLight[tag-a-light]{\highLight[tag-b-light]{\underLine[color=tag-a-dark, height=2pt, bottom=-3pt]{\underLine[color=tag-b-dark, height=1pt, bottom=-5pt]{brown }}}}",
        r"\highLight[tag-b-light]{\underLine[color=tag-b-dark, height=1pt, bottom=-3pt]{fox }}",
        "jumps",
    ]
    .concat();
    assert_eq!(render(stream, &["a", "b"]), expected);
}

#[test]
fn test_lower_index_is_always_outer() {
    let later_first = render(
        "HLSTART1ENDHLx HLSTART0ENDHLboth HLEND1ENDHLHLEND0ENDHL",
        &["a", "b"],
    );
    let earlier_first = render(
        "HLSTART0ENDHLx HLSTART1ENDHLboth HLEND0ENDHLHLEND1ENDHL",
        &["a", "b"],
    );
    let nested = r"\highLight[tag-a-light]{\highLight[tag-b-light]{";
    assert!(later_first.contains(nested));
    assert!(earlier_first.contains(nested));
    assert!(!later_first.contains(r"\highLight[tag-b-light]{\highLight[tag-a-light]{"));
}

#[test]
fn test_three_way_overlap_uses_one_shared_style() {
    let out = render(
        "HLSTART0ENDHLHLSTART1ENDHLHLSTART2ENDHLx HLEND2ENDHLHLEND1ENDHLHLEND0ENDHL",
        &["a", "b", "c"],
    );
    assert_eq!(
        out,
        r"\highLight[many-light]{\underLine[color=many-dark, height=4pt, bottom=-5pt]{x }}"
    );
}

#[test]
fn test_region_straddling_heading_keeps_braces_outside_wrappers() {
    let out = render(
        "\\section{HLSTART0ENDHLHead}\\label{head}\n\nBody HLEND0ENDHLtail",
        &["a"],
    );
    let expected = [
        r"\section{",
        r"\highLight[tag-a-light]{\underLine[color=tag-a-dark, height=1pt, bottom=-3pt]{Head}}",
        "}\\label{head}\n\n",
        r"\highLight[tag-a-light]{\underLine[color=tag-a-dark, height=1pt, bottom=-3pt]{Body }}",
        "tail",
    ]
    .concat();
    assert_eq!(out, expected);
}

#[test]
fn test_boundary_inside_item_label_braces_the_wrapper() {
    let out = render(
        "\\item[TeANNMARKER0ENDMARKERHLSTART0ENDHLrm] body HLEND0ENDHLtail",
        &["a"],
    );
    let wrapped_term =
        r"{\highLight[tag-a-light]{\underLine[color=tag-a-dark, height=1pt, bottom=-3pt]{rm}}}";
    let wrapped_body =
        r"\highLight[tag-a-light]{\underLine[color=tag-a-dark, height=1pt, bottom=-3pt]{ body }}";
    assert_eq!(
        out,
        [r"\item[Te", NOTE_A, wrapped_term, "]", wrapped_body, "tail"].concat()
    );

    let relocated = relocate_illegal_annotations(&out, &RestrictedContexts::default()).unwrap();
    assert_eq!(
        relocated,
        [r"\item[Te", wrapped_term, "]", NOTE_A, wrapped_body, "tail"].concat()
    );
}

#[test]
fn test_empty_regions_emit_nothing() {
    let out = render("aHLSTART0ENDHLHLEND0ENDHLb", &["a"]);
    assert_eq!(out, "ab");
}

#[test]
fn test_anchor_for_unknown_highlight_is_dropped() {
    let spans = spans(&["a"]);
    let styles = TagStyles::new(&tag_colors(), &spans, &StyleConfig::default());
    let region = Region {
        text: "x",
        active: BTreeSet::new(),
        annots: vec![7],
    };
    assert_eq!(RegionRenderer::new(&spans, &styles).render(&region), "x");
}
