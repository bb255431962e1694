use gloss_common::ExportConfig;
use gloss_renderer::marker::strip_markers;
use gloss_renderer::{
    ConverterError, ExportError, Exporter, FnConverter, HighlightSpan, SkipReason, TagColors,
    TokenizeError, build_regions, tokenize,
};

/// Stands in for pandoc on the handful of elements these documents use.
fn fake_pandoc(html: &str) -> Result<String, ConverterError> {
    const RULES: &[(&str, &str)] = &[
        ("<h2>", "\\section{"),
        ("</h2>", "}\\label{s}\n\n"),
        ("<p>", ""),
        ("</p>", "\n\n"),
        ("<em>", "\\emph{"),
        ("</em>", "}"),
        ("<table><tr><td>", "\\begin{longtable}[]{@{}ll@{}}\n"),
        ("</td><td>", " & "),
        ("</td></tr></table>", " \\\\\n\\end{longtable}\n\n"),
        ("&amp;", "\\&"),
    ];
    let mut out = html.to_owned();
    for (from, to) in RULES {
        out = out.replace(from, to);
    }
    Ok(out)
}

fn tags() -> TagColors {
    serde_json::from_str(
        r##"{
            "facts": {"name": "Facts", "color": "#1f77b4"},
            "issue": "#ff7f0e",
            "ratio": "#2ca02c"
        }"##,
    )
    .unwrap()
}

fn span(id: &str, start: usize, end: usize, tag: &str) -> HighlightSpan {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "start": start,
        "end": end,
        "tag": tag,
        "author": "Ada",
        "created_at": "2025-02-03T14:22:00Z",
    }))
    .unwrap()
}

fn exporter() -> Exporter {
    Exporter::new(ExportConfig::default(), tags())
}

/// Every `\annot` must sit outside any `\section{...}` or `\caption{...}`
/// argument and outside tables.
fn assert_no_note_in_restricted(latex: &str) {
    for opener in ["\\section{", "\\caption{"] {
        for (start, _) in latex.match_indices(opener) {
            let body = &latex[start + opener.len()..];
            let mut depth = 1;
            let end = body
                .char_indices()
                .find_map(|(i, c)| {
                    match c {
                        '{' => depth += 1,
                        '}' => depth -= 1,
                        _ => {}
                    }
                    (depth == 0).then_some(i)
                })
                .expect("argument closes");
            assert!(!body[..end].contains("\\annot"), "note inside {opener}: {latex}");
        }
    }
    for (start, _) in latex.match_indices("\\begin{longtable}") {
        let end = latex[start..].find("\\end{longtable}").expect("table closes");
        assert!(!latex[start..start + end].contains("\\annot"), "note inside table: {latex}");
    }
}

#[tokio::test]
async fn test_crossing_overlap_regions() {
    let doc = "<p>The quick brown fox jumps</p>";
    let spans = [span("a", 4, 16, "issue"), span("b", 10, 20, "ratio")];
    let exporter = exporter();

    let injected = exporter.inject(doc, &spans);
    let converted = fake_pandoc(&injected.markup).unwrap();
    let tokens = tokenize(&converted).unwrap();
    let regions: Vec<_> = build_regions(&tokens)
        .into_iter()
        .filter(|r| !r.is_empty())
        .map(|r| (r.text, r.active.into_iter().collect::<Vec<_>>()))
        .collect();

    assert_eq!(
        regions,
        vec![
            ("The ", vec![]),
            ("quick ", vec![0]),
            ("brown ", vec![0, 1]),
            ("fox ", vec![1]),
            ("jumps\n\n", vec![]),
        ]
    );

    let output = exporter.export(doc, &spans, &FnConverter(fake_pandoc)).await.unwrap();
    assert!(output.latex.contains(
        r"\highLight[tag-issue-light]{\highLight[tag-ratio-light]{\underLine[color=tag-issue-dark, height=2pt, bottom=-3pt]{\underLine[color=tag-ratio-dark, height=1pt, bottom=-5pt]{brown }}}}"
    ));
    assert!(output.latex.contains(
        r"\highLight[tag-ratio-light]{\underLine[color=tag-ratio-dark, height=1pt, bottom=-3pt]{fox }}"
    ));
    assert!(output.skipped.is_empty());
}

#[tokio::test]
async fn test_overlap_completeness() {
    // Nested, crossing and identical pairs over one paragraph.
    let doc = "<p>alpha beta gamma delta epsilon</p>";
    let spans = [
        span("outer", 0, 30, "facts"),
        span("inner", 6, 10, "issue"),
        span("cross", 8, 22, "ratio"),
        span("same", 8, 22, "issue"),
    ];
    let injected = exporter().inject(doc, &spans);
    let converted = fake_pandoc(&injected.markup).unwrap();
    let tokens = tokenize(&converted).unwrap();
    let regions = build_regions(&tokens);

    // Walk regions, tracking the visible offset of each run.
    let mut offset = 0;
    for region in &regions {
        let len = region.text.trim_end_matches('\n').chars().count();
        for (i, a) in injected.spans.iter().enumerate() {
            for b in &injected.spans[i + 1..] {
                let (lo, hi) = (a.start.max(b.start), a.end.min(b.end));
                if len > 0 && offset >= lo && offset + len <= hi {
                    assert!(region.active.contains(&a.index), "{region:?}");
                    assert!(region.active.contains(&b.index), "{region:?}");
                }
            }
        }
        offset += len;
    }
    assert_eq!(offset, 30);
}

#[tokio::test]
async fn test_three_way_overlap_collapses() {
    let doc = "<p>The quick brown fox jumps</p>";
    let spans = [
        span("a", 4, 16, "issue"),
        span("b", 10, 20, "ratio"),
        span("c", 10, 15, "facts"),
    ];
    let output = exporter().export(doc, &spans, &FnConverter(fake_pandoc)).await.unwrap();

    assert!(output.latex.contains(
        r"\highLight[many-light]{\underLine[color=many-dark, height=4pt, bottom=-5pt]{brown}}"
    ));
    assert_eq!(output.latex.matches(r"\highLight[many-light]").count(), 1);
    assert!(!output.latex.contains(r"\highLight[tag-issue-light]{\highLight[tag-ratio-light]{\highLight"));
}

#[tokio::test]
async fn test_invalid_span_is_skipped() {
    let doc = "<p>0123456789</p>";
    let spans = [span("stale", 1000, 1005, "issue")];
    let output = exporter().export(doc, &spans, &FnConverter(fake_pandoc)).await.unwrap();

    assert_eq!(output.skipped.len(), 1);
    assert_eq!(output.skipped[0].id, "stale");
    assert_eq!(output.skipped[0].reason, SkipReason::OutOfBounds { text_len: 10 });
    assert!(!output.latex.contains(r"\highLight["));
    assert!(!output.latex.contains(r"\annot{"));
    assert!(output.latex.contains("0123456789"));
}

#[tokio::test]
async fn test_note_moves_out_of_heading() {
    let doc = "<h2>Facts</h2><p>The claimant sued.</p>";
    let spans = [span("h", 0, 5, "facts"), span("p", 9, 17, "issue")];
    let output = exporter().export(doc, &spans, &FnConverter(fake_pandoc)).await.unwrap();

    let heading = concat!(
        r"\section{\highLight[tag-facts-light]{\underLine[color=tag-facts-dark, height=1pt, bottom=-3pt]{Facts}}}",
        r"\annot{tag-facts}{\textbf{Facts}\par{\scriptsize Ada, 03 Feb 2025 14:22}}",
        r"\label{s}",
    );
    assert!(output.latex.contains(heading), "{}", output.latex);
    // The paragraph note stays at its anchor.
    assert!(output.latex.contains(r"The \annot{tag-issue}"));
    assert_no_note_in_restricted(&output.latex);
}

/// Headings with inline formatting come back with a flattened PDF-string
/// copy of their text, sentinels included.
fn pandoc_with_pdf_strings(html: &str) -> Result<String, ConverterError> {
    let (heading, rest) = html.split_once("</h2>").unwrap();
    let inner = heading.trim_start_matches("<h2>");
    let latex = inner.replace("<em>", "\\emph{").replace("</em>", "}");
    let plain = inner.replace("<em>", "").replace("</em>", "");
    Ok(format!(
        "\\section{{\\texorpdfstring{{{latex}}}{{{plain}}}}}\\label{{s}}\n\n{}",
        fake_pandoc(rest)?
    ))
}

#[tokio::test]
async fn test_highlight_in_formatted_heading() {
    let doc = "<h2>R v <em>Smith</em></h2><p>Held.</p>";
    let spans = [span("case", 4, 9, "issue")];
    let output = exporter()
        .export(doc, &spans, &FnConverter(pandoc_with_pdf_strings))
        .await
        .unwrap();

    let heading = concat!(
        r"\section{\texorpdfstring{R v \emph{",
        r"\highLight[tag-issue-light]{\underLine[color=tag-issue-dark, height=1pt, bottom=-3pt]{Smith}}",
        r"}}{R v Smith}}\annot{tag-issue}",
    );
    assert!(output.latex.contains(heading), "{}", output.latex);
    assert!(output.latex.contains(r"}\label{s}"));
    assert_no_note_in_restricted(&output.latex);
}

#[tokio::test]
async fn test_note_moves_out_of_table() {
    let doc = "<table><tr><td>Plaintiff</td><td>Smith &amp; Co</td></tr></table><p>After.</p>";
    let spans = [span("cell", 9, 14, "ratio")];
    let output = exporter().export(doc, &spans, &FnConverter(fake_pandoc)).await.unwrap();

    assert!(output.latex.contains(r"{Smith}}"));
    assert!(output.latex.contains("\\end{longtable}\\annot{tag-ratio}"));
    assert_no_note_in_restricted(&output.latex);
}

#[tokio::test]
async fn test_highlight_across_blocks_keeps_braces_balanced() {
    let doc = "<p>one <em>two</em></p><h2>Head</h2><p>three</p>";
    // "two" through "Head" into "thr".
    let spans = [span("x", 4, 14, "facts")];
    let output = exporter().export(doc, &spans, &FnConverter(fake_pandoc)).await.unwrap();

    let opens = output.latex.matches('{').count() - output.latex.matches("\\{").count();
    let closes = output.latex.matches('}').count() - output.latex.matches("\\}").count();
    assert_eq!(opens, closes);
    // The note renders where the highlight starts, inside the emphasis.
    assert!(output.latex.contains(r"\emph{\annot{tag-facts}"));
    assert!(output.latex.contains(r"\section{\highLight[tag-facts-light]"));
    assert_no_note_in_restricted(&output.latex);
}

#[tokio::test]
async fn test_regions_reproduce_converted_text() {
    let docs = [
        "<p>The quick brown fox jumps</p>",
        "<h2>Facts</h2><p>The claimant sued.</p>",
        "<p>one <em>two</em></p><h2>Head</h2><p>three</p>",
    ];
    let spans = [
        span("a", 0, 4, "facts"),
        span("b", 2, 9, "issue"),
        span("c", 3, 12, "ratio"),
    ];
    for doc in docs {
        let injected = exporter().inject(doc, &spans);
        let converted = fake_pandoc(&injected.markup).unwrap();
        let tokens = tokenize(&converted).unwrap();
        let rebuilt: String = build_regions(&tokens).iter().map(|r| r.text).collect();
        assert_eq!(rebuilt, strip_markers(&converted));
    }
}

#[tokio::test]
async fn test_lost_marker_fails_export() {
    let doc = "<p>The quick brown fox</p>";
    let spans = [span("a", 4, 9, "issue")];

    let drops_anchor = FnConverter(|html: &str| {
        fake_pandoc(&html.replace("ANNMARKER0ENDMARKER", ""))
    });
    let err = exporter().export(doc, &spans, &drops_anchor).await.unwrap_err();
    assert!(matches!(
        err,
        ExportError::Tokenize(TokenizeError::MissingMarker { index: 0, .. })
    ));

    let drops_end = FnConverter(|html: &str| fake_pandoc(&html.replace("HLEND0ENDHL", "")));
    let err = exporter().export(doc, &spans, &drops_end).await.unwrap_err();
    assert!(matches!(
        err,
        ExportError::Tokenize(TokenizeError::UnmatchedStart { index: 0, .. })
    ));
}

#[tokio::test]
async fn test_converter_failure_fails_export() {
    let failing = FnConverter(|_: &str| {
        Err::<String, _>(ConverterError::Failed {
            program: "pandoc".to_owned(),
            status: "exit status: 64".to_owned(),
            stderr: "unknown reader".to_owned(),
        })
    });
    let err = exporter()
        .export("<p>x</p>", &[], &failing)
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::Converter(ConverterError::Failed { .. })));
}

#[tokio::test]
async fn test_standalone_document() {
    let doc = "<p>The quick brown fox</p>";
    let spans = [span("a", 4, 9, "issue")];
    let output = exporter()
        .standalone(true)
        .export(doc, &spans, &FnConverter(fake_pandoc))
        .await
        .unwrap();

    assert!(output.latex.starts_with("\\documentclass"));
    assert!(output.latex.contains("\\newcommand{\\annot}[2]"));
    assert!(output.latex.contains("\\definecolor{tag-issue-dark}{HTML}{FF7F0E}"));
    assert!(output.latex.contains("\\begin{document}"));
    assert!(output.latex.trim_end().ends_with("\\end{document}"));
}

#[tokio::test]
async fn test_export_is_deterministic() {
    let doc = "<p>The quick brown fox jumps</p>";
    let spans = [span("a", 4, 16, "issue"), span("b", 10, 20, "ratio")];
    let first = exporter().export(doc, &spans, &FnConverter(fake_pandoc)).await.unwrap();
    let second = exporter().export(doc, &spans, &FnConverter(fake_pandoc)).await.unwrap();
    assert_eq!(first, second);
}
