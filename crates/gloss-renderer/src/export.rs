//! The compile pipeline: inject, convert, tokenize, build regions, render,
//! relocate, assemble.

use gloss_common::ExportConfig;
use serde::Serialize;
use std::time::Instant;
use tracing::Instrument;

use crate::boundary::{RestrictedContexts, relocate_illegal_annotations};
use crate::converter::Converter;
use crate::error::ExportError;
use crate::inject::{InjectedDocument, inject};
use crate::marker::strip_pdf_string_markers;
use crate::regions::build_regions;
use crate::render::{RegionRenderer, TagStyles};
use crate::tokenize::{tokenize, verify_round_trip};
use crate::types::{HighlightSpan, SkippedSpan, TagColors};

/// Packages and the `\annot` macro the rendered body relies on.
///
/// Needs LuaLaTeX for `lua-ul`.
pub fn preamble() -> &'static str {
    r"\usepackage{xcolor}
\usepackage{luacolor}
\usepackage[soul]{lua-ul}
\newcommand{\annot}[2]{\marginpar{\raggedright\scriptsize{\color{#1-dark}\rule{\linewidth}{1pt}}\par #2}}
"
}

const STANDALONE_HEAD: &str = r"\documentclass[11pt]{article}
\usepackage[a4paper, left=2.5cm, right=6cm, marginparwidth=4.5cm, marginparsep=0.5cm]{geometry}
\usepackage{longtable}
\usepackage{booktabs}
\usepackage{array}
\usepackage{calc}
\usepackage{graphicx}
\usepackage{hyperref}
\providecommand{\tightlist}{\setlength{\itemsep}{0pt}\setlength{\parskip}{0pt}}
\providecommand{\pandocbounded}[1]{#1}
";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportOutput {
    pub latex: String,
    /// Highlights dropped because their offsets did not fit the document.
    pub skipped: Vec<SkippedSpan>,
    pub region_count: usize,
}

/// One export configuration, reusable across documents.
#[derive(Debug, Clone)]
pub struct Exporter {
    config: ExportConfig,
    tags: TagColors,
    contexts: RestrictedContexts,
    standalone: bool,
}

impl Exporter {
    pub fn new(config: ExportConfig, tags: TagColors) -> Self {
        let contexts = RestrictedContexts::from_config(&config.restricted);
        Self {
            config,
            tags,
            contexts,
            standalone: false,
        }
    }

    /// Wrap the output in a complete document instead of emitting a body
    /// fragment.
    pub fn standalone(mut self, standalone: bool) -> Self {
        self.standalone = standalone;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn inject(&self, markup: &str, spans: &[HighlightSpan]) -> InjectedDocument {
        inject(markup, spans, self.config.text.whitespace)
    }

    /// Run the whole pipeline for one document.
    ///
    /// Any converter failure, lost sentinel or unbalanced output fails the
    /// export as a whole.
    pub async fn export<C: Converter>(
        &self,
        markup: &str,
        spans: &[HighlightSpan],
        converter: &C,
    ) -> Result<ExportOutput, ExportError> {
        let span = tracing::info_span!("export", highlights = spans.len(), markup_bytes = markup.len());
        async move {
            let injected = self.inject(markup, spans);
            let converted = converter.convert(&injected.markup).await?;
            self.compile_converted(&converted, &injected)
        }
        .instrument(span)
        .await
    }

    /// The part of the pipeline after the converter, for callers that run
    /// the converter themselves.
    pub fn compile_converted(
        &self,
        converted: &str,
        injected: &InjectedDocument,
    ) -> Result<ExportOutput, ExportError> {
        let started = Instant::now();

        let converted = strip_pdf_string_markers(converted);
        let tokens = tokenize(&converted)?;
        verify_round_trip(&tokens, injected.spans.len())?;
        let regions = build_regions(&tokens);
        tracing::debug!(regions = regions.len(), "built regions");

        let styles = TagStyles::new(&self.tags, &injected.spans, &self.config.style);
        let body = RegionRenderer::new(&injected.spans, &styles).render_all(&regions);
        let body = relocate_illegal_annotations(&body, &self.contexts)?;

        let latex = self.assemble(&styles, &body);
        tracing::info!(
            highlights = injected.spans.len(),
            skipped = injected.skipped.len(),
            regions = regions.len(),
            output_bytes = latex.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "export compiled"
        );

        Ok(ExportOutput {
            latex,
            skipped: injected.skipped.clone(),
            region_count: regions.len(),
        })
    }

    fn assemble(&self, styles: &TagStyles, body: &str) -> String {
        let definitions = styles.definitions();
        if !self.standalone {
            return format!("{definitions}\n{body}");
        }
        let mut out = String::with_capacity(body.len() + 2048);
        out.push_str(STANDALONE_HEAD);
        out.push_str(preamble());
        out.push_str(&definitions);
        out.push_str("\n\\begin{document}\n\n");
        out.push_str(body);
        if !body.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("\n\\end{document}\n");
        out
    }
}
