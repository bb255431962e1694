use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::marker::MarkerKind;

/// Top-level error for one export.
#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Tokenize(#[from] TokenizeError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Boundary(#[from] BoundaryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Converter(#[from] ConverterError),
}

/// The converter lost, duplicated or reordered a sentinel.
#[derive(Debug, Error, Diagnostic)]
pub enum TokenizeError {
    #[error("highlight {index} starts at byte {offset} but never ends")]
    #[diagnostic(code(gloss::tokenize::unmatched_start))]
    UnmatchedStart { index: usize, offset: usize },

    #[error("highlight {index} ends at byte {offset} but never starts")]
    #[diagnostic(code(gloss::tokenize::unmatched_end))]
    UnmatchedEnd { index: usize, offset: usize },

    #[error("highlight {index} ends at byte {end} before it starts at byte {start}")]
    #[diagnostic(code(gloss::tokenize::end_before_start))]
    EndBeforeStart {
        index: usize,
        start: usize,
        end: usize,
    },

    #[error("{kind} marker for highlight {index} appears more than once (again at byte {offset})")]
    #[diagnostic(code(gloss::tokenize::duplicate))]
    Duplicate {
        kind: MarkerKind,
        index: usize,
        offset: usize,
    },

    #[error("{kind} marker for highlight {index} is missing from the converted output")]
    #[diagnostic(
        code(gloss::tokenize::missing),
        help("the converter dropped a sentinel; check its options for text that gets discarded")
    )]
    MissingMarker { kind: MarkerKind, index: usize },

    #[error("marker at byte {offset} refers to unknown highlight {index}")]
    #[diagnostic(code(gloss::tokenize::unknown_index))]
    UnknownIndex { index: usize, offset: usize },
}

/// The rendered stream is not structurally balanced.
#[derive(Debug, Error, Diagnostic)]
pub enum BoundaryError {
    #[error("closing brace at byte {offset} has no matching open group")]
    #[diagnostic(code(gloss::boundary::unbalanced_close))]
    UnbalancedClose {
        offset: usize,
        #[source_code]
        src: NamedSource<String>,
        #[label("unmatched")]
        span: SourceSpan,
    },

    #[error("{depth} group(s) still open at end of output")]
    #[diagnostic(code(gloss::boundary::unclosed))]
    UnclosedGroup {
        depth: usize,
        #[source_code]
        src: NamedSource<String>,
        #[label("innermost open group starts here")]
        span: SourceSpan,
    },

    #[error("margin note at byte {offset} has unbalanced arguments")]
    #[diagnostic(code(gloss::boundary::malformed_note))]
    MalformedNote {
        offset: usize,
        #[source_code]
        src: NamedSource<String>,
        #[label("note starts here")]
        span: SourceSpan,
    },
}

impl BoundaryError {
    pub(crate) fn unbalanced_close(stream: &str, offset: usize) -> Self {
        Self::UnbalancedClose {
            offset,
            src: named(stream),
            span: (offset, 1).into(),
        }
    }

    pub(crate) fn unclosed(stream: &str, depth: usize, offset: usize) -> Self {
        Self::UnclosedGroup {
            depth,
            src: named(stream),
            span: (offset, 1).into(),
        }
    }

    pub(crate) fn malformed_note(stream: &str, offset: usize) -> Self {
        Self::MalformedNote {
            offset,
            src: named(stream),
            span: (offset, "\\annot".len()).into(),
        }
    }
}

fn named(stream: &str) -> NamedSource<String> {
    NamedSource::new("rendered.tex", stream.to_owned())
}

/// The external converter could not produce output.
#[derive(Debug, Error, Diagnostic)]
pub enum ConverterError {
    #[error("failed to start converter {program}")]
    #[diagnostic(code(gloss::converter::spawn), help("is {program} installed and on PATH?"))]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("converter {program} exited with {status}: {stderr}")]
    #[diagnostic(code(gloss::converter::failed))]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("converter {program} did not finish within {timeout:?}")]
    #[diagnostic(code(gloss::converter::timeout))]
    Timeout {
        program: String,
        timeout: std::time::Duration,
    },

    #[error("converter {program} produced output that is not UTF-8")]
    #[diagnostic(code(gloss::converter::encoding))]
    NonUtf8 {
        program: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("io error talking to converter {program}")]
    #[diagnostic(code(gloss::converter::io))]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("conversion failed: {0}")]
    #[diagnostic(code(gloss::converter::other))]
    Other(String),
}
