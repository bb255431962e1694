//! Gloss renderer
//!
//! Compiles overlapping, possibly crossing highlights over an HTML document
//! into LaTeX with nested highlight wrappers and margin notes. Highlights
//! travel through an opaque HTML-to-LaTeX converter as inert sentinel words
//! and are recovered from its output afterwards.
//!

pub mod boundary;
pub mod converter;
pub mod error;
pub mod export;
pub mod inject;
mod latex;
pub mod marker;
pub mod regions;
pub mod render;
pub mod tokenize;
pub mod types;
pub mod utils;

pub use boundary::{ContextKind, RestrictedContexts, relocate_illegal_annotations};
pub use converter::{Converter, FnConverter, PandocConverter};
pub use error::{BoundaryError, ConverterError, ExportError, TokenizeError};
pub use export::{ExportOutput, Exporter, preamble};
pub use inject::{InjectedDocument, VisibleText, VisibleUnit, inject, visible_text};
pub use marker::strip_pdf_string_markers;
pub use regions::{Region, build_regions};
pub use render::{RegionRenderer, TagStyle, TagStyles};
pub use tokenize::{MarkerToken, tokenize, verify_round_trip};
pub use types::{
    Comment, HighlightSpan, IndexedSpan, SkipReason, SkippedSpan, TagColors, TagInfo,
};
