//! Region renderer: highlight wrappers and margin notes.

mod annotation;
mod segment;
mod styles;
mod wrap;

pub use styles::{TagStyle, TagStyles};

use std::collections::BTreeSet;

use crate::regions::Region;
use crate::types::IndexedSpan;
use annotation::write_annotation;
use segment::{Segment, Segmenter};
use wrap::{Layers, write_wrapped};

/// Renders the regions of one stream, in order.
///
/// Holds splitter state between regions, so one renderer serves exactly one
/// stream.
#[derive(Debug)]
pub struct RegionRenderer<'s> {
    spans: &'s [IndexedSpan],
    styles: &'s TagStyles,
    segmenter: Segmenter,
}

impl<'s> RegionRenderer<'s> {
    pub fn new(spans: &'s [IndexedSpan], styles: &'s TagStyles) -> Self {
        Self {
            spans,
            styles,
            segmenter: Segmenter::default(),
        }
    }

    /// Render one region: its margin notes, then its text with structure
    /// passed through and plain runs wrapped.
    pub fn render(&mut self, region: &Region<'_>) -> String {
        let mut out = String::with_capacity(region.text.len() * 2);

        for &index in &region.annots {
            match self.span_style(index) {
                Some((span, style)) => write_annotation(&mut out, &span.span, style),
                None => tracing::warn!(index, "annotation anchor for unknown highlight"),
            }
        }

        let layers = self.layers(&region.active);
        for segment in self.segmenter.split(region.text) {
            match (segment, layers) {
                (Segment::Wrap(text), Some(layers)) => write_wrapped(&mut out, text, layers),
                (Segment::Protected(text), Some(layers)) => {
                    out.push('{');
                    write_wrapped(&mut out, text, layers);
                    out.push('}');
                }
                (Segment::Wrap(text) | Segment::Protected(text) | Segment::Pass(text), _) => {
                    out.push_str(text)
                }
            }
        }
        out
    }

    pub fn render_all(mut self, regions: &[Region<'_>]) -> String {
        regions.iter().map(|region| self.render(region)).collect()
    }

    fn span_style(&self, index: usize) -> Option<(&'s IndexedSpan, &'s TagStyle)> {
        let span = self.spans.get(index)?;
        let style = self.styles.get(&span.span.tag)?;
        Some((span, style))
    }

    /// Lowest index outermost.
    fn layers(&self, active: &BTreeSet<usize>) -> Option<Layers<'s>> {
        if active.len() >= 3 {
            return Some(Layers::Many);
        }
        let mut styles = active
            .iter()
            .filter_map(|&index| self.span_style(index).map(|(_, style)| style));
        match (styles.next(), styles.next()) {
            (Some(outer), Some(inner)) => Some(Layers::Two(outer, inner)),
            (Some(only), None) => Some(Layers::One(only)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests;
