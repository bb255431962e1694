use gloss_common::{HexColor, StyleConfig};
use smol_str::{SmolStr, format_smolstr};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use crate::types::{IndexedSpan, TagColors};
use crate::utils::humanize;

/// Colour names and display name for one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagStyle {
    pub slug: SmolStr,
    pub name: String,
    pub color: HexColor,
}

impl TagStyle {
    /// Colour key passed to `\annot`.
    pub fn key(&self) -> SmolStr {
        format_smolstr!("tag-{}", self.slug)
    }

    pub fn dark(&self) -> SmolStr {
        format_smolstr!("tag-{}-dark", self.slug)
    }

    pub fn light(&self) -> SmolStr {
        format_smolstr!("tag-{}-light", self.slug)
    }
}

/// Per-tag styles for one export, covering exactly the tags in use.
#[derive(Debug, Clone)]
pub struct TagStyles {
    by_tag: BTreeMap<SmolStr, TagStyle>,
    many: HexColor,
    tint: u8,
}

impl TagStyles {
    pub fn new(tags: &TagColors, spans: &[IndexedSpan], style: &StyleConfig) -> Self {
        let used: BTreeSet<&SmolStr> = spans.iter().map(|s| &s.span.tag).collect();
        let mut taken = BTreeSet::new();
        let mut by_tag = BTreeMap::new();

        for tag in used {
            let info = tags.get(tag);
            let color = match info.and_then(|info| info.color) {
                Some(color) => color,
                None => {
                    if info.is_none() {
                        tracing::warn!(%tag, "tag missing from colour map, using default colour");
                    }
                    style.default_color
                }
            };
            let name = info
                .and_then(|info| info.name.as_deref())
                .map(str::to_owned)
                .unwrap_or_else(|| humanize(tag));
            let slug = unique_slug(tag, &mut taken);
            by_tag.insert(tag.clone(), TagStyle { slug, name, color });
        }

        Self {
            by_tag,
            many: style.many_color,
            tint: style.light_tint.min(100),
        }
    }

    pub fn get(&self, tag: &str) -> Option<&TagStyle> {
        self.by_tag.get(tag)
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }

    /// `\definecolor` lines for every tag in use plus the shared
    /// many-overlap colour, in tag order.
    pub fn definitions(&self) -> String {
        let mut out = String::new();
        for style in self.by_tag.values() {
            define(&mut out, &style.dark(), &style.light(), style.color, self.tint);
        }
        define(&mut out, "many-dark", "many-light", self.many, self.tint);
        out
    }
}

fn define(out: &mut String, dark: &str, light: &str, color: HexColor, tint: u8) {
    let _ = writeln!(out, "\\definecolor{{{dark}}}{{HTML}}{{{}}}", color.to_html());
    let _ = writeln!(out, "\\colorlet{{{light}}}{{{dark}!{tint}}}");
}

/// Lowercase ASCII letters and digits, everything else folded to `-`.
fn slugify(tag: &str) -> String {
    let mut slug = String::with_capacity(tag.len());
    for c in tag.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "tag".to_owned()
    } else {
        slug.to_owned()
    }
}

fn unique_slug(tag: &str, taken: &mut BTreeSet<SmolStr>) -> SmolStr {
    let base = slugify(tag);
    let mut slug = SmolStr::new(&base);
    let mut n = 2;
    while taken.contains(&slug) {
        slug = format_smolstr!("{base}-{n}");
        n += 1;
    }
    taken.insert(slug.clone());
    slug
}
