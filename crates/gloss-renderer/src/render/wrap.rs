//! Highlight and underline wrappers, chosen by how many highlights overlap.

use super::styles::TagStyle;

/// The wrapper shape for one active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layers<'s> {
    One(&'s TagStyle),
    /// Outer (lower index) first.
    Two(&'s TagStyle, &'s TagStyle),
    /// Three or more: one shared neutral style.
    Many,
}

pub(crate) fn write_wrapped(out: &mut String, text: &str, layers: Layers<'_>) {
    match layers {
        Layers::One(style) => {
            out.push_str(&format!(
                "\\highLight[{}]{{\\underLine[color={}, height=1pt, bottom=-3pt]{{{text}}}}}",
                style.light(),
                style.dark(),
            ));
        }
        Layers::Two(outer, inner) => {
            out.push_str(&format!(
                "\\highLight[{}]{{\\highLight[{}]{{\
                 \\underLine[color={}, height=2pt, bottom=-3pt]{{\
                 \\underLine[color={}, height=1pt, bottom=-5pt]{{{text}}}}}}}}}",
                outer.light(),
                inner.light(),
                outer.dark(),
                inner.dark(),
            ));
        }
        Layers::Many => {
            out.push_str(&format!(
                "\\highLight[many-light]{{\\underLine[color=many-dark, height=4pt, bottom=-5pt]{{{text}}}}}"
            ));
        }
    }
}
