//! Interval overlap over the token stream.
//!
//! `active` is a set, not a stack: a region boundary is any change to the
//! set, so crossing highlights (A starts, B starts, A ends, B ends) need no
//! nesting discipline at all.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::tokenize::MarkerToken;

/// A maximal run of literal text with a constant set of open highlights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region<'a> {
    pub text: &'a str,
    /// Highlight indices open over this run, ascending.
    pub active: BTreeSet<usize>,
    /// Annotation anchors that fall at the start of this run.
    pub annots: Vec<usize>,
}

impl Region<'_> {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

pub fn build_regions<'a>(tokens: &[MarkerToken<'a>]) -> Vec<Region<'a>> {
    let mut regions = Vec::new();
    let mut active = BTreeSet::new();
    let mut pending_annots = Vec::new();

    for token in tokens {
        match *token {
            MarkerToken::Text(text) => regions.push(Region {
                text,
                active: active.clone(),
                annots: std::mem::take(&mut pending_annots),
            }),
            MarkerToken::Start(i) => {
                active.insert(i);
            }
            MarkerToken::End(i) => {
                active.remove(&i);
            }
            MarkerToken::Anchor(i) => pending_annots.push(i),
        }
    }

    // Anchors after the last literal still need somewhere to render.
    if !pending_annots.is_empty() {
        regions.push(Region {
            text: "",
            active,
            annots: pending_annots,
        });
    }

    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::strip_markers;
    use crate::tokenize::tokenize;

    fn set(indices: &[usize]) -> BTreeSet<usize> {
        indices.iter().copied().collect()
    }

    fn summary<'a>(regions: &[Region<'a>]) -> Vec<(&'a str, Vec<usize>)> {
        regions
            .iter()
            .filter(|r| !r.is_empty())
            .map(|r| (r.text, r.active.iter().copied().collect()))
            .collect()
    }

    #[test]
    fn test_crossing_overlap() {
        // A covers "quick brown ", B covers "brown fox ".
        let stream = "The ANNMARKER0ENDMARKERHLSTART0ENDHLquick \
                      ANNMARKER1ENDMARKERHLSTART1ENDHLbrown HLEND0ENDHLfox HLEND1ENDHLjumps";
        let tokens = tokenize(stream).unwrap();
        let regions = build_regions(&tokens);

        assert_eq!(
            summary(&regions),
            vec![
                ("The ", vec![]),
                ("quick ", vec![0]),
                ("brown ", vec![0, 1]),
                ("fox ", vec![1]),
                ("jumps", vec![]),
            ]
        );
    }

    #[test]
    fn test_set_order_does_not_depend_on_start_order() {
        let a = tokenize("HLSTART1ENDHLHLSTART0ENDHLxHLEND0ENDHLHLEND1ENDHL").unwrap();
        let b = tokenize("HLSTART0ENDHLHLSTART1ENDHLxHLEND1ENDHLHLEND0ENDHL").unwrap();
        let ra: Vec<_> = build_regions(&a).into_iter().filter(|r| !r.is_empty()).collect();
        let rb: Vec<_> = build_regions(&b).into_iter().filter(|r| !r.is_empty()).collect();
        assert_eq!(ra, rb);
        assert_eq!(ra[0].active, set(&[0, 1]));
    }

    #[test]
    fn test_zero_length_regions_carry_transitions() {
        let tokens = tokenize("aANNMARKER0ENDMARKERHLSTART0ENDHLbHLEND0ENDHL").unwrap();
        let regions = build_regions(&tokens);
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[1].text, "");
        assert!(regions[1].active.is_empty());
        assert_eq!(regions[1].annots, vec![0]);
        assert_eq!(regions[2].text, "b");
        assert_eq!(regions[2].annots, Vec::<usize>::new());
    }

    #[test]
    fn test_anchor_lands_on_following_region() {
        let tokens = tokenize("xHLSTART0ENDHLANNMARKER0ENDMARKERyHLEND0ENDHL").unwrap();
        let regions = build_regions(&tokens);
        let anchored: Vec<_> = regions.iter().filter(|r| !r.annots.is_empty()).collect();
        assert_eq!(anchored.len(), 1);
        assert_eq!(anchored[0].text, "y");
        assert_eq!(anchored[0].annots, vec![0]);
    }

    #[test]
    fn test_trailing_anchor_gets_empty_region() {
        let tokens = tokenize("textANNMARKER0ENDMARKER").unwrap();
        let regions = build_regions(&tokens);
        assert_eq!(regions.last().unwrap().text, "");
        assert_eq!(regions.last().unwrap().annots, vec![0]);
    }

    #[test]
    fn test_regions_reconstruct_literal_stream() {
        let stream = "\\section{ANNMARKER0ENDMARKERHLSTART0ENDHLHead}\n\n\
                      HLSTART1ENDHLBody HLEND0ENDHLtext HLSTART2ENDHLmoreHLEND2ENDHLHLEND1ENDHL.";
        let tokens = tokenize(stream).unwrap();
        let rebuilt: String = build_regions(&tokens).iter().map(|r| r.text).collect();
        assert_eq!(rebuilt, strip_markers(stream));
    }

    #[test]
    fn test_three_way_overlap_region() {
        let stream = "HLSTART0ENDHLa HLSTART1ENDHLb HLSTART2ENDHLcHLEND2ENDHLHLEND1ENDHLHLEND0ENDHL";
        let tokens = tokenize(stream).unwrap();
        let regions = build_regions(&tokens);
        let c = regions.iter().find(|r| r.text == "c").unwrap();
        assert_eq!(c.active, set(&[0, 1, 2]));
    }
}
