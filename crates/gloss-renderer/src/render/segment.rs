//! Splitting literal region text into wrappable runs and structure.
//!
//! A region can start or stop anywhere in the converter's output, including
//! in the middle of `\section{...}` or a table row. Wrapping the whole run
//! would put an unmatched brace inside a wrapper argument, so only plain text
//! is wrapped and every structural piece passes through untouched.

use crate::latex::{
    BracketScan, begin_extra_args, bracket_end, close_group, command_at, comment_end,
    is_definition, is_text_symbol, raw_argument_count, scan_bracket, skip_ws, verb_end,
    verbatim_begin, verbatim_end,
};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    /// Plain text that may go inside highlight wrappers.
    Wrap(&'a str),
    /// Plain text inside an optional argument that the region does not
    /// close. Wrappers around it need braces so their own `]` is hidden.
    Protected(&'a str),
    /// Markup that must be emitted as-is.
    Pass(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MathDelim {
    Dollar,
    DoubleDollar,
    Paren,
    Bracket,
}

impl MathDelim {
    fn open_len(self) -> usize {
        match self {
            MathDelim::Dollar => 1,
            MathDelim::DoubleDollar | MathDelim::Paren | MathDelim::Bracket => 2,
        }
    }
}

/// What the previous region left open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Text,
    Math(MathDelim),
    Verbatim(&'static str),
    /// Inside a raw argument (label, URL...) this many groups deep.
    Raw(usize),
}

/// Splits the literal text of consecutive regions of one stream.
///
/// Math, verbatim, raw arguments and optional arguments can span a region
/// boundary, so the segmenter must see every region in order, including
/// those with nothing to wrap.
#[derive(Debug, Default)]
pub(crate) struct Segmenter {
    mode: Mode,
    /// Brace depth inside each optional argument still open, innermost last.
    brackets: Vec<usize>,
}

impl Segmenter {
    pub(crate) fn split<'a>(&mut self, text: &'a str) -> Vec<Segment<'a>> {
        let mut buf = SegmentBuf {
            protect: !self.brackets.is_empty(),
            ..SegmentBuf::default()
        };
        let bytes = text.as_bytes();
        let mut i = self.resume(text, &mut buf);

        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i = self.control(text, i, &mut buf),
                b'{' => {
                    if let Some(depth) = self.brackets.last_mut() {
                        *depth += 1;
                    }
                    buf.pass(i..i + 1);
                    i += 1;
                }
                b'}' => {
                    if let Some(depth) = self.brackets.last_mut() {
                        *depth = depth.saturating_sub(1);
                    }
                    buf.pass(i..i + 1);
                    i += 1;
                }
                b']' => {
                    buf.pass(i..i + 1);
                    if self.brackets.last() == Some(&0) {
                        self.brackets.pop();
                        buf.protect = !self.brackets.is_empty();
                    }
                    i += 1;
                }
                b'&' | b'[' => {
                    buf.pass(i..i + 1);
                    i += 1;
                }
                b'%' => {
                    let end = comment_end(text, i);
                    buf.pass(i..end);
                    i = end;
                }
                b'$' => {
                    let delim = if bytes.get(i + 1) == Some(&b'$') {
                        MathDelim::DoubleDollar
                    } else {
                        MathDelim::Dollar
                    };
                    i = self.enter_math(text, i, delim, &mut buf);
                }
                b' ' | b'\t' | b'\r' | b'\n' => {
                    let run = text[i..]
                        .bytes()
                        .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
                        .count();
                    let end = i + run;
                    // Paragraph break.
                    if text[i..end].matches('\n').count() >= 2 {
                        buf.pass(i..end);
                    }
                    i = end;
                }
                // Every byte we split on is ASCII, so stepping one byte
                // never leaves a slice boundary inside a character.
                _ => i += 1,
            }
        }

        buf.finish(text)
    }

    /// Consume whatever the previous region left open.
    fn resume(&mut self, text: &str, buf: &mut SegmentBuf) -> usize {
        let (closed, carry) = match std::mem::take(&mut self.mode) {
            Mode::Text => return 0,
            Mode::Math(delim) => (math_close(text, 0, delim), Mode::Math(delim)),
            Mode::Verbatim(env) => (verbatim_end(text, 0, env), Mode::Verbatim(env)),
            Mode::Raw(depth) => match close_group(text, 0, depth) {
                Ok(end) => (Some(end), Mode::Text),
                Err(depth) => (None, Mode::Raw(depth)),
            },
        };
        self.pass_or_carry(text, 0, closed, carry, buf)
    }

    fn pass_or_carry(
        &mut self,
        text: &str,
        at: usize,
        closed: Option<usize>,
        carry: Mode,
        buf: &mut SegmentBuf,
    ) -> usize {
        match closed {
            Some(end) => {
                buf.pass(at..end);
                end
            }
            None => {
                buf.pass(at..text.len());
                self.mode = carry;
                text.len()
            }
        }
    }

    fn enter_math(
        &mut self,
        text: &str,
        at: usize,
        delim: MathDelim,
        buf: &mut SegmentBuf,
    ) -> usize {
        let closed = math_close(text, at + delim.open_len(), delim);
        self.pass_or_carry(text, at, closed, Mode::Math(delim), buf)
    }

    fn control(&mut self, text: &str, at: usize, buf: &mut SegmentBuf) -> usize {
        if let Some(env) = verbatim_begin(text, at) {
            let body = at + "\\begin{".len() + env.len() + 1;
            let closed = verbatim_end(text, body, env);
            return self.pass_or_carry(text, at, closed, Mode::Verbatim(env), buf);
        }

        let cmd = command_at(text, at);
        if !cmd.word {
            return match cmd.name {
                "\\" => {
                    buf.pass(at..cmd.end);
                    cmd.end
                }
                "(" => self.enter_math(text, at, MathDelim::Paren, buf),
                "[" => self.enter_math(text, at, MathDelim::Bracket, buf),
                // `\%`, `\&`, `\ ` and friends are text.
                _ => cmd.end,
            };
        }

        if is_text_symbol(cmd.name) {
            return if text[cmd.end..].starts_with("{}") {
                cmd.end + 2
            } else {
                cmd.end
            };
        }

        if cmd.name == "verb" {
            let end = verb_end(text, at);
            buf.pass(at..end);
            return end;
        }

        let mut end = cmd.end;
        if text[end..].starts_with('*') {
            end += 1;
        }
        let mut raw = raw_argument_count(cmd.name);
        if is_definition(cmd.name) {
            let j = skip_ws(text, end);
            if text[j..].starts_with('\\') {
                end = command_at(text, j).end;
            }
            end += text[end..]
                .bytes()
                .take_while(|b| *b == b'#' || b.is_ascii_digit())
                .count();
            raw = 1;
        }
        end = optional_args(text, end);

        let j = skip_ws(text, end);
        if text[j..].starts_with('[') && scan_bracket(text, j) == BracketScan::Unclosed {
            buf.pass(at..j + 1);
            self.brackets.push(0);
            buf.protect = true;
            return j + 1;
        }

        let mut k = 0;
        while k < raw {
            let j = optional_args(text, skip_ws(text, end));
            if !text[j..].starts_with('{') {
                break;
            }
            match close_group(text, j + 1, 1) {
                Ok(close) => {
                    if k == 0 && cmd.name == "begin" {
                        raw += begin_extra_args(&text[j + 1..close - 1]);
                    }
                    end = close;
                }
                Err(depth) => {
                    buf.pass(at..text.len());
                    self.mode = Mode::Raw(depth);
                    return text.len();
                }
            }
            k += 1;
        }

        buf.pass(at..end);
        end
    }
}

/// Consume any `[...]` arguments after `at`.
fn optional_args(text: &str, mut at: usize) -> usize {
    loop {
        let j = skip_ws(text, at);
        if !text[j..].starts_with('[') {
            return at;
        }
        match bracket_end(text, j) {
            Some(end) => at = end,
            None => return at,
        }
    }
}

/// Position just past the delimiter that closes math opened before `from`.
fn math_close(text: &str, from: usize, delim: MathDelim) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                let cmd = command_at(text, i);
                let closes = match delim {
                    MathDelim::Paren => cmd.name == ")",
                    MathDelim::Bracket => cmd.name == "]",
                    _ => false,
                };
                if closes && !cmd.word {
                    return Some(cmd.end);
                }
                i = cmd.end;
            }
            b'%' => i = comment_end(text, i),
            b'$' => match delim {
                MathDelim::Dollar => return Some(i + 1),
                MathDelim::DoubleDollar if bytes.get(i + 1) == Some(&b'$') => return Some(i + 2),
                _ => i += 1,
            },
            _ => i += 1,
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Wrap,
    Protected,
    Pass,
}

#[derive(Debug, Default)]
struct SegmentBuf {
    pieces: Vec<(Kind, Range<usize>)>,
    wrap_from: usize,
    /// Text is currently inside an open optional argument.
    protect: bool,
}

impl SegmentBuf {
    fn text_kind(&self) -> Kind {
        if self.protect {
            Kind::Protected
        } else {
            Kind::Wrap
        }
    }

    fn pass(&mut self, range: Range<usize>) {
        let kind = self.text_kind();
        push_merged(&mut self.pieces, kind, self.wrap_from..range.start);
        self.wrap_from = range.end;
        push_merged(&mut self.pieces, Kind::Pass, range);
    }

    fn finish(mut self, text: &str) -> Vec<Segment<'_>> {
        let kind = self.text_kind();
        push_merged(&mut self.pieces, kind, self.wrap_from..text.len());

        // Line breaks at the edges of a text run are layout, not content.
        let mut merged = Vec::with_capacity(self.pieces.len());
        for (kind, range) in self.pieces {
            if kind == Kind::Pass {
                push_merged(&mut merged, kind, range);
                continue;
            }
            let piece = &text[range.clone()];
            let body = piece.trim();
            if body.is_empty() {
                push_merged(&mut merged, edge_kind(piece, kind), range);
                continue;
            }
            let lead = piece.len() - piece.trim_start().len();
            let trail = piece.len() - piece.trim_end().len();
            let (head, tail) = (
                range.start..range.start + lead,
                range.end - trail..range.end,
            );
            let head_kind = edge_kind(&text[head.clone()], kind);
            let tail_kind = edge_kind(&text[tail.clone()], kind);
            push_merged(&mut merged, head_kind, head);
            push_merged(&mut merged, kind, range.start + lead..range.end - trail);
            push_merged(&mut merged, tail_kind, tail);
        }

        merged
            .into_iter()
            .map(|(kind, range)| match kind {
                Kind::Wrap => Segment::Wrap(&text[range]),
                Kind::Protected => Segment::Protected(&text[range]),
                Kind::Pass => Segment::Pass(&text[range]),
            })
            .collect()
    }
}

fn edge_kind(whitespace: &str, text_kind: Kind) -> Kind {
    if whitespace.contains('\n') {
        Kind::Pass
    } else {
        text_kind
    }
}

fn push_merged(pieces: &mut Vec<(Kind, Range<usize>)>, kind: Kind, range: Range<usize>) {
    if range.is_empty() {
        return;
    }
    if let Some((last_kind, last)) = pieces.last_mut() {
        if *last_kind == kind && last.end == range.start {
            last.end = range.end;
            return;
        }
    }
    pieces.push((kind, range));
}
