//! Byte-level scanning helpers for converter output.
//!
//! All positions are byte offsets into the scanned string and always sit on
//! char boundaries. None of these allocate.

/// Environments whose body is copied through without interpretation.
pub(crate) const VERBATIM_ENVS: &[&str] = &["verbatim", "Verbatim", "lstlisting"];

/// A control sequence at some position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Command<'a> {
    /// Letters of a control word, or the single character of a control
    /// symbol. Empty for a trailing lone backslash.
    pub name: &'a str,
    /// Position just past the sequence.
    pub end: usize,
    /// Control word (`\emph`) rather than control symbol (`\%`).
    pub word: bool,
}

/// Read the control sequence starting at `s[at] == '\\'`.
pub(crate) fn command_at(s: &str, at: usize) -> Command<'_> {
    let from = at + 1;
    let letters = s[from..]
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
    if letters > 0 {
        return Command {
            name: &s[from..from + letters],
            end: from + letters,
            word: true,
        };
    }
    match s[from..].chars().next() {
        Some(c) => Command {
            name: &s[from..from + c.len_utf8()],
            end: from + c.len_utf8(),
            word: false,
        },
        None => Command {
            name: "",
            end: from,
            word: false,
        },
    }
}

/// Position just past the `%` comment starting at `at`, including its newline.
pub(crate) fn comment_end(s: &str, at: usize) -> usize {
    match s[at..].find('\n') {
        Some(nl) => at + nl + 1,
        None => s.len(),
    }
}

/// Skip spaces, tabs and at most one newline, the way TeX looks for the
/// next argument.
pub(crate) fn skip_ws(s: &str, mut at: usize) -> usize {
    let bytes = s.as_bytes();
    let mut newline = false;
    while at < bytes.len() {
        match bytes[at] {
            b' ' | b'\t' | b'\r' => at += 1,
            b'\n' if !newline => {
                newline = true;
                at += 1;
            }
            _ => break,
        }
    }
    at
}

/// Scan a brace group that is already `depth` levels open at `from`.
///
/// Returns the position just past the brace that closes it, or the depth
/// still open when the text runs out. Escaped braces and comments are
/// skipped.
pub(crate) fn close_group(s: &str, from: usize, mut depth: usize) -> Result<usize, usize> {
    let bytes = s.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i = command_at(s, i).end,
            b'%' => i = comment_end(s, i),
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => i += 1,
        }
    }
    Err(depth)
}

/// Position just past the group opened at `s[open] == '{'`.
pub(crate) fn group_end(s: &str, open: usize) -> Option<usize> {
    close_group(s, open + 1, 1).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BracketScan {
    /// Closes; position just past the `]`.
    Closed(usize),
    /// The text runs out first.
    Unclosed,
    /// A `}` closes an enclosing group first, so this is no argument.
    Broken,
}

/// Scan the optional argument opened at `s[open] == '['`.
///
/// Braces inside must balance before the closing bracket.
pub(crate) fn scan_bracket(s: &str, open: usize) -> BracketScan {
    let bytes = s.as_bytes();
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i = command_at(s, i).end,
            b'%' => i = comment_end(s, i),
            b'{' => match close_group(s, i + 1, 1) {
                Ok(end) => i = end,
                Err(_) => return BracketScan::Unclosed,
            },
            b'}' => return BracketScan::Broken,
            b']' => return BracketScan::Closed(i + 1),
            _ => i += 1,
        }
    }
    BracketScan::Unclosed
}

/// Position just past the optional argument opened at `s[open] == '['`.
pub(crate) fn bracket_end(s: &str, open: usize) -> Option<usize> {
    match scan_bracket(s, open) {
        BracketScan::Closed(end) => Some(end),
        BracketScan::Unclosed | BracketScan::Broken => None,
    }
}

/// Name of the verbatim environment begun at `at`, if any.
pub(crate) fn verbatim_begin(s: &str, at: usize) -> Option<&'static str> {
    let rest = s[at..].strip_prefix("\\begin{")?;
    VERBATIM_ENVS.iter().copied().find(|env| {
        rest.strip_prefix(env)
            .is_some_and(|tail| tail.starts_with('}'))
    })
}

/// Position just past `\end{env}` searching from `from`, if the environment
/// closes in this text.
pub(crate) fn verbatim_end(s: &str, from: usize, env: &str) -> Option<usize> {
    let close = format!("\\end{{{env}}}");
    s[from..].find(&close).map(|pos| from + pos + close.len())
}

/// Position just past `\verb|...|` (or `\verb*`) starting at `at`.
pub(crate) fn verb_end(s: &str, at: usize) -> usize {
    let mut i = at + "\\verb".len();
    if s[i..].starts_with('*') {
        i += 1;
    }
    let Some(delim) = s[i..].chars().next() else {
        return s.len();
    };
    i += delim.len_utf8();
    match s[i..].char_indices().find(|&(_, c)| c == delim || c == '\n') {
        Some((pos, c)) => i + pos + c.len_utf8(),
        None => s.len(),
    }
}

/// Number of brace arguments of a command that hold names, keys, lengths
/// or URLs rather than typeset text.
pub(crate) fn raw_argument_count(name: &str) -> usize {
    match name {
        "begin" | "end" | "label" | "ref" | "pageref" | "eqref" | "autoref" | "url"
        | "nolinkurl" | "href" | "hyperlink" | "hypertarget" | "includegraphics" | "cite"
        | "citep" | "citet" | "color" | "textcolor" | "colorbox" | "hspace" | "vspace"
        | "pagecolor" | "input" | "include" => 1,
        "setlength" | "addtolength" | "setcounter" | "addtocounter" | "rule" | "fcolorbox"
        | "multicolumn" | "multirow" | "addcontentsline" | "colorlet" | "newcommand"
        | "renewcommand" | "providecommand" => 2,
        "definecolor" => 3,
        _ => 0,
    }
}

/// Brace arguments that follow `\begin{env}` and are column specs or widths.
pub(crate) fn begin_extra_args(env: &str) -> usize {
    match env {
        "tabular" | "tabular*" | "longtable" | "array" | "minipage" | "wrapfigure" => 1,
        "tabularx" => 2,
        _ => 0,
    }
}

/// Commands that take a control sequence then a body, like `\def\x{...}`.
pub(crate) fn is_definition(name: &str) -> bool {
    matches!(name, "def" | "gdef" | "edef" | "xdef" | "let")
}

/// Zero-argument commands that typeset a glyph and read like text.
pub(crate) fn is_text_symbol(name: &str) -> bool {
    matches!(
        name,
        "ldots"
            | "dots"
            | "textquotesingle"
            | "textquotedbl"
            | "textquoteleft"
            | "textquoteright"
            | "textbackslash"
            | "textasciitilde"
            | "textasciicircum"
            | "textless"
            | "textgreater"
            | "textbar"
            | "textbullet"
            | "textendash"
            | "textemdash"
            | "textdegree"
            | "textsection"
            | "textparagraph"
            | "textregistered"
            | "texttrademark"
            | "copyright"
            | "S"
            | "P"
            | "ss"
            | "ae"
            | "AE"
            | "oe"
            | "OE"
            | "o"
            | "O"
            | "i"
            | "j"
            | "l"
            | "L"
            | "pounds"
            | "euro"
            | "slash"
            | "nobreakspace"
            | "enspace"
            | "quad"
            | "qquad"
            | "LaTeX"
            | "TeX"
    )
}
