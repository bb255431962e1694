//! Moving margin notes out of contexts that cannot hold them.
//!
//! A margin note expands to a paragraph break and a float, which LaTeX
//! forbids inside moving arguments (headings, captions) and inside boxes
//! (table cells, minipages, item labels). The renderer places notes where
//! their anchor is, so this pass repairs the stream afterwards: every note
//! inside a restricted context is moved to just after the outermost
//! restricted context closes.
//!
//! Brace and bracket groups are tracked over the whole stream. A group's
//! opener is the control word whose argument it is; bare groups have none.

use gloss_common::RestrictedConfig;
use smol_str::SmolStr;
use std::collections::BTreeSet;

use crate::error::BoundaryError;
use crate::latex::{
    bracket_end, command_at, comment_end, group_end, skip_ws, verb_end, verbatim_begin,
    verbatim_end,
};

const RESTRICTED_COMMANDS: &[&str] = &[
    "part",
    "chapter",
    "section",
    "subsection",
    "subsubsection",
    "paragraph",
    "subparagraph",
    "caption",
    "texorpdfstring",
    "footnote",
    "item",
];

const RESTRICTED_ENVIRONMENTS: &[&str] = &[
    "tabular",
    "tabular*",
    "tabularx",
    "longtable",
    "array",
    "minipage",
];

/// Commands whose argument is ordinary running text.
const SAFE_COMMANDS: &[&str] = &[
    "highLight",
    "underLine",
    "emph",
    "textbf",
    "textit",
    "texttt",
    "textsc",
    "textsf",
    "textsl",
    "textrm",
    "textnormal",
    "underline",
    "sout",
    "st",
    "href",
    "url",
    "hyperlink",
    "hypertarget",
    "label",
    "mbox",
    "textsuperscript",
    "textsubscript",
    "enquote",
    "annot",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Restricted,
    Safe,
    /// In neither table. Notes are left in place but logged.
    Unknown,
}

/// The table of restricted and known-safe contexts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestrictedContexts {
    commands: BTreeSet<SmolStr>,
    environments: BTreeSet<SmolStr>,
    safe: BTreeSet<SmolStr>,
}

impl Default for RestrictedContexts {
    fn default() -> Self {
        Self {
            commands: RESTRICTED_COMMANDS.iter().copied().map(SmolStr::new).collect(),
            environments: RESTRICTED_ENVIRONMENTS
                .iter()
                .copied()
                .map(SmolStr::new)
                .collect(),
            safe: SAFE_COMMANDS.iter().copied().map(SmolStr::new).collect(),
        }
    }
}

impl RestrictedContexts {
    pub fn from_config(config: &RestrictedConfig) -> Self {
        Self::default()
            .with_commands(config.extra_commands.iter().cloned())
            .with_environments(config.extra_environments.iter().cloned())
    }

    /// Add restricted commands. A name already marked safe becomes restricted.
    pub fn with_commands<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        for name in names {
            let name = name.into();
            self.safe.remove(&name);
            self.commands.insert(name);
        }
        self
    }

    pub fn with_environments<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.environments.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn classify(&self, command: &str) -> ContextKind {
        if self.commands.contains(command) {
            ContextKind::Restricted
        } else if self.safe.contains(command) {
            ContextKind::Safe
        } else {
            ContextKind::Unknown
        }
    }

    pub fn is_restricted_environment(&self, env: &str) -> bool {
        self.environments.contains(env)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delim {
    Brace,
    Bracket,
}

#[derive(Debug)]
struct Frame<'a> {
    delim: Delim,
    opener: Option<&'a str>,
    open_at: usize,
}

/// The outermost restricted context currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hold {
    Frame(usize),
    Env(usize),
}

/// Copies the stream through, lifting out held notes.
struct Relocator<'a> {
    stream: &'a str,
    out: String,
    copied: usize,
    stash: Vec<&'a str>,
    moved: usize,
}

impl<'a> Relocator<'a> {
    fn lift(&mut self, note: std::ops::Range<usize>) {
        self.out.push_str(&self.stream[self.copied..note.start]);
        self.stash.push(&self.stream[note.clone()]);
        self.copied = note.end;
        self.moved += 1;
    }

    fn flush(&mut self, at: usize) {
        if self.stash.is_empty() {
            return;
        }
        self.out.push_str(&self.stream[self.copied..at]);
        for note in self.stash.drain(..) {
            self.out.push_str(note);
        }
        self.copied = at;
    }

    fn finish(mut self) -> (String, usize) {
        self.flush(self.stream.len());
        self.out.push_str(&self.stream[self.copied..]);
        (self.out, self.moved)
    }
}

/// Move every `\annot` found inside a restricted context to just after the
/// outermost such context.
///
/// Notes in known-safe groups stay where they are. Notes in a group opened by
/// a command in neither table also stay, with a warning naming the command.
///
/// Fails if a `}` closes nothing or a group is still open at the end.
pub fn relocate_illegal_annotations(
    stream: &str,
    contexts: &RestrictedContexts,
) -> Result<String, BoundaryError> {
    let bytes = stream.as_bytes();
    let mut relocator = Relocator {
        stream,
        out: String::with_capacity(stream.len()),
        copied: 0,
        stash: Vec::new(),
        moved: 0,
    };
    let mut frames: Vec<Frame<'_>> = Vec::new();
    let mut envs: Vec<&str> = Vec::new();
    let mut hold: Option<Hold> = None;
    // A restricted command's argument just closed and another follows.
    let mut rearm = false;
    let mut pending: Option<&str> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if rearm && !matches!(b, b'{' | b'[' | b' ' | b'\t' | b'\r' | b'\n') {
            relocator.flush(i);
            rearm = false;
        }

        match b {
            b'%' => i = comment_end(stream, i),
            b'\\' => {
                if let Some(env) = verbatim_begin(stream, i) {
                    let body = i + "\\begin{".len() + env.len() + 1;
                    i = verbatim_end(stream, body, env).unwrap_or(stream.len());
                    pending = None;
                    continue;
                }
                let cmd = command_at(stream, i);
                if !cmd.word {
                    pending = None;
                    i = cmd.end;
                    continue;
                }
                match cmd.name {
                    "verb" => {
                        pending = None;
                        i = verb_end(stream, i);
                    }
                    "annot" => {
                        let end = note_end(stream, i)
                            .ok_or_else(|| BoundaryError::malformed_note(stream, i))?;
                        if hold.is_some() || rearm {
                            relocator.lift(i..end);
                        } else if let Some(opener) = unknown_context(&frames, contexts) {
                            tracing::warn!(
                                command = opener,
                                offset = i,
                                "margin note inside unclassified command argument, left in place"
                            );
                        }
                        pending = None;
                        i = end;
                    }
                    "begin" | "end" => {
                        let Some((env, end)) = environment_name(stream, cmd.end) else {
                            pending = None;
                            i = cmd.end;
                            continue;
                        };
                        if cmd.name == "begin" {
                            envs.push(env);
                            if hold.is_none() && contexts.is_restricted_environment(env) {
                                hold = Some(Hold::Env(envs.len() - 1));
                            }
                            pending = Some(cmd.name);
                        } else {
                            match envs.iter().rposition(|open| *open == env) {
                                Some(at) => envs.truncate(at),
                                None => tracing::debug!(env, offset = i, "end of unopened environment"),
                            }
                            if let Some(Hold::Env(k)) = hold {
                                if envs.len() <= k {
                                    relocator.flush(end);
                                    hold = None;
                                }
                            }
                            pending = None;
                        }
                        i = end;
                    }
                    name => {
                        pending = Some(name);
                        i = cmd.end;
                        if bytes.get(i) == Some(&b'*') {
                            i += 1;
                        }
                    }
                }
            }
            b'{' => {
                open_frame(&mut frames, &mut hold, &mut rearm, contexts, Delim::Brace, pending.take(), i);
                i += 1;
            }
            b'[' if pending.is_some() && bracket_end(stream, i).is_some() => {
                open_frame(&mut frames, &mut hold, &mut rearm, contexts, Delim::Bracket, pending.take(), i);
                i += 1;
            }
            b'}' | b']' => {
                let delim = if b == b'}' { Delim::Brace } else { Delim::Bracket };
                let top = frames.last().map(|f| f.delim);
                if top != Some(delim) {
                    if b == b'}' {
                        return Err(BoundaryError::unbalanced_close(stream, i));
                    }
                    // A literal bracket.
                    pending = None;
                    i += 1;
                    continue;
                }
                let Some(frame) = frames.pop() else {
                    return Err(BoundaryError::unbalanced_close(stream, i));
                };
                i += 1;
                pending = frame.opener;
                if hold == Some(Hold::Frame(frames.len())) {
                    hold = None;
                    match bytes.get(skip_ws(stream, i)) {
                        Some(b'{' | b'[') => rearm = true,
                        _ => relocator.flush(i),
                    }
                }
            }
            b' ' | b'\t' | b'\r' | b'\n' => {
                let run = stream[i..]
                    .bytes()
                    .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
                    .count();
                // A paragraph break ends any argument list.
                if stream[i..i + run].matches('\n').count() >= 2 {
                    pending = None;
                }
                i += run;
            }
            _ => {
                pending = None;
                i += 1;
            }
        }
    }

    if let Some(frame) = frames.last() {
        return Err(BoundaryError::unclosed(stream, frames.len(), frame.open_at));
    }
    if let Some(Hold::Env(k)) = hold {
        tracing::warn!(env = envs.get(k).copied(), "restricted environment never closes");
    }

    let (out, moved) = relocator.finish();
    if moved > 0 {
        tracing::debug!(moved, "moved margin notes out of restricted contexts");
    }
    Ok(out)
}

fn open_frame<'a>(
    frames: &mut Vec<Frame<'a>>,
    hold: &mut Option<Hold>,
    rearm: &mut bool,
    contexts: &RestrictedContexts,
    delim: Delim,
    opener: Option<&'a str>,
    at: usize,
) {
    let restricted = opener.is_some_and(|name| contexts.classify(name) == ContextKind::Restricted);
    if hold.is_none() && (restricted || *rearm) {
        *hold = Some(Hold::Frame(frames.len()));
    }
    *rearm = false;
    frames.push(Frame {
        delim,
        opener,
        open_at: at,
    });
}

/// Innermost enclosing command argument whose opener is unclassified.
fn unknown_context<'a>(frames: &[Frame<'a>], contexts: &RestrictedContexts) -> Option<&'a str> {
    frames
        .iter()
        .rev()
        .filter_map(|frame| frame.opener)
        .find(|name| contexts.classify(name) == ContextKind::Unknown)
}

/// `{name}` after `\begin` or `\end`.
fn environment_name(stream: &str, from: usize) -> Option<(&str, usize)> {
    let open = skip_ws(stream, from);
    if stream.as_bytes().get(open) != Some(&b'{') {
        return None;
    }
    let end = group_end(stream, open)?;
    Some((stream[open + 1..end - 1].trim(), end))
}

/// End of `\annot{key}{body}` starting at `at`.
fn note_end(stream: &str, at: usize) -> Option<usize> {
    let mut end = at + "\\annot".len();
    for _ in 0..2 {
        let open = skip_ws(stream, end);
        if stream.as_bytes().get(open) != Some(&b'{') {
            return None;
        }
        end = group_end(stream, open)?;
    }
    Some(end)
}
