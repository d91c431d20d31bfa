use std::fmt;

use onig::{Region, RegexOptions, SearchOptions, Syntax};

use crate::grammar::{Grammar, PatternId, StateId};
use crate::renderer::backrefs;

/// Hard bound on nesting depth. A push beyond it is skipped with a warning
/// and rendering carries on in the current context.
pub(crate) const MAX_STACK_DEPTH: usize = 256;

/// Which per-frame regex cache an anchor search goes through.
#[derive(Debug, Copy, Clone)]
pub(crate) enum AnchorSlot {
    End,
    While,
}

/// One entry of the renderer's state stack: a context entered by a begin
/// rule (or the permanent bottom frame / a transient capture frame, which
/// carry no begin pattern).
pub(crate) struct Frame {
    pub state: StateId,
    /// The begin pattern whose inner/outer scopes are emitted when this
    /// frame pops. `None` for the bottom frame and transient frames.
    pub pattern: Option<PatternId>,
    /// Begin match capture positions (relative to `begin_offset`), saved
    /// only when the state's end or while anchor needs them for expansion.
    pub begin_captures: Option<Vec<Option<(usize, usize)>>>,
    /// Start of the line the begin rule matched on.
    pub begin_offset: usize,
    /// Where the outer scope starts: the begin of the begin match, moved to
    /// the begin of the while match on continuation lines.
    pub outer_begin: usize,
    pub outer_seq: u64,
    /// Where the inner scope starts: the end of the begin match. Also the
    /// position `\G` anchors to while this frame is on top.
    pub inner_begin: usize,
    pub inner_seq: u64,
    /// Backreference-expanded anchors, compiled on first use and dropped
    /// with the frame.
    pub end_regex: Option<onig::Regex>,
    pub while_regex: Option<onig::Regex>,
}

impl Frame {
    /// A frame with no begin bookkeeping: the renderer's bottom frame and
    /// the transient frames pushed around capture-state recursion.
    pub(crate) fn bare(state: StateId) -> Frame {
        Frame {
            state,
            pattern: None,
            begin_captures: None,
            begin_offset: 0,
            outer_begin: 0,
            outer_seq: 0,
            inner_begin: 0,
            inner_seq: 0,
            end_regex: None,
            while_regex: None,
        }
    }

    /// Searches an end/while anchor in the window `[from, to]` of `line`.
    /// Plain patterns search their compiled regex directly; backreferencing
    /// ones go through this frame's expanded regex, compiling and caching
    /// it on first use. A failed expansion or compilation reports no match
    /// and caches nothing, so it is re-attempted on the next search.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn search_anchor(
        &mut self,
        grammar: &Grammar,
        text: &str,
        pattern_id: PatternId,
        slot: AnchorSlot,
        line: &str,
        from: usize,
        to: usize,
        options: SearchOptions,
        region: &mut Region,
    ) -> Option<usize> {
        let pattern = &grammar[pattern_id];
        let Some(source) = pattern.backref_source() else {
            return pattern.regex().search_with_options(line, from, to, options, Some(region));
        };
        let missing = match slot {
            AnchorSlot::End => self.end_regex.is_none(),
            AnchorSlot::While => self.while_regex.is_none(),
        };
        if missing {
            let captures = self.begin_captures.as_deref()?;
            let expanded = backrefs::expand(source, text, self.begin_offset, captures)?;
            let regex = onig::Regex::with_options(
                &expanded,
                RegexOptions::REGEX_OPTION_CAPTURE_GROUP,
                Syntax::default(),
            )
            .ok()?;
            match slot {
                AnchorSlot::End => self.end_regex = Some(regex),
                AnchorSlot::While => self.while_regex = Some(regex),
            }
        }
        let regex = match slot {
            AnchorSlot::End => self.end_regex.as_ref(),
            AnchorSlot::While => self.while_regex.as_ref(),
        }?;
        regex.search_with_options(line, from, to, options, Some(region))
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state={}", self.state.0)?;
        if let Some(pattern) = self.pattern {
            write!(f, ", pattern={}", pattern.0)?;
        }
        write!(
            f,
            ", outer={}#{}, inner={}#{}",
            self.outer_begin, self.outer_seq, self.inner_begin, self.inner_seq
        )?;
        if self.begin_captures.is_some() {
            write!(f, ", saved captures")?;
        }
        if self.end_regex.is_some() || self.while_regex.is_some() {
            write!(f, ", expanded anchors")?;
        }
        Ok(())
    }
}
