use std::fmt;

use onig::{Region, SearchOptions};

use crate::grammar::{Grammar, PatternId, Rule, StateId};
use crate::line::{Line, next_line_boundary};

mod backrefs;
mod stack;

use stack::{AnchorSlot, Frame, MAX_STACK_DEPTH};

/// The dispatch loop gives up on a line after this many consecutive matches
/// that fail to advance past the high-water offset, so zero-width rules
/// cannot livelock a render.
const MAX_MATCHES_WITHOUT_PROGRESS: usize = 32;

/// Streams a grammar over an input, one line per call.
///
/// A renderer owns its cursor, the stack of entered contexts and the
/// sequence counter used to order scope events, so it must stay on one
/// thread; the grammar it borrows is read-only but uses lazily compiled
/// regsets, so it is confined too. Create one renderer per input and call
/// [`render_next_line`] until it returns `None`.
///
/// [`render_next_line`]: Renderer::render_next_line
pub struct Renderer<'a> {
    grammar: &'a Grammar,
    text: &'a str,
    offset: usize,
    /// Index 0 is the permanent bottom frame carrying the start state; it
    /// is never popped.
    stack: Vec<Frame>,
    seq: u64,
}

impl<'a> Renderer<'a> {
    /// A renderer over `text` anchored at `start`.
    pub fn new(grammar: &'a Grammar, text: &'a str, start: StateId) -> Renderer<'a> {
        Renderer { grammar, text, offset: 0, stack: vec![Frame::bare(start)], seq: 0 }
    }

    /// Byte offset of the next line to be rendered.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Current nesting depth, counting the permanent bottom frame. Tracking
    /// this across calls tells a consumer which scopes span line breaks.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Renders the next line of the input, or `None` once the input is
    /// exhausted. Every call consumes exactly one line, terminator
    /// included; the returned events are sorted into a well-nested stream.
    pub fn render_next_line(&mut self) -> Option<Line> {
        if self.offset >= self.text.len() {
            return None;
        }
        let begin = self.offset;
        let (end, end_including_newline) = next_line_boundary(self.text, begin);
        self.offset = end_including_newline;
        let mut line = Line { begin, end, end_including_newline, scopes: Vec::new() };
        self.render_line(&mut line, begin, end_including_newline, 1);
        line.sort_events();
        Some(line)
    }

    /// Renders `[begin, end)` of the current line against the stack above
    /// `stack_base`. Called once per line with the base above the bottom
    /// frame, and recursively for capture states with the base above their
    /// transient frame.
    fn render_line(&mut self, line: &mut Line, begin: usize, end: usize, stack_base: usize) {
        if begin == end {
            return;
        }
        let grammar = self.grammar;
        let text = self.text;
        let line_begin = line.begin;
        let line_str = &text[line_begin..line.end_including_newline];
        let mut region = Region::new();
        let mut offset = begin;
        let mut max_offset = offset;

        // First every while anchor above the base has to hold, outermost
        // first. A failing anchor pops its frame and everything nested in
        // it. The bottom frame is below the base and never checked.
        let mut index = stack_base;
        while index < self.stack.len() {
            let Some(while_id) = grammar[self.stack[index].state].while_pattern() else {
                index += 1;
                continue;
            };
            let matched = self.stack[index]
                .search_anchor(
                    grammar,
                    text,
                    while_id,
                    AnchorSlot::While,
                    line_str,
                    offset - line_begin,
                    end - line_begin,
                    SearchOptions::SEARCH_OPTION_NOT_BEGIN_POSITION,
                    &mut region,
                )
                .is_some();
            if !matched {
                #[cfg(feature = "debug")]
                log::debug!("[render_line] while anchor failed, popping to depth {index}");
                self.stack.truncate(index);
                break;
            }
            let captures: Vec<Option<(usize, usize)>> =
                (0..region.len()).map(|group| region.pos(group)).collect();
            self.render_captures(line, while_id, &captures);
            if let Some((while_begin, while_end)) = captures.first().copied().flatten() {
                // the scopes of this frame resume at the while anchor
                self.stack[index].outer_begin = line_begin + while_begin;
                self.stack[index].inner_begin = line_begin + while_end;
                offset = line_begin + while_end;
            }
            index += 1;
        }

        let mut matches_without_progress = 0;
        while matches_without_progress < MAX_MATCHES_WITHOUT_PROGRESS {
            let top = self.stack.len() - 1;
            let state_id = self.stack[top].state;
            let state = &grammar[state_id];
            let mut options = SearchOptions::SEARCH_OPTION_NONE;
            if offset > self.stack[top].inner_begin {
                // \G may only match where the current context began
                options |= SearchOptions::SEARCH_OPTION_NOT_BEGIN_POSITION;
            }

            #[cfg(feature = "debug")]
            log::trace!(
                "[render_line] scanning {offset}: {:?}",
                &line_str[offset - line_begin..]
            );

            let mut end_match: Option<(PatternId, usize, usize, Vec<Option<(usize, usize)>>)> =
                None;
            if let Some(end_id) = state.end_pattern()
                && self.stack[top]
                    .search_anchor(
                        grammar,
                        text,
                        end_id,
                        AnchorSlot::End,
                        line_str,
                        offset - line_begin,
                        end - line_begin,
                        options,
                        &mut region,
                    )
                    .is_some()
                && let Some((end_begin, end_end)) = region.pos(0)
            {
                let captures = (0..region.len()).map(|group| region.pos(group)).collect();
                end_match = Some((end_id, end_begin, end_end, captures));
            }

            let rule_match =
                state.find(line_str, offset - line_begin, end - line_begin, options);

            // the end anchor loses only to rules starting strictly before
            // it, or tied with it under apply_end_pattern_last
            let rule_wins = match (&rule_match, &end_match) {
                (Some(_), None) => true,
                (Some(m), Some((_, end_begin, _, _))) => {
                    m.start < *end_begin
                        || (state.apply_end_pattern_last() && m.start == *end_begin)
                }
                (None, _) => false,
            };

            if rule_wins && let Some(m) = rule_match {
                let rule = state.rule(m.rule);
                #[cfg(feature = "debug")]
                log::debug!("[render_line] rule {} matched {}..{}", m.rule, m.start, m.end);
                self.render_captures(line, rule.pattern(), &m.captures);
                if let Rule::Begin { pattern, to } = rule {
                    if self.stack.len() == MAX_STACK_DEPTH {
                        log::warn!("state stack overflow, skipping a begin push");
                    } else {
                        let begin_captures =
                            grammar.keeps_begin_captures(to).then(|| m.captures.clone());
                        self.stack.push(Frame {
                            state: to,
                            pattern: Some(pattern),
                            begin_captures,
                            begin_offset: line_begin,
                            outer_begin: line_begin + m.start,
                            outer_seq: self.seq,
                            inner_begin: line_begin + m.end,
                            inner_seq: self.seq + 1,
                            end_regex: None,
                            while_regex: None,
                        });
                        self.seq += 2;
                    }
                }
                let match_end = line_begin + m.end;
                if match_end > max_offset {
                    matches_without_progress = 0;
                    max_offset = match_end;
                } else {
                    matches_without_progress += 1;
                }
                offset = match_end;
            } else if let Some((end_id, end_begin, end_end, captures)) = end_match {
                self.render_captures(line, end_id, &captures);
                if self.stack.len() <= stack_base {
                    log::warn!("state stack underflow, ignoring an end match");
                    break;
                }
                if let Some(frame) = self.stack.last()
                    && let Some(pattern_id) = frame.pattern
                {
                    let pattern = &grammar[pattern_id];
                    line.add_scope_range(
                        pattern.inner_scope(),
                        frame.inner_seq,
                        frame.inner_begin,
                        line_begin + end_begin,
                    );
                    line.add_scope_range(
                        pattern.outer_scope(),
                        frame.outer_seq,
                        frame.outer_begin,
                        line_begin + end_end,
                    );
                }
                self.stack.pop();
                offset = line_begin + end_end;
            } else {
                break;
            }
        }

        // everything still entered stays open through the end of the range
        for frame in &self.stack[stack_base..] {
            let Some(pattern_id) = frame.pattern else { continue };
            let pattern = &grammar[pattern_id];
            line.add_scope_range(pattern.outer_scope(), frame.outer_seq, frame.outer_begin, end);
            line.add_scope_range(pattern.inner_scope(), frame.inner_seq, frame.inner_begin, end);
        }
    }

    /// Emits the scopes of every participating capture group; groups wired
    /// to a capture state instead get their range re-rendered with that
    /// state on a transient frame. A group with both keeps the scope.
    fn render_captures(
        &mut self,
        line: &mut Line,
        pattern_id: PatternId,
        captures: &[Option<(usize, usize)>],
    ) {
        let grammar = self.grammar;
        let line_begin = line.begin;
        for (group, position) in captures.iter().enumerate() {
            let Some((group_begin, group_end)) = *position else { continue };
            let pattern = &grammar[pattern_id];
            if let Some(scope) = pattern.capture_scope(group) {
                let seq = self.seq;
                self.seq += 1;
                line.add_scope_range(
                    Some(scope),
                    seq,
                    line_begin + group_begin,
                    line_begin + group_end,
                );
            } else if let Some(sub_state) = pattern.capture_state(group) {
                if self.stack.len() == MAX_STACK_DEPTH {
                    log::warn!("state stack overflow, skipping a capture state");
                    continue;
                }
                self.stack.push(Frame::bare(sub_state));
                let stack_base = self.stack.len();
                self.render_line(
                    line,
                    line_begin + group_begin,
                    line_begin + group_end,
                    stack_base,
                );
                self.stack.truncate(stack_base - 1);
            }
        }
    }
}

impl fmt::Debug for Renderer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Renderer at byte {} of {}:", self.offset, self.text.len())?;
        for (depth, frame) in self.stack.iter().enumerate() {
            let indent = "  ".repeat(depth);
            writeln!(f, "{indent}{frame:?}")?;
        }
        Ok(())
    }
}
