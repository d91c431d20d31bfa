use std::cell::RefCell;
use std::fmt;

use onig::{RegSet, RegSetLead, RegexOptions, SearchOptions};

use crate::grammar::{PatternId, StateId};

/// One rule of a state, in the order it was added.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Rule {
    /// Emits the pattern's capture scopes and stays in the current state.
    Match { pattern: PatternId },
    /// Emits the pattern's capture scopes and pushes `to` on the stack.
    Begin { pattern: PatternId, to: StateId },
}

impl Rule {
    pub(crate) fn pattern(self) -> PatternId {
        match self {
            Rule::Match { pattern } | Rule::Begin { pattern, .. } => pattern,
        }
    }
}

/// The winning match of a state's regset search. All offsets are relative
/// to the searched line.
#[derive(Debug, Clone)]
pub(crate) struct StateMatch {
    /// Index of the winning rule in add order.
    pub rule: usize,
    pub start: usize,
    pub end: usize,
    /// Capture group positions, group 0 first.
    pub captures: Vec<Option<(usize, usize)>>,
}

/// A node of the pushdown automaton: an ordered list of match/begin rules
/// searched as one regset, plus optional end and while anchors.
///
/// States are created with [`Grammar::add_state`] and wired up through the
/// grammar's rule operations.
///
/// [`Grammar::add_state`]: crate::Grammar::add_state
pub struct State {
    rules: Vec<Rule>,
    /// Regex sources parallel to `rules`; what the regset compiles from.
    sources: Vec<String>,
    /// Compiled on first search. Add order is regset index order, which is
    /// what breaks ties between rules matching at the same position.
    regset: RefCell<Option<RegSet>>,
    end: Option<PatternId>,
    apply_end_pattern_last: bool,
    while_: Option<PatternId>,
}

impl State {
    pub(crate) fn new() -> State {
        State {
            rules: Vec::new(),
            sources: Vec::new(),
            regset: RefCell::new(None),
            end: None,
            apply_end_pattern_last: false,
            while_: None,
        }
    }

    /// Number of match/begin rules in this state.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Whether an end anchor is installed.
    pub fn has_end(&self) -> bool {
        self.end.is_some()
    }

    /// Whether a while anchor is installed.
    pub fn has_while(&self) -> bool {
        self.while_.is_some()
    }

    pub(crate) fn add_rule(&mut self, rule: Rule, source: String) {
        self.rules.push(rule);
        self.sources.push(source);
        self.regset.borrow_mut().take();
    }

    pub(crate) fn set_end(&mut self, pattern: PatternId, apply_last: bool) {
        self.end = Some(pattern);
        self.apply_end_pattern_last = apply_last;
    }

    pub(crate) fn set_while(&mut self, pattern: PatternId) {
        self.while_ = Some(pattern);
    }

    pub(crate) fn rule(&self, index: usize) -> Rule {
        self.rules[index]
    }

    pub(crate) fn end_pattern(&self) -> Option<PatternId> {
        self.end
    }

    pub(crate) fn while_pattern(&self) -> Option<PatternId> {
        self.while_
    }

    pub(crate) fn apply_end_pattern_last(&self) -> bool {
        self.apply_end_pattern_last
    }

    /// Position-lead search over all rule patterns in the window
    /// `[from, to]` of `line`: the earliest-starting match wins, ties go to
    /// the rule added first. Returns `None` when nothing matches or the
    /// regset cannot be built.
    pub(crate) fn find(
        &self,
        line: &str,
        from: usize,
        to: usize,
        options: SearchOptions,
    ) -> Option<StateMatch> {
        if self.sources.is_empty() {
            return None;
        }
        if self.regset.borrow().is_none() {
            let sources: Vec<&str> = self.sources.iter().map(|s| s.as_str()).collect();
            match RegSet::with_options(&sources, RegexOptions::REGEX_OPTION_CAPTURE_GROUP) {
                Ok(regset) => *self.regset.borrow_mut() = Some(regset),
                Err(error) => {
                    log::warn!("failed to build a {}-pattern regset: {error}", sources.len());
                    return None;
                }
            }
        }
        let regset_ref = self.regset.borrow();
        let regset = regset_ref.as_ref()?;
        let (rule, captures) =
            regset.captures_with_options(line, from, to, RegSetLead::Position, options)?;
        let (start, end) = captures.pos(0)?;
        let captures = (0..captures.len()).map(|group| captures.pos(group)).collect();
        Some(StateMatch { rule, start, end, captures })
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<String> = self
            .rules
            .iter()
            .zip(self.sources.iter())
            .map(|(rule, source)| format!("  - {rule:?}: {source}"))
            .collect();
        write!(f, "{}", rules.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn match_rule(index: u16) -> Rule {
        Rule::Match { pattern: PatternId(index) }
    }

    #[test]
    fn earliest_start_wins() {
        let mut state = State::new();
        state.add_rule(match_rule(0), "zz".to_string());
        state.add_rule(match_rule(1), "b".to_string());
        let m = state
            .find("aabzz", 0, 5, SearchOptions::SEARCH_OPTION_NONE)
            .unwrap();
        assert_eq!(m.rule, 1);
        assert_eq!((m.start, m.end), (2, 3));
    }

    #[test]
    fn add_order_breaks_position_ties() {
        let mut state = State::new();
        state.add_rule(match_rule(0), "b".to_string());
        state.add_rule(match_rule(1), "[ab]+".to_string());
        let m = state
            .find("bbb", 0, 3, SearchOptions::SEARCH_OPTION_NONE)
            .unwrap();
        assert_eq!(m.rule, 0);
    }

    #[test]
    fn window_limits_the_search() {
        let mut state = State::new();
        state.add_rule(match_rule(0), "x".to_string());
        assert!(state.find("x___", 1, 4, SearchOptions::SEARCH_OPTION_NONE).is_none());
    }

    #[test]
    fn empty_state_never_matches() {
        let state = State::new();
        assert!(state.find("anything", 0, 8, SearchOptions::SEARCH_OPTION_NONE).is_none());
    }

    #[test]
    fn capture_positions_are_reported() {
        let mut state = State::new();
        state.add_rule(match_rule(0), r"(\d+)-(\d+)".to_string());
        let m = state
            .find("a 12-345", 0, 8, SearchOptions::SEARCH_OPTION_NONE)
            .unwrap();
        assert_eq!(m.captures[1], Some((2, 4)));
        assert_eq!(m.captures[2], Some((5, 8)));
    }
}
