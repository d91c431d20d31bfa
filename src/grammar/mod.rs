use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::error::LucciolaResult;

mod pattern;
mod state;

pub use pattern::Pattern;
pub use state::State;
pub(crate) use state::Rule;

/// Handle of a [`Pattern`] inside its [`Grammar`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(pub(crate) u16);

impl PatternId {
    pub(crate) fn as_index(self) -> usize {
        self.0 as usize
    }
}

/// Handle of a [`State`] inside its [`Grammar`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(pub(crate) u16);

impl StateId {
    pub(crate) fn as_index(self) -> usize {
        self.0 as usize
    }
}

/// The arena owning every [`Pattern`] and [`State`] of one grammar.
///
/// Patterns and states address each other through [`PatternId`] and
/// [`StateId`] handles, so mutually recursive state graphs are fine. A
/// grammar is built once up front and then only read by renderers.
#[derive(Debug, Default)]
pub struct Grammar {
    patterns: Vec<Pattern>,
    states: Vec<State>,
}

impl Grammar {
    /// An empty grammar.
    pub fn new() -> Grammar {
        Grammar::default()
    }

    /// Compiles `source` and adds it as a pattern. The returned handle is
    /// used to wire the pattern into states and to configure it through
    /// `grammar[id]`.
    pub fn add_pattern(&mut self, source: &str) -> LucciolaResult<PatternId> {
        let pattern = Pattern::new(source)?;
        Ok(self.push_pattern(pattern))
    }

    /// Like [`add_pattern`], but `\0`..`\9` in the source are treated as
    /// references to the begin match of the enclosing context. Use this for
    /// end and while patterns of heredoc-style grammars.
    ///
    /// [`add_pattern`]: Grammar::add_pattern
    pub fn add_pattern_with_backrefs(&mut self, source: &str) -> LucciolaResult<PatternId> {
        let pattern = Pattern::with_backrefs(source)?;
        Ok(self.push_pattern(pattern))
    }

    /// Adds an empty state.
    pub fn add_state(&mut self) -> StateId {
        let id = StateId(
            u16::try_from(self.states.len()).expect("more than 65535 states in one grammar"),
        );
        self.states.push(State::new());
        id
    }

    /// Appends a match rule to `state`.
    pub fn add_match(&mut self, state: StateId, pattern: PatternId) {
        let source = self[pattern].source().to_string();
        self.states[state.as_index()].add_rule(Rule::Match { pattern }, source);
    }

    /// Appends a begin rule to `state` that pushes `to` when it matches.
    pub fn add_begin(&mut self, state: StateId, to: StateId, pattern: PatternId) {
        let source = self[pattern].source().to_string();
        self.states[state.as_index()].add_rule(Rule::Begin { pattern, to }, source);
    }

    /// Installs the end anchor of `state`. With `apply_last` set, match and
    /// begin rules win ties against the end pattern at the same position
    /// instead of losing them.
    pub fn set_end(&mut self, state: StateId, pattern: PatternId, apply_last: bool) {
        self.states[state.as_index()].set_end(pattern, apply_last);
    }

    /// Installs the while anchor of `state`: the pattern must match at the
    /// start of every following line for the state to stay on the stack.
    pub fn set_while(&mut self, state: StateId, pattern: PatternId) {
        self.states[state.as_index()].set_while(pattern);
    }

    /// Number of patterns added so far.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Number of states added so far.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Whether a frame entering `state` must save the begin match captures,
    /// i.e. whether its end or while anchor needs them for expansion.
    pub(crate) fn keeps_begin_captures(&self, state: StateId) -> bool {
        let state = &self[state];
        state.end_pattern().is_some_and(|p| self[p].is_backreferencing())
            || state.while_pattern().is_some_and(|p| self[p].is_backreferencing())
    }

    fn push_pattern(&mut self, pattern: Pattern) -> PatternId {
        let id = PatternId(
            u16::try_from(self.patterns.len()).expect("more than 65535 patterns in one grammar"),
        );
        self.patterns.push(pattern);
        id
    }
}

impl Index<PatternId> for Grammar {
    type Output = Pattern;

    fn index(&self, id: PatternId) -> &Pattern {
        &self.patterns[id.as_index()]
    }
}

impl IndexMut<PatternId> for Grammar {
    fn index_mut(&mut self, id: PatternId) -> &mut Pattern {
        &mut self.patterns[id.as_index()]
    }
}

impl Index<StateId> for Grammar {
    type Output = State;

    fn index(&self, id: StateId) -> &State {
        &self.states[id.as_index()]
    }
}

impl IndexMut<StateId> for Grammar {
    fn index_mut(&mut self, id: StateId) -> &mut State {
        &mut self.states[id.as_index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wires_rules_in_add_order() {
        let mut grammar = Grammar::new();
        let root = grammar.add_state();
        let inside = grammar.add_state();
        let begin = grammar.add_pattern("\"").unwrap();
        let word = grammar.add_pattern(r"\w+").unwrap();
        grammar.add_begin(root, inside, begin);
        grammar.add_match(root, word);
        assert_eq!(grammar[root].rule_count(), 2);
        assert_eq!(grammar[inside].rule_count(), 0);
    }

    #[test]
    fn end_and_while_anchors() {
        let mut grammar = Grammar::new();
        let state = grammar.add_state();
        let end = grammar.add_pattern("\"").unwrap();
        grammar.set_end(state, end, true);
        assert!(grammar[state].has_end());
        assert!(!grammar[state].has_while());
    }

    #[test]
    fn begin_captures_are_kept_only_for_backreferencing_anchors() {
        let mut grammar = Grammar::new();
        let heredoc = grammar.add_state();
        let string = grammar.add_state();
        let backref_end = grammar.add_pattern_with_backrefs(r"^\1$").unwrap();
        let plain_end = grammar.add_pattern("\"").unwrap();
        grammar.set_end(heredoc, backref_end, false);
        grammar.set_end(string, plain_end, false);
        assert!(grammar.keeps_begin_captures(heredoc));
        assert!(!grammar.keeps_begin_captures(string));
    }
}
