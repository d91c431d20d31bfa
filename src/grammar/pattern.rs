use std::fmt;

use onig::{RegexOptions, SearchOptions, Syntax};

use crate::error::{Error, LucciolaResult};
use crate::grammar::StateId;
use crate::line::next_line_boundary;
use crate::scope::ScopeName;

/// A compiled regex rule plus the scope and capture metadata attached to it.
///
/// Patterns are created through [`Grammar::add_pattern`] or
/// [`Grammar::add_pattern_with_backrefs`] and configured in place via
/// `grammar[pattern_id]`.
///
/// [`Grammar::add_pattern`]: crate::Grammar::add_pattern
/// [`Grammar::add_pattern_with_backrefs`]: crate::Grammar::add_pattern_with_backrefs
pub struct Pattern {
    regex: onig::Regex,
    /// The source the regex was compiled from. For backreferencing patterns
    /// this is the sanitized copy, which is also what regsets are built from.
    source: String,
    /// The original source with `\0`..`\9` intact, kept only when the
    /// pattern actually contains backreferences.
    backref_source: Option<String>,
    /// Number of capture groups including group 0 (the whole match).
    captures: usize,
    inner_scope: Option<ScopeName>,
    outer_scope: Option<ScopeName>,
    capture_scopes: Vec<Option<ScopeName>>,
    capture_states: Vec<Option<StateId>>,
}

impl Pattern {
    pub(crate) fn new(source: &str) -> LucciolaResult<Pattern> {
        Self::compile(source.to_string(), None)
    }

    /// Like [`Pattern::new`], but the source may contain `\0`..`\9`
    /// references to the begin match. The digits are blanked out so the
    /// regex compiles and its groups can be counted; the original source is
    /// retained for expansion at match time.
    pub(crate) fn with_backrefs(source: &str) -> LucciolaResult<Pattern> {
        let mut sanitized = source.as_bytes().to_vec();
        let mut found = false;
        for i in 0..sanitized.len().saturating_sub(1) {
            if sanitized[i] == b'\\' && sanitized[i + 1].is_ascii_digit() {
                found = true;
                sanitized[i + 1] = b'0';
            }
        }
        if !found {
            return Self::compile(source.to_string(), None);
        }
        let sanitized =
            String::from_utf8(sanitized).expect("digit-for-digit substitution preserves UTF-8");
        Self::compile(sanitized, Some(source.to_string()))
    }

    fn compile(source: String, backref_source: Option<String>) -> LucciolaResult<Pattern> {
        let regex = onig::Regex::with_options(
            &source,
            RegexOptions::REGEX_OPTION_CAPTURE_GROUP,
            Syntax::default(),
        )
        .map_err(|error| Error::RegexCompile { pattern: source.clone(), error })?;
        let captures = regex.captures_len() + 1;
        Ok(Pattern {
            regex,
            source,
            backref_source,
            captures,
            inner_scope: None,
            outer_scope: None,
            capture_scopes: vec![None; captures],
            capture_states: vec![None; captures],
        })
    }

    /// Sets the scope emitted over the content between the begin and end
    /// matches when this pattern is used as a begin rule.
    pub fn set_inner_scope(&mut self, scope: ScopeName) {
        self.inner_scope = Some(scope);
    }

    /// Sets the scope emitted over the whole begin-to-end extent when this
    /// pattern is used as a begin rule.
    pub fn set_outer_scope(&mut self, scope: ScopeName) {
        self.outer_scope = Some(scope);
    }

    /// Attaches a scope to a capture group. A name of decimal digits
    /// addresses that group number ("0" is the whole match); any other name
    /// addresses every group carrying it. Unknown names and out-of-range
    /// numbers are ignored.
    pub fn set_capture_scope(&mut self, name: &str, scope: ScopeName) {
        for group in self.resolve_capture_groups(name) {
            self.capture_scopes[group] = Some(scope);
        }
    }

    /// Attaches a sub-state to a capture group: instead of a single scope,
    /// the captured range is re-tokenized with that state's rules. Name
    /// resolution works as in [`set_capture_scope`]; if the group also has a
    /// capture scope, the scope wins and the state is ignored.
    ///
    /// [`set_capture_scope`]: Pattern::set_capture_scope
    pub fn set_capture_state(&mut self, name: &str, state: StateId) {
        for group in self.resolve_capture_groups(name) {
            self.capture_states[group] = Some(state);
        }
    }

    /// Whether this pattern references begin-match captures and therefore
    /// needs per-frame expansion when used as an end or while anchor.
    pub fn is_backreferencing(&self) -> bool {
        self.backref_source.is_some()
    }

    /// Number of capture groups, counting group 0 (the whole match).
    pub fn capture_count(&self) -> usize {
        self.captures
    }

    /// Reports whether this pattern matches the first line of `text`,
    /// anchored at its start. The probed prefix runs through the first line
    /// terminator (`\n`, `\r` or `\r\n`), or the whole input if there is
    /// none. Grammar loaders use this to pick a grammar by first line.
    pub fn first_line_match(&self, text: &str) -> bool {
        let (_, end) = next_line_boundary(text, 0);
        self.regex
            .match_with_options(&text[..end], 0, SearchOptions::SEARCH_OPTION_NONE, None)
            .is_some()
    }

    fn resolve_capture_groups(&self, name: &str) -> Vec<usize> {
        if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
            return match name.parse::<usize>() {
                Ok(group) if group < self.captures => vec![group],
                _ => Vec::new(),
            };
        }
        let mut groups = Vec::new();
        self.regex.foreach_name(|group_name, numbers| {
            if group_name == name {
                groups.extend(numbers.iter().map(|&n| n as usize));
            }
            true
        });
        groups.retain(|&group| group < self.captures);
        groups
    }

    pub(crate) fn regex(&self) -> &onig::Regex {
        &self.regex
    }

    pub(crate) fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn backref_source(&self) -> Option<&str> {
        self.backref_source.as_deref()
    }

    pub(crate) fn inner_scope(&self) -> Option<ScopeName> {
        self.inner_scope
    }

    pub(crate) fn outer_scope(&self) -> Option<ScopeName> {
        self.outer_scope
    }

    pub(crate) fn capture_scope(&self, group: usize) -> Option<ScopeName> {
        self.capture_scopes.get(group).copied().flatten()
    }

    pub(crate) fn capture_state(&self, group: usize) -> Option<StateId> {
        self.capture_states.get(group).copied().flatten()
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = self.backref_source.as_deref().unwrap_or(&self.source);
        write!(f, "Pattern({source:?}, {} captures)", self.captures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(n: u32) -> ScopeName {
        ScopeName::new(n).unwrap()
    }

    #[test]
    fn compile_failure_reports_the_pattern() {
        let err = Pattern::new("(unclosed").unwrap_err();
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn counts_groups_including_the_whole_match() {
        let p = Pattern::new(r"(a)(b)?").unwrap();
        assert_eq!(p.capture_count(), 3);
    }

    #[test]
    fn detects_backreferences() {
        let p = Pattern::with_backrefs(r"^\1$").unwrap();
        assert!(p.is_backreferencing());
        assert_eq!(p.backref_source(), Some(r"^\1$"));

        let plain = Pattern::with_backrefs(r"^end$").unwrap();
        assert!(!plain.is_backreferencing());
        assert!(plain.backref_source().is_none());
    }

    #[test]
    fn numbered_capture_scope() {
        let mut p = Pattern::new(r"(\w+)=(\w+)").unwrap();
        p.set_capture_scope("2", scope(5));
        assert_eq!(p.capture_scope(2), Some(scope(5)));
        assert_eq!(p.capture_scope(1), None);
    }

    #[test]
    fn out_of_range_capture_is_ignored() {
        let mut p = Pattern::new(r"(\w+)").unwrap();
        p.set_capture_scope("7", scope(5));
        for group in 0..p.capture_count() {
            assert_eq!(p.capture_scope(group), None);
        }
    }

    #[test]
    fn named_capture_scope() {
        let mut p = Pattern::new(r"(?<key>\w+)=(?<value>\w+)").unwrap();
        p.set_capture_scope("value", scope(5));
        assert_eq!(p.capture_scope(1), None);
        assert_eq!(p.capture_scope(2), Some(scope(5)));
    }

    #[test]
    fn first_line_match_is_anchored() {
        let shebang = Pattern::new(r"^#!.*\bsh\b").unwrap();
        assert!(shebang.first_line_match("#!/bin/sh\necho hi\n"));
        assert!(!shebang.first_line_match("echo hi\n#!/bin/sh\n"));
        // no terminator at all still probes the whole input
        assert!(shebang.first_line_match("#!/bin/sh"));
        // \r\n terminates the probed prefix too
        assert!(!shebang.first_line_match("plain\r\n#!/bin/sh\n"));
    }
}
