use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::scope::ScopeName;

/// Whether a [`ScopeEvent`] opens or closes a scope.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// The scope opens at the event offset.
    Begin,
    /// The scope closes at the event offset.
    End,
}

/// One endpoint of a scope range, clamped to the line it was emitted on.
///
/// A scope that spans several lines is re-emitted on every line it covers:
/// its begin event is clamped to the line start and its end event to the
/// line end, while `start_offset`/`end_offset` keep the unclamped range so
/// sorting can still tell outer scopes from inner ones.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ScopeEvent {
    /// Opening or closing marker.
    pub kind: EventKind,
    /// The scope this event belongs to.
    pub name: ScopeName,
    /// Position of the marker, always within `[line.begin, line.end]`.
    pub offset: usize,
    /// Unclamped start of the whole scope range; may lie on an earlier line.
    pub start_offset: usize,
    /// Unclamped end of the whole scope range; may lie on a later line.
    pub end_offset: usize,
    /// Allocation order of the range. Both events of a range share it, so a
    /// sorted stream can be re-paired by matching `seq` values.
    pub seq: u64,
}

/// A rendered line: its byte range within the input plus the sorted scope
/// events that apply to it.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Byte offset of the first byte of the line.
    pub begin: usize,
    /// Byte offset one past the last content byte, excluding the terminator.
    pub end: usize,
    /// Byte offset one past the terminator (`\n`, `\r` or `\r\n`). Equal to
    /// `end` on an unterminated final line.
    pub end_including_newline: usize,
    /// Scope events in the order defined by the event sort (see crate docs).
    pub scopes: Vec<ScopeEvent>,
}

impl Line {
    /// Emits the begin/end event pair for a scope range, clamped to this
    /// line. Nothing is emitted for an absent scope or when the clamped
    /// range is empty.
    pub(crate) fn add_scope_range(
        &mut self,
        name: Option<ScopeName>,
        seq: u64,
        begin: usize,
        end: usize,
    ) {
        let clamped_begin = begin.max(self.begin);
        let clamped_end = end.min(self.end);
        let Some(name) = name else { return };
        if clamped_begin >= clamped_end {
            return;
        }
        self.scopes.push(ScopeEvent {
            kind: EventKind::Begin,
            name,
            offset: clamped_begin,
            start_offset: begin,
            end_offset: end,
            seq,
        });
        self.scopes.push(ScopeEvent {
            kind: EventKind::End,
            name,
            offset: clamped_end,
            start_offset: begin,
            end_offset: end,
            seq,
        });
    }

    /// Sorts events into a well-nested stream. The comparator is a total
    /// order (seq breaks every tie), so an unstable sort is fine.
    pub(crate) fn sort_events(&mut self) {
        self.scopes.sort_unstable_by(compare_events);
    }
}

/// Total order on scope events:
/// position first, closing before opening at the same position, then the
/// unclamped ranges so that outer scopes open before and close after inner
/// ones, with the allocation order as the final tie break.
fn compare_events(a: &ScopeEvent, b: &ScopeEvent) -> Ordering {
    let by_offset = a.offset.cmp(&b.offset);
    if by_offset != Ordering::Equal {
        return by_offset;
    }
    match (a.kind, b.kind) {
        (EventKind::End, EventKind::Begin) => return Ordering::Less,
        (EventKind::Begin, EventKind::End) => return Ordering::Greater,
        _ => {}
    }
    // Same kind. For begins: wider range (smaller start, larger end) and
    // earlier seq open first. For ends the whole order flips so that inner
    // scopes close before outer ones.
    let same_kind = a
        .start_offset
        .cmp(&b.start_offset)
        .then(b.end_offset.cmp(&a.end_offset))
        .then(a.seq.cmp(&b.seq));
    match a.kind {
        EventKind::Begin => same_kind,
        EventKind::End => same_kind.reverse(),
    }
}

/// Finds the end of the line starting at `offset`: returns the offset of
/// the terminator (or end of input) and the offset just past it. Recognizes
/// `\n`, `\r` and `\r\n`.
pub(crate) fn next_line_boundary(text: &str, offset: usize) -> (usize, usize) {
    let bytes = text.as_bytes();
    let mut i = offset;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => return (i, i + 1),
            b'\r' => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                    return (i, i + 2);
                }
                return (i, i + 1);
            }
            _ => i += 1,
        }
    }
    (i, i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(n: u32) -> ScopeName {
        ScopeName::new(n).unwrap()
    }

    fn line(begin: usize, end: usize) -> Line {
        Line { begin, end, end_including_newline: end + 1, scopes: Vec::new() }
    }

    #[test]
    fn ranges_are_clamped_to_the_line() {
        let mut l = line(10, 20);
        l.add_scope_range(Some(scope(1)), 0, 5, 25);
        assert_eq!(l.scopes.len(), 2);
        assert_eq!(l.scopes[0].offset, 10);
        assert_eq!(l.scopes[1].offset, 20);
        // unclamped range survives for sorting
        assert_eq!(l.scopes[0].start_offset, 5);
        assert_eq!(l.scopes[0].end_offset, 25);
    }

    #[test]
    fn empty_or_unnamed_ranges_emit_nothing() {
        let mut l = line(10, 20);
        l.add_scope_range(None, 0, 12, 15);
        l.add_scope_range(Some(scope(1)), 1, 12, 12);
        // entirely past the line, clamps to an empty range
        l.add_scope_range(Some(scope(1)), 2, 25, 30);
        assert!(l.scopes.is_empty());
    }

    #[test]
    fn ends_sort_before_begins_at_the_same_offset() {
        let mut l = line(0, 10);
        l.add_scope_range(Some(scope(1)), 0, 0, 4);
        l.add_scope_range(Some(scope(2)), 1, 4, 8);
        l.sort_events();
        let kinds: Vec<(EventKind, usize)> =
            l.scopes.iter().map(|e| (e.kind, e.offset)).collect();
        assert_eq!(
            kinds,
            vec![
                (EventKind::Begin, 0),
                (EventKind::End, 4),
                (EventKind::Begin, 4),
                (EventKind::End, 8),
            ]
        );
    }

    #[test]
    fn outer_opens_first_and_closes_last() {
        let mut l = line(0, 10);
        // inner allocated first: seq must not override the range nesting
        l.add_scope_range(Some(scope(2)), 0, 2, 8);
        l.add_scope_range(Some(scope(1)), 1, 2, 8);
        // outer spans wider
        l.add_scope_range(Some(scope(3)), 2, 0, 8);
        l.sort_events();
        let names: Vec<(EventKind, u32)> =
            l.scopes.iter().map(|e| (e.kind, e.name.get())).collect();
        assert_eq!(
            names,
            vec![
                (EventKind::Begin, 3),
                (EventKind::Begin, 2),
                (EventKind::Begin, 1),
                (EventKind::End, 1),
                (EventKind::End, 2),
                (EventKind::End, 3),
            ]
        );
    }

    #[test]
    fn scope_from_a_previous_line_opens_before_local_ones() {
        let mut l = line(20, 30);
        l.add_scope_range(Some(scope(1)), 5, 20, 25);
        // opened on an earlier line: unclamped start is smaller
        l.add_scope_range(Some(scope(2)), 6, 3, 40);
        l.sort_events();
        assert_eq!(l.scopes[0].name.get(), 2);
        assert_eq!(l.scopes[0].offset, 20);
        assert_eq!(l.scopes[1].name.get(), 1);
    }

    #[test]
    fn line_boundaries() {
        assert_eq!(next_line_boundary("ab\ncd", 0), (2, 3));
        assert_eq!(next_line_boundary("ab\r\ncd", 0), (2, 4));
        assert_eq!(next_line_boundary("ab\rcd", 0), (2, 3));
        assert_eq!(next_line_boundary("cd", 0), (2, 2));
        assert_eq!(next_line_boundary("ab\ncd", 3), (5, 5));
        assert_eq!(next_line_boundary("", 0), (0, 0));
    }

    #[test]
    fn line_round_trips_through_serde() {
        let mut l = line(0, 4);
        l.add_scope_range(Some(scope(9)), 1, 1, 3);
        let json = serde_json::to_string(&l).unwrap();
        let back: Line = serde_json::from_str(&json).unwrap();
        assert_eq!(back, l);
    }
}
