//! A streaming TextMate-style grammar tokenizer.
//!
//! The crate implements the core of a TextMate grammar engine: a pushdown
//! tokenizer that applies regex rules to an input line by line and emits a
//! sorted stream of nested scope ranges. Grammar loading, theme application
//! and rendering live elsewhere; this crate only takes an already-wired
//! rule graph and produces scope events.
//!
//! A grammar is an arena of [`Pattern`]s and [`State`]s. Match rules emit
//! scopes in place, begin rules enter a nested state until its end pattern
//! matches (or its while pattern stops matching at a line start), and
//! end/while patterns may reference bytes captured by their begin match.
//! A [`Renderer`] walks the input one line per call and returns [`Line`]s
//! whose [`ScopeEvent`]s are sorted into a well-nested stream: position
//! first, ends before begins, outer scopes opening before and closing
//! after inner ones.
//!
//! # Example
//!
//! ```ignore
//! use lucciola::{Grammar, Renderer, ScopeName};
//!
//! let string_scope = ScopeName::new(1).unwrap();
//! let escape_scope = ScopeName::new(2).unwrap();
//!
//! let mut grammar = Grammar::new();
//! let root = grammar.add_state();
//! let string = grammar.add_state();
//! let quote = grammar.add_pattern("\"")?;
//! grammar[quote].set_outer_scope(string_scope);
//! grammar.add_begin(root, string, quote);
//! let end_quote = grammar.add_pattern("\"")?;
//! grammar.set_end(string, end_quote, false);
//! let escape = grammar.add_pattern(r"\\.")?;
//! grammar[escape].set_capture_scope("0", escape_scope);
//! grammar.add_match(string, escape);
//!
//! let mut renderer = Renderer::new(&grammar, "say \"hi\\n\"\n", root);
//! while let Some(line) = renderer.render_next_line() {
//!     for event in &line.scopes {
//!         // feed begins/ends to a theme or span builder
//!     }
//! }
//! ```

#![deny(missing_docs)]

mod error;
mod grammar;
mod line;
mod renderer;
mod scope;

pub use error::Error;
pub use grammar::{Grammar, Pattern, PatternId, State, StateId};
pub use line::{EventKind, Line, ScopeEvent};
pub use renderer::Renderer;
pub use scope::ScopeName;
