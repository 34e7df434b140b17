//! Common definitions that are shared between different parts of the compiler.

// Use sorted sets and maps for consistent output
pub use std::collections::{BTreeMap as Map, BTreeSet as Set};

/// Identifiers.
pub type Id = internment::Intern<String>;

/// Size in bytes of a machine word on the target. Every Eeyore `OrigVar` size
/// and every Tigger stack slot is expressed as a multiple of this.
pub const WORD_SIZE: i32 = 4;

/// A source location, `(line, column)`, both 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Span {
    pub line: u32,
    pub col: u32,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Monotonically increasing id assigned to each `Expr` node during parsing,
/// used as a side-table key for the type and declaration maps the semantic
/// checker produces instead of an intrusive field on every node.
pub type NodeId = u32;

/// Intern a plain `&str` as an [`Id`].
pub fn intern(s: &str) -> Id {
    internment::Intern::new(s.to_string())
}
