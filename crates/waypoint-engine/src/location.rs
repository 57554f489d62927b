//! Position value objects shared by the mapper, registry and session.

use std::fmt;

use crate::identity::SourceFileIdentity;

/// A 1-based line with an optional 1-based column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub column: Option<u32>,
}

impl Position {
    pub fn new(line: u32, column: Option<u32>) -> Self {
        Self { line, column }
    }

    pub fn line(line: u32) -> Self {
        Self { line, column: None }
    }
}

/// A position inside a specific file.
///
/// Used on both sides of a mapping: the original (authored) file a client
/// sets breakpoints in, and the generated file the runtime executes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: SourceFileIdentity,
    pub position: Position,
}

impl Location {
    pub fn new(file: impl Into<SourceFileIdentity>, line: u32, column: Option<u32>) -> Self {
        Self {
            file: file.into(),
            position: Position::new(line, column),
        }
    }

    pub fn line(&self) -> u32 {
        self.position.line
    }

    pub fn column(&self) -> Option<u32> {
        self.position.column
    }

    pub fn same_line(&self, other: &Location) -> bool {
        self.file == other.file && self.line() == other.line()
    }

    /// Same file and line, and the same column when both sides name one.
    pub fn matches(&self, other: &Location) -> bool {
        if !self.same_line(other) {
            return false;
        }
        match (self.column(), other.column()) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column() {
            Some(col) => write!(f, "{}:{}:{}", self.file, self.line(), col),
            None => write!(f, "{}:{}", self.file, self.line()),
        }
    }
}
