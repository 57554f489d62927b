//! Exception breakpoint filters.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Whether a thrown exception has a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExceptionKind {
    Caught,
    Uncaught,
}

/// A named exception filter the client can enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExceptionFilter {
    /// Pause on every exception.
    All,
    /// Pause only on exceptions nothing catches.
    Uncaught,
    /// Pause only on exceptions a handler will catch.
    Caught,
}

impl ExceptionFilter {
    /// Every filter, in the order they are advertised.
    pub const AVAILABLE: [ExceptionFilter; 3] = [
        ExceptionFilter::All,
        ExceptionFilter::Uncaught,
        ExceptionFilter::Caught,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "all" => Some(ExceptionFilter::All),
            "uncaught" => Some(ExceptionFilter::Uncaught),
            "caught" => Some(ExceptionFilter::Caught),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExceptionFilter::All => "all",
            ExceptionFilter::Uncaught => "uncaught",
            ExceptionFilter::Caught => "caught",
        }
    }

    /// Human-readable label for a client's filter list.
    pub fn label(&self) -> &'static str {
        match self {
            ExceptionFilter::All => "All Exceptions",
            ExceptionFilter::Uncaught => "Uncaught Exceptions",
            ExceptionFilter::Caught => "Caught Exceptions",
        }
    }

    fn applies_to(&self, kind: ExceptionKind) -> bool {
        match self {
            ExceptionFilter::All => true,
            ExceptionFilter::Uncaught => kind == ExceptionKind::Uncaught,
            ExceptionFilter::Caught => kind == ExceptionKind::Caught,
        }
    }
}

impl fmt::Display for ExceptionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The session's active exception filters. Empty means never pause.
#[derive(Debug, Clone, Default)]
pub struct ExceptionFilterManager {
    active: BTreeSet<ExceptionFilter>,
}

impl ExceptionFilterManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active set. Unknown names are logged and skipped.
    ///
    /// Returns the accepted filter names.
    pub fn set_filters<S: AsRef<str>>(&mut self, names: &[S]) -> Vec<String> {
        let mut active = BTreeSet::new();
        for name in names {
            let name = name.as_ref();
            match ExceptionFilter::from_name(name) {
                Some(filter) => {
                    active.insert(filter);
                }
                None => warn!(filter = name, "ignoring unknown exception filter"),
            }
        }
        debug!(?active, "exception filters replaced");
        self.active = active;
        self.active.iter().map(|f| f.name().to_string()).collect()
    }

    pub fn should_pause(&self, kind: ExceptionKind) -> bool {
        self.active.iter().any(|f| f.applies_to(kind))
    }

    pub fn active(&self) -> impl Iterator<Item = ExceptionFilter> + '_ {
        self.active.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
