//! Breakpoint gating: condition truthiness, hit conditions and log messages.

use serde_json::Value;
use thiserror::Error;

// ── Truthiness ───────────────────────────────────────────────────────────────

/// JavaScript truthiness of an evaluated condition.
///
/// `null`, `false`, `0` and `""` are falsy; arrays and objects are truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Render an evaluated value for log output: strings unquoted, the rest as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── HitCondition ─────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConditionError {
    #[error("invalid hit condition '{0}': expected a count such as 5, >= 5 or % 2")]
    InvalidHitCondition(String),
}

/// Comparison applied to the hit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOperator {
    Equal,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    /// Every Nth hit.
    Multiple,
}

/// A parsed `hitCondition` such as `5`, `== 5`, `>= 5` or `% 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitCondition {
    pub operator: HitOperator,
    pub count: u64,
}

impl HitCondition {
    /// Parse a hit condition. A bare number means "at least N hits".
    pub fn parse(text: &str) -> Result<Self, ConditionError> {
        let invalid = || ConditionError::InvalidHitCondition(text.to_string());
        let trimmed = text.trim();

        let (operator, rest) = [
            (">=", HitOperator::GreaterOrEqual),
            ("<=", HitOperator::LessOrEqual),
            ("===", HitOperator::Equal),
            ("==", HitOperator::Equal),
            ("=", HitOperator::Equal),
            (">", HitOperator::Greater),
            ("<", HitOperator::Less),
            ("%", HitOperator::Multiple),
        ]
        .iter()
        .find_map(|(prefix, op)| trimmed.strip_prefix(prefix).map(|rest| (*op, rest)))
        .unwrap_or((HitOperator::GreaterOrEqual, trimmed));

        let count: u64 = rest.trim().parse().map_err(|_| invalid())?;
        if operator == HitOperator::Multiple && count == 0 {
            return Err(invalid());
        }
        Ok(Self { operator, count })
    }

    /// Whether the breakpoint fires on its `hits`-th (1-based) hit.
    pub fn is_met(&self, hits: u64) -> bool {
        match self.operator {
            HitOperator::Equal => hits == self.count,
            HitOperator::Greater => hits > self.count,
            HitOperator::GreaterOrEqual => hits >= self.count,
            HitOperator::Less => hits < self.count,
            HitOperator::LessOrEqual => hits <= self.count,
            HitOperator::Multiple => hits % self.count == 0,
        }
    }
}

// ── LogTemplate ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    Expression(String),
}

/// A log point message with `{expression}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTemplate {
    parts: Vec<Part>,
}

impl LogTemplate {
    /// Split `message` into literal text and `{...}` expressions.
    ///
    /// An unterminated `{` and empty `{}` are kept as literal text.
    pub fn parse(message: &str) -> Self {
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut rest = message;

        while let Some(open) = rest.find('{') {
            text.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if !after[..close].trim().is_empty() => {
                    if !text.is_empty() {
                        parts.push(Part::Text(std::mem::take(&mut text)));
                    }
                    parts.push(Part::Expression(after[..close].trim().to_string()));
                    rest = &after[close + 1..];
                }
                Some(close) => {
                    text.push_str(&rest[open..open + close + 2]);
                    rest = &after[close + 1..];
                }
                None => {
                    text.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        text.push_str(rest);
        if !text.is_empty() {
            parts.push(Part::Text(text));
        }
        Self { parts }
    }

    /// The expressions to evaluate, in order.
    pub fn expressions(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            Part::Expression(e) => Some(e.as_str()),
            Part::Text(_) => None,
        })
    }

    /// Build the output line, asking `eval` for each placeholder.
    pub fn render<F>(&self, mut eval: F) -> String
    where
        F: FnMut(&str) -> String,
    {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(t) => out.push_str(t),
                Part::Expression(e) => out.push_str(&eval(e)),
            }
        }
        out
    }
}
