use std::ops::Range;

use thiserror::Error;

use segmap_path::AddressError;

/// Errors raised while parsing a condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    /// A character no token can start with.
    #[error("unexpected character at offset {offset}")]
    UnexpectedCharacter {
        /// Byte offset within the condition
        offset: usize,
    },
    /// A token of the wrong kind, or the end of input, was found.
    #[error("expected {expected} at offset {}, found {found}", span.start)]
    Expected {
        /// What the parser was looking for
        expected: &'static str,
        /// What it found instead
        found: String,
        /// Byte span of the offending token (empty at end of input)
        span: Range<usize>,
    },
    /// The left side of a comparison is not a field address.
    #[error("invalid field address at offset {}: {source}", span.start)]
    InvalidAddress {
        /// The underlying address error
        source: AddressError,
        /// Byte span of the address
        span: Range<usize>,
    },
}

impl ConditionError {
    /// Byte span the error points at.
    pub fn span(&self) -> Range<usize> {
        match self {
            ConditionError::UnexpectedCharacter { offset } => *offset..*offset + 1,
            ConditionError::Expected { span, .. } | ConditionError::InvalidAddress { span, .. } => {
                span.clone()
            }
        }
    }

    /// A short hint about how to fix the condition, when one applies.
    pub fn help(&self, source: &str) -> Option<String> {
        match self {
            ConditionError::UnexpectedCharacter { offset } => {
                match source.get(*offset..).and_then(|rest| rest.chars().next()) {
                    Some('=') => Some("Comparisons use '==', not '='".to_string()),
                    Some('!') => Some("Use '!=' for 'not equal'".to_string()),
                    Some('&') => Some(
                        "Conditions are joined with '&&'; quote literals containing '&'"
                            .to_string(),
                    ),
                    Some('"') => Some("Did you forget a closing '\"'?".to_string()),
                    _ => None,
                }
            }
            ConditionError::Expected { expected, .. } if *expected == "comparison operator" => {
                Some("Write conditions as 'SEG.n == value' or 'SEG.n != value'".to_string())
            }
            ConditionError::Expected { expected, .. } if *expected == "literal" => Some(
                "Put the value to compare with after the operator; use \"\" for empty".to_string(),
            ),
            ConditionError::InvalidAddress { .. } => {
                Some("Addresses look like 'PV1.2', 'PID.3[2].1' or 'PID.11.4.2'".to_string())
            }
            _ => None,
        }
    }

    /// Render the error under the condition text with a caret marker.
    pub fn render(&self, source: &str) -> String {
        let span = self.span();
        let start = source[..span.start.min(source.len())].chars().count();
        let width = source
            .get(span.clone())
            .map_or(1, |s| s.chars().count().max(1));
        let mut out = format!("error: {self}\n  | {source}\n  | ");
        out.push_str(&" ".repeat(start));
        out.push_str(&"^".repeat(width));
        if let Some(help) = self.help(source) {
            out.push_str(&format!("\n  = help: {help}"));
        }
        out
    }
}
