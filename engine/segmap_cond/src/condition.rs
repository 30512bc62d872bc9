use std::fmt;
use std::str::FromStr;

use log::trace;
use segmap_lexer::Delimiters;
use segmap_path::{AddressError, FieldAddress, Lookup, Message};

use crate::diagnostics::ConditionError;
use crate::parser::parse_condition;

/// A boolean condition over message fields.
///
/// Conditions are immutable once parsed and hold no per-message state, so
/// one condition can be evaluated against any number of messages, in any
/// order, from any thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// No condition; always true
    Always,
    /// The addressed text equals the literal exactly
    Equals(FieldAddress, String),
    /// The addressed text differs from the literal, or is absent
    NotEquals(FieldAddress, String),
    /// Both sides hold; the right side is skipped when the left fails
    And(Box<Condition>, Box<Condition>),
}

impl Condition {
    /// Parse condition text such as `PV1.2 == E && PID.8 != M`.
    pub fn parse(source: &str) -> Result<Self, ConditionError> {
        parse_condition(source)
    }

    /// Whether this is the empty condition.
    pub fn is_always(&self) -> bool {
        matches!(self, Condition::Always)
    }

    /// Evaluate against anything addresses can be resolved against.
    ///
    /// Comparison is on the raw text of the resolved slice: case-sensitive,
    /// untrimmed, escapes not decoded. An absent slice makes `==` false and
    /// `!=` true.
    pub fn evaluate<'a, L: Lookup<'a> + ?Sized>(&self, lookup: &L) -> bool {
        match self {
            Condition::Always => true,
            Condition::Equals(address, literal) => {
                let found = lookup.lookup(address);
                trace!("{address} = {:?}, expecting {literal:?}", found.as_str());
                found.as_str() == Some(literal.as_str())
            }
            Condition::NotEquals(address, literal) => {
                let found = lookup.lookup(address);
                trace!("{address} = {:?}, rejecting {literal:?}", found.as_str());
                found.as_str() != Some(literal.as_str())
            }
            Condition::And(lhs, rhs) => lhs.evaluate(lookup) && rhs.evaluate(lookup),
        }
    }

    /// Rebase every relative address in this condition onto `base`.
    pub fn rebase(&self, base: &FieldAddress) -> Result<Condition, AddressError> {
        Ok(match self {
            Condition::Always => Condition::Always,
            Condition::Equals(address, literal) => {
                Condition::Equals(address.rebase(base)?, literal.clone())
            }
            Condition::NotEquals(address, literal) => {
                Condition::NotEquals(address.rebase(base)?, literal.clone())
            }
            Condition::And(lhs, rhs) => {
                Condition::And(Box::new(lhs.rebase(base)?), Box::new(rhs.rebase(base)?))
            }
        })
    }

    /// Every address the condition reads, left to right.
    pub fn addresses(&self) -> Vec<&FieldAddress> {
        let mut out = Vec::new();
        self.collect_addresses(&mut out);
        out
    }

    fn collect_addresses<'c>(&'c self, out: &mut Vec<&'c FieldAddress>) {
        match self {
            Condition::Always => {}
            Condition::Equals(address, _) | Condition::NotEquals(address, _) => out.push(address),
            Condition::And(lhs, rhs) => {
                lhs.collect_addresses(out);
                rhs.collect_addresses(out);
            }
        }
    }
}

impl Default for Condition {
    fn default() -> Self {
        Condition::Always
    }
}

impl FromStr for Condition {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Condition::parse(s)
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, literal: &str) -> fmt::Result {
    let bare = !literal.is_empty()
        && !literal
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '=' | '!' | '&'));
    if bare {
        f.write_str(literal)
    } else {
        write!(f, "\"{literal}\"")
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Always => Ok(()),
            Condition::Equals(address, literal) => {
                write!(f, "{address} == ")?;
                write_literal(f, literal)
            }
            Condition::NotEquals(address, literal) => {
                write!(f, "{address} != ")?;
                write_literal(f, literal)
            }
            Condition::And(lhs, rhs) => write!(f, "{lhs} && {rhs}"),
        }
    }
}

/// Evaluate `condition` against raw message text with known delimiters.
pub fn evaluate(buf: &str, delimiters: &Delimiters, condition: &Condition) -> bool {
    let message = Message::with_delimiters(buf, *delimiters);
    condition.evaluate(&message)
}
