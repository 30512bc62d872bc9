//! Conditions over HL7 message fields.
//!
//! The language is deliberately small: `ADDRESS == literal`,
//! `ADDRESS != literal`, and conjunctions joined by `&&`. The empty string is
//! the condition that always holds.

pub mod condition;
pub mod diagnostics;
pub mod parser;
pub mod token;

pub use condition::{evaluate, Condition};
pub use diagnostics::ConditionError;
pub use parser::parse_condition;
