//! Rule-driven mapping of HL7 v2 messages to typed records.
//!
//! A [`MappingSpec`] is built once, either programmatically from
//! [`ComplexTypeSpec`] and [`FieldRule`] builders or from a JSON
//! [`SpecDocument`], and then maps any number of messages. Each destination
//! field lists candidate addresses tried in order; the first non-empty one
//! wins, otherwise conditional and unconditional defaults apply.

pub mod document;
pub mod engine;
pub mod error;
pub mod rule;

pub use document::{ConverterRegistry, SpecDocument};
pub use engine::{resolve_field, ErrorPolicy, Mapping, MappingSpec, Provenance, Resolved};
pub use error::{MappingError, MappingErrors, SpecError};
pub use rule::{
    CandidateRule, ComplexTypeSpec, ComplexTypeSpecBuilder, Defaults, FieldKind, FieldRule,
    ScalarRule, ScalarRuleBuilder,
};
