//! Order assembly for HL7 v2 messages.
//!
//! Orders are not nested in the wire format: an order is a trigger segment
//! (such as `ORC`) followed by the segments that describe it, up to the
//! next trigger. [`OrderGroups`] recovers that grouping in one pass.

pub mod assembly;
pub mod spec;

pub use assembly::{
    assemble, Assembly, AssemblyMode, AssemblyWarning, OrderGroup, OrderGroups, WarningKind,
};
pub use spec::{OrderGroupSpec, OrderGroupSpecBuilder, OrderSpecError, Role};
