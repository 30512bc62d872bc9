//! segmap lexical layer
//!
//! This crate splits HL7 v2 message text into its hierarchical parts
//! (segments, fields, repetitions, components, subcomponents) without
//! copying. Everything borrows from the caller's buffer.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod delimiters;
pub mod escape;
pub mod segment;
pub mod split;

// Re-export the main types for convenience
pub use delimiters::{DelimiterError, Delimiters};
pub use escape::{escape, unescape};
pub use segment::{
    find_segment, is_header_segment, segment_field, SegmentId, SegmentIdError, SegmentLine,
    Segments,
};
pub use split::{components, fields, repetitions, subcomponents, DelimitedSplit, Lines};
