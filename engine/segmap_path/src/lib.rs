//! Field addressing for HL7 v2 messages.
//!
//! [`FieldAddress`] is the notation shared by mapping rules and validation
//! rules; [`resolve`] and [`Message`] turn an address into a slice of the
//! original text without allocating.

pub mod address;
pub mod message;
pub mod resolver;

pub use address::{AddressError, FieldAddress, Level};
pub use message::{Lookup, Message, MessageError};
pub use resolver::{repetitions_in_segment, resolve, resolve_in_segment, ResolvedSlice};
