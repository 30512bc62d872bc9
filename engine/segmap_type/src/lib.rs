// Typed values for mapped HL7 fields
pub mod coded;
pub mod converter;
pub mod traits;
pub mod value;

pub use coded::CodedElement;
pub use converter::{ConvertError, Converter};
pub use traits::{ValueParser, Wire, WireValue};
pub use value::{Record, Value};

// Re-exported so callers can build values without naming the crates
pub use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
pub use rust_decimal::Decimal;
