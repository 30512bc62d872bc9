// Seams for value types defined outside the engine

use std::fmt;
use std::marker::PhantomData;

use segmap_lexer::Delimiters;

use crate::value::Value;

/// Converts raw field text into a [`Value`] for a named custom type.
///
/// Implementations are shared by compiled mapping specs and must be
/// stateless with respect to the messages they see.
pub trait ValueParser: Send + Sync + fmt::Debug {
    /// Name used in diagnostics and spec documents
    fn type_name(&self) -> &str;

    /// Parse the raw (still escaped) text of a resolved field.
    fn parse(&self, raw: &str, delimiters: &Delimiters) -> Result<Value, String>;
}

/// A fixed HL7 value type with a known parse/serialize/validate contract.
///
/// The engine never looks inside these types; it parses them from a field
/// slice, asks whether they carry data, validates them and turns them into
/// a [`Value`].
pub trait WireValue: Sized {
    /// Name of the HL7 data type, e.g. `CE`
    const TYPE_NAME: &'static str;

    fn is_empty(&self) -> bool;
    fn parse(raw: &str, delimiters: &Delimiters) -> Self;
    fn to_wire_string(&self, delimiters: &Delimiters) -> String;
    fn validate(&self) -> Result<(), Vec<String>>;
    fn to_value(&self) -> Value;
}

/// Adapts a [`WireValue`] type into a [`ValueParser`].
pub struct Wire<T>(PhantomData<fn() -> T>);

impl<T> Wire<T> {
    pub fn new() -> Self {
        Wire(PhantomData)
    }
}

impl<T> Default for Wire<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: WireValue> fmt::Debug for Wire<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Wire<{}>", T::TYPE_NAME)
    }
}

impl<T: WireValue> ValueParser for Wire<T> {
    fn type_name(&self) -> &str {
        T::TYPE_NAME
    }

    fn parse(&self, raw: &str, delimiters: &Delimiters) -> Result<Value, String> {
        let parsed = T::parse(raw, delimiters);
        if parsed.is_empty() {
            return Ok(Value::Null);
        }
        parsed.validate().map_err(|problems| problems.join("; "))?;
        Ok(parsed.to_value())
    }
}
