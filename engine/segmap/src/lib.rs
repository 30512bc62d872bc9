//! segmap: resolve fields in HL7 v2 messages and map them to records.
//!
//! This crate ties the engine crates together behind the operations the
//! `segmap` binary exposes. Each operation takes message and spec text and
//! returns serializable output, so it can be driven from tests or other
//! programs as easily as from the command line.

pub mod config;
pub mod report;

use std::io;
use std::path::Path;

use log::info;
use segmap_lexer::unescape;
use segmap_order::assemble;
use thiserror::Error;

pub use config::EngineConfig;
pub use report::{ExplainReport, OrdersReport, SpecSummary};
pub use segmap_cond::{Condition, ConditionError};
pub use segmap_lexer::{DelimiterError, Delimiters, SegmentId};
pub use segmap_map::{
    ConverterRegistry, ErrorPolicy, MappingError, MappingErrors, MappingSpec, SpecDocument,
    SpecError,
};
pub use segmap_order::{AssemblyMode, OrderGroupSpec};
pub use segmap_path::{AddressError, FieldAddress, Message, MessageError};
pub use segmap_type::{Record, Value};

/// Everything that can stop a driver operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read '{path}': {source}")]
    Read { path: String, source: io::Error },
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error("invalid address {notation:?}: {source}")]
    Address {
        notation: String,
        source: AddressError,
    },
    #[error(transparent)]
    Mapping(#[from] MappingErrors),
    #[error("failed to write output: {0}")]
    Output(#[from] serde_json::Error),
}

impl Error {
    /// Process exit code: 1 for problems in the message data, 2 for
    /// unreadable input or a broken spec.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Mapping(_) => 1,
            _ => 2,
        }
    }
}

/// Read a file, or standard input when no path is given.
pub fn read_input(path: Option<&Path>) -> Result<String, Error> {
    match path {
        Some(path) => std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.display().to_string(),
            source,
        }),
        None => io::read_to_string(io::stdin()).map_err(|source| Error::Read {
            path: "<stdin>".to_string(),
            source,
        }),
    }
}

/// The text at `notation` in the `occurrence`-th (0-based) matching
/// segment, unescaped unless `raw` is set. `None` when absent.
pub fn get_field(
    text: &str,
    notation: &str,
    occurrence: usize,
    raw: bool,
) -> Result<Option<String>, Error> {
    let address = FieldAddress::parse(notation).map_err(|source| Error::Address {
        notation: notation.to_string(),
        source,
    })?;
    let message = Message::parse(text)?;
    let found = message.resolve_nth(&address, occurrence).as_str().map(|slice| {
        if raw {
            slice.to_string()
        } else {
            unescape(slice, message.delimiters()).into_owned()
        }
    });
    Ok(found)
}

/// Map one message with a compiled spec.
pub fn map_message(
    spec: &MappingSpec,
    text: &str,
    config: &EngineConfig,
) -> Result<Record, Error> {
    let message = Message::parse(text)?;
    Ok(spec.map(&message, config.error_policy)?)
}

/// Map one message and report where every scalar value came from.
pub fn explain_message(
    spec: &MappingSpec,
    text: &str,
    config: &EngineConfig,
) -> Result<ExplainReport, Error> {
    let message = Message::parse(text)?;
    let mapping = spec.map_traced(&message, config.error_policy)?;
    Ok(ExplainReport::new(mapping))
}

/// Assemble the order groups of every order spec from one message.
pub fn order_groups<'a>(
    spec: &'a MappingSpec,
    text: &'a str,
    config: &EngineConfig,
) -> Result<OrdersReport<'a>, Error> {
    let message = Message::parse(text)?;
    let mut report = OrdersReport::default();
    for order in spec.orders() {
        let assembly = assemble(&message, order, config.assembly_mode());
        info!(
            "{}: {} group(s), {} warning(s)",
            order.order_type,
            assembly.groups.len(),
            assembly.warnings.len()
        );
        report.extend(assembly);
    }
    Ok(report)
}

/// Compile a spec document and summarize it.
pub fn check_spec(text: &str, registry: &ConverterRegistry) -> Result<SpecSummary, Error> {
    let document = SpecDocument::from_json(text)?;
    let spec = MappingSpec::from_document(&document, registry)?;
    Ok(SpecSummary::new(&document, &spec))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADT: &str = "MSH|^~\\&|SRC|FAC\rPID|1||MRN123||DOE \\T\\ SONS^JOHN\rNK1|1|A\rNK1|2|B";

    #[test]
    fn get_unescapes_unless_raw() {
        assert_eq!(
            get_field(ADT, "PID.5.1", 0, false).unwrap().as_deref(),
            Some("DOE & SONS")
        );
        assert_eq!(
            get_field(ADT, "PID.5.1", 0, true).unwrap().as_deref(),
            Some("DOE \\T\\ SONS")
        );
        assert_eq!(get_field(ADT, "NK1.2", 1, false).unwrap().as_deref(), Some("B"));
        assert_eq!(get_field(ADT, "PID.99", 0, false).unwrap(), None);
    }

    #[test]
    fn exit_codes_separate_data_from_input_problems() {
        let err = get_field(ADT, "PID.0", 0, false).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let err = get_field("PID|1", "PID.1", 0, false).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(Error::Mapping(MappingErrors::default()).exit_code(), 1);
    }
}
