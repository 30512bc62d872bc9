use std::fmt;

use segmap_cond::ConditionError;
use segmap_lexer::SegmentIdError;
use segmap_order::OrderSpecError;
use segmap_path::{AddressError, FieldAddress};
use segmap_type::ConvertError;
use thiserror::Error;

/// A problem mapping one destination field of one message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// The winning candidate's text did not convert to the field's type.
    #[error("{field}: cannot convert {raw:?} from {address} to {target}: {reason}")]
    Conversion {
        /// Dotted path of the destination field
        field: String,
        target: String,
        address: FieldAddress,
        raw: String,
        reason: String,
    },
    /// No candidate produced a value and the first one is required.
    #[error("{field}: required value at {address} is missing")]
    RequiredFieldMissing { field: String, address: FieldAddress },
}

impl MappingError {
    pub(crate) fn conversion(field: &str, address: FieldAddress, err: ConvertError) -> Self {
        MappingError::Conversion {
            field: field.to_string(),
            target: err.target,
            address,
            raw: err.raw,
            reason: err.reason,
        }
    }

    /// Dotted path of the destination field.
    pub fn field(&self) -> &str {
        match self {
            MappingError::Conversion { field, .. }
            | MappingError::RequiredFieldMissing { field, .. } => field,
        }
    }
}

/// Every field error raised while mapping one message, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingErrors(pub Vec<MappingError>);

impl MappingErrors {
    pub fn iter(&self) -> std::slice::Iter<'_, MappingError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MappingErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} field(s) failed to map", self.0.len())?;
        for err in &self.0 {
            write!(f, "\n  {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MappingErrors {}

impl IntoIterator for MappingErrors {
    type Item = MappingError;
    type IntoIter = std::vec::IntoIter<MappingError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A problem building a mapping spec. `path` names the offending entry,
/// e.g. `Admission.priority.candidates[1]`.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("invalid spec document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{path}: unknown type {name:?}")]
    UnknownType { path: String, name: String },
    #[error("{path}: type {name:?} contains itself ({cycle})")]
    Cycle {
        path: String,
        name: String,
        cycle: String,
    },
    #[error("{path}: at least one candidate is required")]
    NoCandidates { path: String },
    #[error("{path}: invalid address {notation:?}: {source}")]
    Address {
        path: String,
        notation: String,
        source: AddressError,
    },
    #[error("{path}: invalid condition {text:?}: {source}")]
    Condition {
        path: String,
        text: String,
        source: ConditionError,
    },
    #[error("{path}: invalid default: {source}")]
    Default { path: String, source: ConvertError },
    #[error("{path}: {type_name} values need an explicit format")]
    MissingFormat { path: String, type_name: String },
    #[error("{path}: relative address {address} has no base to resolve against")]
    Unanchored { path: String, address: String },
    #[error("{path}: {source}")]
    Segment {
        path: String,
        source: SegmentIdError,
    },
    #[error("{path}: {source}")]
    Order {
        path: String,
        source: OrderSpecError,
    },
    #[error("{path}: {message}")]
    Invalid { path: String, message: String },
}

impl SpecError {
    pub(crate) fn invalid(path: &str, message: impl Into<String>) -> Self {
        SpecError::Invalid {
            path: path.to_string(),
            message: message.into(),
        }
    }
}
