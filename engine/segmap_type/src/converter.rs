// Converters from raw field text to typed values

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::trace;
use rust_decimal::Decimal;
use segmap_lexer::{unescape, Delimiters};
use thiserror::Error;

use crate::traits::ValueParser;
use crate::value::Value;

/// A failed conversion of field text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert {raw:?} to {target}: {reason}")]
pub struct ConvertError {
    /// Name of the destination type
    pub target: String,
    /// The raw field text
    pub raw: String,
    pub reason: String,
}

/// How the text of a winning candidate becomes a [`Value`].
#[derive(Debug, Clone)]
pub enum Converter {
    /// Text with HL7 escape sequences decoded
    Text,
    /// Text exactly as it appears on the wire
    Raw,
    Integer,
    Decimal,
    /// `Y`/`N`, `T`/`F`, `true`/`false`, `1`/`0`, case-insensitive
    Boolean,
    /// Dates, date-times and times always carry an explicit chrono format
    Date(String),
    DateTime(String),
    Time(String),
    /// One of a fixed set of variant names, matched exactly
    Enum { name: String, variants: Vec<String> },
    Custom(Arc<dyn ValueParser>),
}

impl Converter {
    pub fn enumeration<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Converter::Enum {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }

    pub fn custom(parser: impl ValueParser + 'static) -> Self {
        Converter::Custom(Arc::new(parser))
    }

    /// Name of the destination type.
    pub fn type_name(&self) -> &str {
        match self {
            Converter::Text => "string",
            Converter::Raw => "raw",
            Converter::Integer => "integer",
            Converter::Decimal => "decimal",
            Converter::Boolean => "boolean",
            Converter::Date(_) => "date",
            Converter::DateTime(_) => "datetime",
            Converter::Time(_) => "time",
            Converter::Enum { name, .. } => name,
            Converter::Custom(parser) => parser.type_name(),
        }
    }

    /// The value a field of this type takes when nothing else supplies one.
    pub fn zero(&self) -> Value {
        match self {
            Converter::Text | Converter::Raw => Value::Text(String::new()),
            Converter::Integer => Value::Integer(0),
            Converter::Decimal => Value::Decimal(Decimal::ZERO),
            Converter::Boolean => Value::Boolean(false),
            Converter::Enum { variants, .. } => variants
                .first()
                .map_or(Value::Null, |first| Value::Enum(first.clone())),
            Converter::Date(_)
            | Converter::DateTime(_)
            | Converter::Time(_)
            | Converter::Custom(_) => Value::Null,
        }
    }

    /// Convert the raw text of a resolved field.
    pub fn convert(&self, raw: &str, delimiters: &Delimiters) -> Result<Value, ConvertError> {
        trace!("converting {raw:?} to {}", self.type_name());
        let fail = |reason: String| ConvertError {
            target: self.type_name().to_string(),
            raw: raw.to_string(),
            reason,
        };
        match self {
            Converter::Text => Ok(Value::Text(unescape(raw, delimiters).into_owned())),
            Converter::Raw => Ok(Value::Text(raw.to_string())),
            Converter::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| fail(e.to_string())),
            Converter::Decimal => Decimal::from_str(raw.trim())
                .map(Value::Decimal)
                .map_err(|e| fail(e.to_string())),
            Converter::Boolean => parse_bool(raw.trim())
                .map(Value::Boolean)
                .ok_or_else(|| fail("expected Y/N, T/F, true/false or 1/0".to_string())),
            Converter::Date(format) => NaiveDate::parse_from_str(raw.trim(), format)
                .map(Value::Date)
                .map_err(|e| fail(format!("{e} (format {format:?})"))),
            Converter::DateTime(format) => NaiveDateTime::parse_from_str(raw.trim(), format)
                .map(Value::DateTime)
                .map_err(|e| fail(format!("{e} (format {format:?})"))),
            Converter::Time(format) => NaiveTime::parse_from_str(raw.trim(), format)
                .map(Value::Time)
                .map_err(|e| fail(format!("{e} (format {format:?})"))),
            Converter::Enum { variants, .. } => variants
                .iter()
                .find(|v| v.as_str() == raw)
                .map(|v| Value::Enum(v.clone()))
                .ok_or_else(|| fail(format!("expected one of {}", variants.join(", ")))),
            Converter::Custom(parser) => parser.parse(raw, delimiters).map_err(fail),
        }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "0" => Some(false),
        _ => None,
    }
}

impl fmt::Display for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Converter::Date(format) | Converter::DateTime(format) | Converter::Time(format) => {
                write!(f, "{}({format})", self.type_name())
            }
            _ => f.write_str(self.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coded::CodedElement;
    use crate::traits::Wire;

    const D: Delimiters = Delimiters::DEFAULT;

    #[test]
    fn text_unescapes_and_raw_does_not() {
        assert_eq!(
            Converter::Text.convert("A\\T\\B", &D).unwrap(),
            Value::from("A&B")
        );
        assert_eq!(
            Converter::Raw.convert("A\\T\\B", &D).unwrap(),
            Value::from("A\\T\\B")
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            Converter::Integer.convert("999", &D).unwrap(),
            Value::Integer(999)
        );
        assert_eq!(
            Converter::Decimal.convert("72.50", &D).unwrap(),
            Value::Decimal(Decimal::new(7250, 2))
        );
        let err = Converter::Integer.convert("12a", &D).unwrap_err();
        assert_eq!(err.target, "integer");
        assert_eq!(err.raw, "12a");
    }

    #[test]
    fn booleans() {
        assert_eq!(Converter::Boolean.convert("Y", &D).unwrap(), Value::Boolean(true));
        assert_eq!(Converter::Boolean.convert("n", &D).unwrap(), Value::Boolean(false));
        assert!(Converter::Boolean.convert("maybe", &D).is_err());
    }

    #[test]
    fn temporal_values_use_the_declared_format() {
        let date = Converter::Date("%Y%m%d".into());
        assert_eq!(
            date.convert("19800115", &D).unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(1980, 1, 15).unwrap())
        );
        let err = date.convert("1980-01-15", &D).unwrap_err();
        assert!(err.reason.contains("%Y%m%d"));

        let dt = Converter::DateTime("%Y%m%d%H%M".into());
        assert!(matches!(
            dt.convert("202501010101", &D).unwrap(),
            Value::DateTime(_)
        ));
        let time = Converter::Time("%H%M".into());
        assert_eq!(
            time.convert("0930", &D).unwrap(),
            Value::Time(NaiveTime::from_hms_opt(9, 30, 0).unwrap())
        );
    }

    #[test]
    fn enums_match_variant_names_exactly() {
        let class = Converter::enumeration("PatientClass", ["E", "I", "O"]);
        assert_eq!(class.convert("I", &D).unwrap(), Value::Enum("I".into()));
        let err = class.convert("i", &D).unwrap_err();
        assert_eq!(err.target, "PatientClass");
        assert_eq!(err.reason, "expected one of E, I, O");
    }

    #[test]
    fn zero_values() {
        assert_eq!(Converter::Text.zero(), Value::from(""));
        assert_eq!(Converter::Integer.zero(), Value::Integer(0));
        assert_eq!(Converter::Decimal.zero(), Value::Decimal(Decimal::ZERO));
        assert_eq!(Converter::Boolean.zero(), Value::Boolean(false));
        assert_eq!(
            Converter::enumeration("PatientClass", ["E", "I"]).zero(),
            Value::Enum("E".into())
        );
        assert_eq!(Converter::Date("%Y%m%d".into()).zero(), Value::Null);
    }

    #[test]
    fn custom_parsers_report_validation_problems() {
        let ce = Converter::custom(Wire::<CodedElement>::new());
        assert_eq!(ce.type_name(), "CE");
        let value = ce.convert("I10^Hypertension^ICD10", &D).unwrap();
        assert_eq!(
            value.as_record().and_then(|r| r.get("text")),
            Some(&Value::from("Hypertension"))
        );
        let err = ce.convert("^^ICD10", &D).unwrap_err();
        assert_eq!(err.target, "CE");
        assert!(err.reason.contains("coding system"));
    }

    #[test]
    fn display_names_the_format() {
        assert_eq!(Converter::Date("%Y%m%d".into()).to_string(), "date(%Y%m%d)");
        assert_eq!(Converter::Integer.to_string(), "integer");
    }
}
