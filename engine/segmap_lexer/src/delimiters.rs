use std::fmt;

use log::trace;
use thiserror::Error;

/// Errors raised while reading the delimiter declaration of a header segment.
///
/// Any of these is fatal for the whole message: every slice taken later
/// depends on the five control characters being known.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DelimiterError {
    /// Fewer than eight characters were available.
    #[error("header too short to declare delimiters: found {found} characters, need at least 8")]
    TooShort {
        /// Number of characters that were present
        found: usize,
    },
    /// The first three characters are not a segment id.
    #[error("header does not start with a segment id: {0:?}")]
    InvalidSegmentId(String),
    /// The same character was declared for two roles.
    #[error("delimiter {0:?} is declared more than once")]
    Duplicate(char),
    /// A line terminator or alphanumeric character was declared as a delimiter.
    #[error("{0:?} cannot be used as a delimiter")]
    Reserved(char),
}

/// The five control characters of an HL7 v2 message.
///
/// Derived once from the header segment (`MSH|^~\&`) and immutable for the
/// lifetime of a parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Delimiters {
    /// Separates fields (`|`)
    pub field: char,
    /// Separates components (`^`)
    pub component: char,
    /// Separates repetitions (`~`)
    pub repetition: char,
    /// Introduces escape sequences (`\`)
    pub escape: char,
    /// Separates subcomponents (`&`)
    pub subcomponent: char,
}

impl Delimiters {
    /// The standard delimiters `| ^ ~ \ &`.
    ///
    /// Meant for building messages from scratch. Parsing never falls back to
    /// this value.
    pub const DEFAULT: Delimiters = Delimiters {
        field: '|',
        component: '^',
        repetition: '~',
        escape: '\\',
        subcomponent: '&',
    };

    /// Read the delimiters declared by a header segment such as
    /// `MSH|^~\&|...`.
    ///
    /// The input must start with a three character segment id followed by the
    /// field separator and then the component, repetition, escape and
    /// subcomponent characters, in that order.
    pub fn parse(header: &str) -> Result<Self, DelimiterError> {
        let mut chars = header.chars();
        let mut head = ['\0'; 8];
        let mut found = 0;
        for slot in head.iter_mut() {
            match chars.next() {
                Some(c) => {
                    *slot = c;
                    found += 1;
                }
                None => return Err(DelimiterError::TooShort { found }),
            }
        }

        if !head[..3]
            .iter()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(DelimiterError::InvalidSegmentId(head[..3].iter().collect()));
        }

        let delimiters = Delimiters {
            field: head[3],
            component: head[4],
            repetition: head[5],
            escape: head[6],
            subcomponent: head[7],
        };
        delimiters.check()?;
        trace!("parsed delimiters {delimiters}");
        Ok(delimiters)
    }

    fn check(&self) -> Result<(), DelimiterError> {
        let all = self.as_array();
        for (i, c) in all.iter().enumerate() {
            if matches!(c, '\r' | '\n') || c.is_alphanumeric() {
                return Err(DelimiterError::Reserved(*c));
            }
            if all[i + 1..].contains(c) {
                return Err(DelimiterError::Duplicate(*c));
            }
        }
        Ok(())
    }

    /// The five characters in header order: field, component, repetition,
    /// escape, subcomponent.
    pub fn as_array(&self) -> [char; 5] {
        [
            self.field,
            self.component,
            self.repetition,
            self.escape,
            self.subcomponent,
        ]
    }

    /// The encoding characters as they appear in MSH-2 (`^~\&`).
    pub fn encoding_characters(&self) -> String {
        [
            self.component,
            self.repetition,
            self.escape,
            self.subcomponent,
        ]
        .iter()
        .collect()
    }

    /// Whether `c` is one of the five control characters.
    pub fn is_delimiter(&self, c: char) -> bool {
        self.as_array().contains(&c)
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Delimiters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.field, self.encoding_characters())
    }
}
