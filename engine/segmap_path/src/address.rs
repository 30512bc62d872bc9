//! The compact field notation `SEG.field[rep].component.subcomponent`.
//!
//! Parsed with nom. Absolute addresses start with a segment id; relative
//! addresses are a bare numeric path and only mean something once rebased
//! onto an absolute base.

use std::fmt;
use std::str::FromStr;

use nom::bytes::complete::take_while_m_n;
use nom::character::complete::{char, digit1};
use nom::combinator::{all_consuming, map_res, opt};
use nom::error::Error as NomError;
use nom::sequence::{delimited, pair, preceded, tuple};
use nom::IResult;
use segmap_lexer::SegmentId;
use thiserror::Error;

/// Errors raised while parsing or rebasing a field address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The notation was empty.
    #[error("empty field address")]
    Empty,
    /// The notation does not follow the grammar.
    #[error("invalid field address {notation:?} at position {position}")]
    Syntax {
        /// The offending notation
        notation: String,
        /// Byte offset where parsing stopped
        position: usize,
    },
    /// An index of 0 was given; positions are 1-based.
    #[error("invalid field address {0:?}: positions start at 1")]
    ZeroIndex(String),
    /// A relative address was used as a base.
    #[error("cannot rebase onto relative address {0}")]
    RelativeBase(String),
    /// Rebasing would go deeper than the subcomponent level.
    #[error("rebasing {relative} onto {base} goes below the subcomponent level")]
    RebaseDepth {
        /// The relative address
        relative: String,
        /// The base it was rebased onto
        base: String,
    },
    /// A relative repetition index would land below the field level.
    #[error("relative repetition in {relative} does not land on a field of {base}")]
    RebaseRepetition {
        /// The relative address
        relative: String,
        /// The base it was rebased onto
        base: String,
    },
}

/// The deepest level an address points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// A whole segment
    Segment,
    /// A field (all repetitions, or one when a repetition index is given)
    Field,
    /// A component
    Component,
    /// A subcomponent
    Subcomponent,
}

impl Level {
    fn depth(self) -> usize {
        match self {
            Level::Segment => 0,
            Level::Field => 1,
            Level::Component => 2,
            Level::Subcomponent => 3,
        }
    }
}

/// A parsed field address. All positions are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldAddress {
    /// Segment id; `None` for a relative address
    pub segment: Option<SegmentId>,
    /// Field position
    pub field: Option<usize>,
    /// Repetition position within the field
    pub repetition: Option<usize>,
    /// Component position
    pub component: Option<usize>,
    /// Subcomponent position
    pub subcomponent: Option<usize>,
}

impl FieldAddress {
    /// An address pointing at a whole segment.
    pub fn segment(id: SegmentId) -> Self {
        Self {
            segment: Some(id),
            field: None,
            repetition: None,
            component: None,
            subcomponent: None,
        }
    }

    /// Parse field notation such as `PID.5.1`, `PID.3[2]` or a relative `1.2`.
    pub fn parse(notation: &str) -> Result<Self, AddressError> {
        if notation.is_empty() {
            return Err(AddressError::Empty);
        }
        let parsed = all_consuming(address)(notation);
        let (_, addr) = parsed.map_err(|err| {
            let position = match err {
                nom::Err::Error(e) | nom::Err::Failure(e) => notation.len() - e.input.len(),
                nom::Err::Incomplete(_) => notation.len(),
            };
            AddressError::Syntax {
                notation: notation.to_string(),
                position,
            }
        })?;
        let indices = [addr.field, addr.repetition, addr.component, addr.subcomponent];
        if indices.contains(&Some(0)) {
            return Err(AddressError::ZeroIndex(notation.to_string()));
        }
        Ok(addr)
    }

    /// Set the field position.
    pub fn with_field(mut self, field: usize) -> Self {
        self.field = Some(field);
        self
    }

    /// Set the repetition position.
    pub fn with_repetition(mut self, repetition: usize) -> Self {
        self.repetition = Some(repetition);
        self
    }

    /// Set the component position.
    pub fn with_component(mut self, component: usize) -> Self {
        self.component = Some(component);
        self
    }

    /// Set the subcomponent position.
    pub fn with_subcomponent(mut self, subcomponent: usize) -> Self {
        self.subcomponent = Some(subcomponent);
        self
    }

    /// Whether this address has no segment id.
    pub fn is_relative(&self) -> bool {
        self.segment.is_none()
    }

    /// The deepest level this address points at.
    pub fn level(&self) -> Level {
        if self.subcomponent.is_some() {
            Level::Subcomponent
        } else if self.component.is_some() {
            Level::Component
        } else if self.field.is_some() {
            Level::Field
        } else {
            Level::Segment
        }
    }

    /// Resolve a relative address against `base`.
    ///
    /// An absolute address is returned unchanged. Otherwise the relative path
    /// is placed one level below `base`: `1` against `PID.11` is `PID.11.1`,
    /// `3.1` against `PID` is `PID.3.1`.
    pub fn rebase(&self, base: &FieldAddress) -> Result<FieldAddress, AddressError> {
        if !self.is_relative() {
            return Ok(*self);
        }
        if base.is_relative() {
            return Err(AddressError::RelativeBase(base.to_string()));
        }

        let path: Vec<usize> = [self.field, self.component, self.subcomponent]
            .into_iter()
            .flatten()
            .collect();
        let depth = base.level().depth();
        if depth + path.len() > 3 {
            return Err(AddressError::RebaseDepth {
                relative: self.to_string(),
                base: base.to_string(),
            });
        }
        if self.repetition.is_some() && depth != 0 {
            return Err(AddressError::RebaseRepetition {
                relative: self.to_string(),
                base: base.to_string(),
            });
        }

        let mut out = *base;
        for (slot, index) in (depth..).zip(path) {
            match slot {
                0 => out.field = Some(index),
                1 => out.component = Some(index),
                _ => out.subcomponent = Some(index),
            }
        }
        if self.repetition.is_some() {
            out.repetition = self.repetition;
        }
        Ok(out)
    }
}

impl FromStr for FieldAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldAddress::parse(s)
    }
}

impl fmt::Display for FieldAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        if let Some(segment) = &self.segment {
            write!(f, "{segment}")?;
            sep = ".";
        }
        if let Some(field) = self.field {
            write!(f, "{sep}{field}")?;
            sep = ".";
        }
        if let Some(repetition) = self.repetition {
            write!(f, "[{repetition}]")?;
        }
        if let Some(component) = self.component {
            write!(f, "{sep}{component}")?;
        }
        if let Some(subcomponent) = self.subcomponent {
            write!(f, ".{subcomponent}")?;
        }
        Ok(())
    }
}

// ---- nom grammar ----

fn index(input: &str) -> IResult<&str, usize> {
    map_res(digit1, |s: &str| s.parse::<usize>())(input)
}

fn segment_id(input: &str) -> IResult<&str, SegmentId> {
    map_res(
        take_while_m_n(3, 3, |c: char| c.is_ascii_uppercase() || c.is_ascii_digit()),
        SegmentId::new,
    )(input)
}

type Path = (usize, Option<usize>, Option<usize>, Option<usize>);

// field('['rep']')?('.'component('.'subcomponent)?)?
fn path(input: &str) -> IResult<&str, Path> {
    let (input, (field, repetition)) = pair(
        index,
        opt(delimited(char('['), index, char(']'))),
    )(input)?;
    let (input, rest) = opt(pair(
        preceded(char('.'), index),
        opt(preceded(char('.'), index)),
    ))(input)?;
    let (component, subcomponent) = match rest {
        Some((component, subcomponent)) => (Some(component), subcomponent),
        None => (None, None),
    };
    Ok((input, (field, repetition, component, subcomponent)))
}

fn absolute(input: &str) -> IResult<&str, FieldAddress> {
    let (input, (segment, rest)) = tuple((segment_id, opt(preceded(char('.'), path))))(input)?;
    let mut addr = FieldAddress::segment(segment);
    if let Some((field, repetition, component, subcomponent)) = rest {
        addr.field = Some(field);
        addr.repetition = repetition;
        addr.component = component;
        addr.subcomponent = subcomponent;
    }
    Ok((input, addr))
}

fn relative(input: &str) -> IResult<&str, FieldAddress> {
    let (input, (field, repetition, component, subcomponent)) = path(input)?;
    Ok((
        input,
        FieldAddress {
            segment: None,
            field: Some(field),
            repetition,
            component,
            subcomponent,
        },
    ))
}

fn address(input: &str) -> IResult<&str, FieldAddress, NomError<&str>> {
    if input.starts_with(|c: char| c.is_ascii_digit()) {
        relative(input)
    } else {
        absolute(input)
    }
}
