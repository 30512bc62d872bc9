//! Segment lines and segment identifiers.

use std::fmt;
use std::str::FromStr;

use log::trace;
use thiserror::Error;

use crate::delimiters::Delimiters;
use crate::split::{fields, Lines};

/// A segment id that is not three ASCII uppercase letters or digits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid segment id {0:?}: expected three uppercase letters or digits")]
pub struct SegmentIdError(pub String);

/// A three character segment identifier such as `PID` or `OBX`.
///
/// Stored inline, so it is `Copy` and comparing two ids never allocates.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId([u8; 3]);

impl SegmentId {
    /// Validate and build a segment id
    pub fn new(id: &str) -> Result<Self, SegmentIdError> {
        let bytes = id.as_bytes();
        if bytes.len() != 3
            || !bytes
                .iter()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        {
            return Err(SegmentIdError(id.to_string()));
        }
        Ok(SegmentId([bytes[0], bytes[1], bytes[2]]))
    }

    /// The id as text
    pub fn as_str(&self) -> &str {
        // Only ASCII bytes are ever stored
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Whether a segment line starts with this id followed by the field
    /// separator (or ends right after the id).
    pub fn matches_line(&self, line: &str, delimiters: &Delimiters) -> bool {
        line.as_bytes().starts_with(&self.0)
            && line[3..]
                .chars()
                .next()
                .map_or(true, |c| c == delimiters.field)
    }
}

impl FromStr for SegmentId {
    type Err = SegmentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SegmentId::new(s)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SegmentId({})", self.as_str())
    }
}

/// Whether `id` names a header segment whose first field is the field
/// separator itself.
pub fn is_header_segment(id: &SegmentId) -> bool {
    matches!(id.as_str(), "MSH" | "FHS" | "BHS")
}

/// One segment of a message, borrowed from the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLine<'a> {
    /// The segment id
    pub id: SegmentId,
    /// The whole line, segment id included, terminator excluded
    pub text: &'a str,
    /// Position of the segment among the segments of the message (0-based)
    pub position: usize,
}

impl<'a> SegmentLine<'a> {
    /// Field `index` of this segment, numbered the HL7 way.
    ///
    /// See [`segment_field`].
    pub fn field(&self, index: usize, delimiters: &Delimiters) -> Option<&'a str> {
        segment_field(self.text, &self.id, index, delimiters)
    }
}

/// Field `index` of a segment line, numbered the HL7 way.
///
/// Index 0 is the segment id. For header segments (`MSH`, `FHS`, `BHS`)
/// field 1 is the field separator and field 2 the encoding characters, so
/// the raw split position is shifted by one from field 2 onwards.
pub fn segment_field<'a>(
    line: &'a str,
    id: &SegmentId,
    index: usize,
    delimiters: &Delimiters,
) -> Option<&'a str> {
    if !is_header_segment(id) {
        return fields(line, delimiters).nth(index);
    }
    match index {
        0 => line.get(..3),
        1 => line.get(3..3 + delimiters.field.len_utf8()),
        n => fields(line, delimiters).nth(n - 1),
    }
}

/// Iterates over the segments of a message, skipping empty lines and lines
/// that do not start with a segment id.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    lines: Lines<'a>,
    delimiters: Delimiters,
    position: usize,
}

impl<'a> Segments<'a> {
    /// Create a segment enumerator over message text
    pub fn new(text: &'a str, delimiters: &Delimiters) -> Self {
        Self {
            lines: Lines::new(text),
            delimiters: *delimiters,
            position: 0,
        }
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = SegmentLine<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        for line in self.lines.by_ref() {
            if line.is_empty() {
                continue;
            }
            let Some(id) = line.get(..3).and_then(|s| SegmentId::new(s).ok()) else {
                trace!("skipping line without segment id: {line:?}");
                continue;
            };
            if !id.matches_line(line, &self.delimiters) {
                trace!("skipping line with malformed segment id: {line:?}");
                continue;
            }
            let position = self.position;
            self.position += 1;
            return Some(SegmentLine {
                id,
                text: line,
                position,
            });
        }
        None
    }
}

/// Locate the `occurrence`-th (0-based) segment with the given id.
pub fn find_segment<'a>(
    text: &'a str,
    delimiters: &Delimiters,
    id: &SegmentId,
    occurrence: usize,
) -> Option<SegmentLine<'a>> {
    Segments::new(text, delimiters)
        .filter(|segment| segment.id == *id)
        .nth(occurrence)
}
