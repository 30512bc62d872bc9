use log::debug;
use segmap_lexer::{is_header_segment, DelimiterError, Delimiters, SegmentId, SegmentLine, Segments};
use thiserror::Error;

use crate::address::FieldAddress;
use crate::resolver::{repetitions_in_segment, resolve_in_segment, ResolvedSlice};

/// Errors raised while opening a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessageError {
    /// The first segment is not a header segment (`MSH`, `FHS`, `BHS`).
    #[error("message does not start with a header segment, found {found:?}")]
    MissingHeader {
        /// The first line of the message, truncated
        found: String,
    },
    /// The header does not declare usable delimiters.
    #[error(transparent)]
    Delimiters(#[from] DelimiterError),
}

/// A message opened for resolution.
///
/// Holds the delimiters and an index of the segment lines, both computed
/// once. Every slice handed out borrows from the original text, so a
/// `Message` and everything resolved through it cannot outlive that text.
#[derive(Debug, Clone)]
pub struct Message<'a> {
    text: &'a str,
    delimiters: Delimiters,
    segments: Vec<SegmentLine<'a>>,
}

impl<'a> Message<'a> {
    /// Open a message whose first segment is a header declaring the delimiters.
    pub fn parse(text: &'a str) -> Result<Self, MessageError> {
        let header = segmap_lexer::Lines::new(text)
            .find(|line| !line.is_empty())
            .unwrap_or("");
        let is_header = header
            .get(..3)
            .and_then(|id| SegmentId::new(id).ok())
            .is_some_and(|id| is_header_segment(&id));
        if !is_header {
            return Err(MessageError::MissingHeader {
                found: header.chars().take(16).collect(),
            });
        }
        let delimiters = Delimiters::parse(header)?;
        Ok(Self::with_delimiters(text, delimiters))
    }

    /// Open message text with known delimiters, for fragments that carry no
    /// header segment.
    pub fn with_delimiters(text: &'a str, delimiters: Delimiters) -> Self {
        let segments: Vec<_> = Segments::new(text, &delimiters).collect();
        debug!("indexed {} segments", segments.len());
        Self {
            text,
            delimiters,
            segments,
        }
    }

    /// The message text.
    pub fn text(&self) -> &'a str {
        self.text
    }

    /// The message delimiters.
    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    /// All segments in message order.
    pub fn segments(&self) -> &[SegmentLine<'a>] {
        &self.segments
    }

    /// Segments with the given id, in message order.
    pub fn occurrences(&self, id: SegmentId) -> impl Iterator<Item = &SegmentLine<'a>> + '_ {
        self.segments.iter().filter(move |segment| segment.id == id)
    }

    /// The `occurrence`-th (0-based) segment with the given id.
    pub fn segment(&self, id: SegmentId, occurrence: usize) -> Option<&SegmentLine<'a>> {
        self.occurrences(id).nth(occurrence)
    }

    /// Number of segments with the given id.
    pub fn count(&self, id: SegmentId) -> usize {
        self.occurrences(id).count()
    }

    /// Resolve an address in the first occurrence of its segment.
    pub fn resolve(&self, address: &FieldAddress) -> ResolvedSlice<'a> {
        self.resolve_nth(address, 0)
    }

    /// Resolve an address in the `occurrence`-th occurrence of its segment.
    pub fn resolve_nth(&self, address: &FieldAddress, occurrence: usize) -> ResolvedSlice<'a> {
        let Some(id) = address.segment else {
            debug!("relative address {address} reached the resolver");
            return ResolvedSlice::Absent;
        };
        self.segment(id, occurrence)
            .map_or(ResolvedSlice::Absent, |segment| self.resolve_in(segment, address))
    }

    /// Resolve an address in one segment line of this message, whatever
    /// segment the address names.
    pub fn resolve_in(&self, segment: &SegmentLine<'a>, address: &FieldAddress) -> ResolvedSlice<'a> {
        resolve_in_segment(segment, &self.delimiters, address).map_or(ResolvedSlice::Absent, |text| {
            ResolvedSlice::within(self.text, text)
        })
    }

    /// Every repetition of the addressed field in the first occurrence of
    /// its segment.
    pub fn repetitions_of(&self, address: &FieldAddress) -> Vec<&'a str> {
        self.repetitions_nth(address, 0)
    }

    /// Every repetition of the addressed field in the `occurrence`-th
    /// occurrence of its segment, narrowed to the address's component path.
    pub fn repetitions_nth(&self, address: &FieldAddress, occurrence: usize) -> Vec<&'a str> {
        address
            .segment
            .and_then(|id| self.segment(id, occurrence))
            .map(|segment| self.repetitions_in(segment, address))
            .unwrap_or_default()
    }

    /// Every repetition of the addressed field in one segment line.
    pub fn repetitions_in(&self, segment: &SegmentLine<'a>, address: &FieldAddress) -> Vec<&'a str> {
        repetitions_in_segment(segment, &self.delimiters, address)
    }
}

/// Anything field addresses can be resolved against.
///
/// Conditions and mapping rules resolve through this trait so that callers
/// can narrow lookups, for example to one occurrence of a repeating segment.
pub trait Lookup<'a> {
    /// Resolve `address`.
    fn lookup(&self, address: &FieldAddress) -> ResolvedSlice<'a>;
}

impl<'a> Lookup<'a> for Message<'a> {
    fn lookup(&self, address: &FieldAddress) -> ResolvedSlice<'a> {
        self.resolve(address)
    }
}
