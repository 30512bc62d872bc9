//! Resolution of field addresses against message text.
//!
//! Absence is the normal outcome for optional HL7 content: any level whose
//! position is past the end of what the message carries resolves to
//! [`ResolvedSlice::Absent`] rather than an error.

use log::debug;
use segmap_lexer::{
    components, find_segment, is_header_segment, repetitions, subcomponents, Delimiters,
    SegmentLine,
};

use crate::address::FieldAddress;

/// A view into the message buffer, or nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedSlice<'a> {
    /// The addressed element does not exist in the message
    Absent,
    /// The addressed element, borrowed from the message text
    Present {
        /// The raw (still escaped) text
        text: &'a str,
        /// Byte offset of `text` within the message buffer
        offset: usize,
    },
}

impl<'a> ResolvedSlice<'a> {
    /// Build a slice from a sub-slice of `buf`.
    pub(crate) fn within(buf: &'a str, text: &'a str) -> Self {
        let offset = (text.as_ptr() as usize).saturating_sub(buf.as_ptr() as usize);
        ResolvedSlice::Present { text, offset }
    }

    /// Whether the element is missing.
    pub fn is_absent(&self) -> bool {
        matches!(self, ResolvedSlice::Absent)
    }

    /// Whether the element is missing or present but empty.
    pub fn is_empty(&self) -> bool {
        self.as_str().map_or(true, str::is_empty)
    }

    /// The raw text, if present.
    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            ResolvedSlice::Absent => None,
            ResolvedSlice::Present { text, .. } => Some(text),
        }
    }

    /// The raw text if present and not empty.
    pub fn non_empty(&self) -> Option<&'a str> {
        self.as_str().filter(|text| !text.is_empty())
    }
}

/// Resolve `address` against message text.
///
/// `occurrence` (0-based) selects among repeated segments with the same id.
/// A relative address resolves to [`ResolvedSlice::Absent`]; relative
/// addresses must be rebased before they reach the resolver.
pub fn resolve<'a>(
    buf: &'a str,
    delimiters: &Delimiters,
    address: &FieldAddress,
    occurrence: usize,
) -> ResolvedSlice<'a> {
    let Some(id) = address.segment else {
        debug!("relative address {address} reached the resolver");
        return ResolvedSlice::Absent;
    };
    match find_segment(buf, delimiters, &id, occurrence)
        .and_then(|segment| resolve_in_segment(&segment, delimiters, address))
    {
        Some(text) => ResolvedSlice::within(buf, text),
        None => ResolvedSlice::Absent,
    }
}

/// Walk the levels of `address` inside one segment.
///
/// The segment id of `address` is not checked against `segment`. Without a
/// repetition index a field-level address yields the whole field, while
/// deeper addresses descend into the first repetition.
pub fn resolve_in_segment<'a>(
    segment: &SegmentLine<'a>,
    delimiters: &Delimiters,
    address: &FieldAddress,
) -> Option<&'a str> {
    let Some(field_index) = address.field else {
        return Some(segment.text);
    };
    let field = segment.field(field_index, delimiters)?;

    // MSH-1 and MSH-2 hold the delimiters themselves and cannot be split
    if is_header_segment(&segment.id) && field_index <= 2 {
        let deeper = [address.repetition, address.component, address.subcomponent];
        return deeper
            .iter()
            .all(|index| index.map_or(true, |i| i == 1))
            .then_some(field);
    }

    let repetition = match address.repetition {
        Some(r) => repetitions(field, delimiters).nth(r.checked_sub(1)?)?,
        None if address.component.is_some() => repetitions(field, delimiters).next()?,
        None => field,
    };
    descend(repetition, delimiters, address.component, address.subcomponent)
}

fn descend<'a>(
    repetition: &'a str,
    delimiters: &Delimiters,
    component: Option<usize>,
    subcomponent: Option<usize>,
) -> Option<&'a str> {
    let Some(component) = component else {
        return Some(repetition);
    };
    let component = components(repetition, delimiters).nth(component.checked_sub(1)?)?;
    match subcomponent {
        Some(s) => subcomponents(component, delimiters).nth(s.checked_sub(1)?),
        None => Some(component),
    }
}

/// Every repetition of the field `address` points into, narrowed to the
/// address's component and subcomponent.
///
/// A repetition index on `address` is ignored. Repetitions lacking the
/// requested component are skipped.
pub fn repetitions_in_segment<'a>(
    segment: &SegmentLine<'a>,
    delimiters: &Delimiters,
    address: &FieldAddress,
) -> Vec<&'a str> {
    let Some(field_index) = address.field else {
        return vec![segment.text];
    };
    let Some(field) = segment.field(field_index, delimiters) else {
        return Vec::new();
    };
    if is_header_segment(&segment.id) && field_index <= 2 {
        return vec![field];
    }
    repetitions(field, delimiters)
        .filter_map(|rep| descend(rep, delimiters, address.component, address.subcomponent))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MSG: &str = "MSH|^~\\&|SRC|FAC|DST|HOSP|202501010101||ADT^A01|123|P|2.5\r\
                       PID|1||MRN123^^^HOSP&1.2.3&ISO~ALT9^^^CLINIC||DOE^JOHN||19800115|M\r\
                       OBX|1|NM|HR||72\r\
                       OBX|2|NM|BP||120";

    fn get(notation: &str) -> Option<&'static str> {
        let addr = FieldAddress::parse(notation).unwrap();
        resolve(MSG, &Delimiters::DEFAULT, &addr, 0).as_str()
    }

    #[test]
    fn resolves_each_level() {
        assert_eq!(get("PID.5"), Some("DOE^JOHN"));
        assert_eq!(get("PID.5.1"), Some("DOE"));
        assert_eq!(get("PID.5.2"), Some("JOHN"));
        assert_eq!(get("PID.3.4.2"), Some("1.2.3"));
        assert_eq!(get("PID.8"), Some("M"));
        assert!(get("PID").unwrap().starts_with("PID|1"));
    }

    #[test]
    fn field_without_repetition_index_is_whole_field() {
        assert_eq!(
            get("PID.3"),
            Some("MRN123^^^HOSP&1.2.3&ISO~ALT9^^^CLINIC")
        );
        assert_eq!(get("PID.3.1"), Some("MRN123"));
        assert_eq!(get("PID.3[2]"), Some("ALT9^^^CLINIC"));
        assert_eq!(get("PID.3[2].4"), Some("CLINIC"));
        assert_eq!(get("PID.3[3]"), None);
    }

    #[test]
    fn missing_levels_are_absent() {
        assert_eq!(get("PID.99"), None);
        assert_eq!(get("PID.5.9"), None);
        assert_eq!(get("PID.5.1.2"), None);
        assert_eq!(get("PV1.2"), None);
        assert_eq!(get("PID.2"), Some(""));
    }

    #[test]
    fn component_one_of_a_simple_field_is_the_field() {
        assert_eq!(get("PID.8.1"), Some("M"));
        assert_eq!(get("PID.8.1.1"), Some("M"));
    }

    #[test]
    fn header_fields_are_atomic() {
        assert_eq!(get("MSH.1"), Some("|"));
        assert_eq!(get("MSH.2"), Some("^~\\&"));
        assert_eq!(get("MSH.2.1"), Some("^~\\&"));
        assert_eq!(get("MSH.2.2"), None);
        assert_eq!(get("MSH.9.2"), Some("A01"));
        assert_eq!(get("MSH.12"), Some("2.5"));
    }

    #[test]
    fn occurrence_selects_repeated_segments() {
        let addr = FieldAddress::parse("OBX.5").unwrap();
        let d = Delimiters::DEFAULT;
        assert_eq!(resolve(MSG, &d, &addr, 0).as_str(), Some("72"));
        assert_eq!(resolve(MSG, &d, &addr, 1).as_str(), Some("120"));
        assert!(resolve(MSG, &d, &addr, 2).is_absent());
    }

    #[test]
    fn offsets_point_into_the_buffer() {
        let addr = FieldAddress::parse("PID.5.2").unwrap();
        match resolve(MSG, &Delimiters::DEFAULT, &addr, 0) {
            ResolvedSlice::Present { text, offset } => {
                assert_eq!(&MSG[offset..offset + text.len()], "JOHN");
            }
            ResolvedSlice::Absent => panic!("expected JOHN"),
        }
    }

    #[test]
    fn relative_addresses_are_absent() {
        let addr = FieldAddress::parse("5").unwrap();
        assert!(resolve(MSG, &Delimiters::DEFAULT, &addr, 0).is_absent());
    }

    #[test]
    fn empty_and_absent_are_distinguished() {
        let d = Delimiters::DEFAULT;
        let empty = resolve(MSG, &d, &FieldAddress::parse("PID.2").unwrap(), 0);
        assert!(!empty.is_absent());
        assert!(empty.is_empty());
        assert_eq!(empty.non_empty(), None);
    }
}
