//! Zero-copy enumerators for each level of the HL7 hierarchy.
//!
//! Every enumerator here is lazy, finite and single-pass. Splitting is exact:
//! `N` delimiter occurrences always yield `N + 1` slices, consecutive
//! delimiters yield empty slices and the text after the last delimiter is
//! yielded even when it is empty.

use std::iter::FusedIterator;

use crate::delimiters::Delimiters;

/// Splits a slice on every occurrence of one delimiter character.
///
/// The same type serves the field, repetition, component and subcomponent
/// levels; only the delimiter differs.
#[derive(Debug, Clone)]
pub struct DelimitedSplit<'a> {
    rest: Option<&'a str>,
    delimiter: char,
}

impl<'a> DelimitedSplit<'a> {
    /// Create an enumerator over `input` splitting on `delimiter`
    pub fn new(input: &'a str, delimiter: char) -> Self {
        Self {
            rest: Some(input),
            delimiter,
        }
    }
}

impl<'a> Iterator for DelimitedSplit<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        match rest.find(self.delimiter) {
            Some(pos) => {
                self.rest = Some(&rest[pos + self.delimiter.len_utf8()..]);
                Some(&rest[..pos])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.rest {
            Some(rest) => (1, Some(rest.len() + 1)),
            None => (0, Some(0)),
        }
    }
}

impl FusedIterator for DelimitedSplit<'_> {}

/// Fields of one segment line, segment id included at position 0.
pub fn fields<'a>(segment: &'a str, delimiters: &Delimiters) -> DelimitedSplit<'a> {
    DelimitedSplit::new(segment, delimiters.field)
}

/// Repetitions of one field.
pub fn repetitions<'a>(field: &'a str, delimiters: &Delimiters) -> DelimitedSplit<'a> {
    DelimitedSplit::new(field, delimiters.repetition)
}

/// Components of one repetition.
pub fn components<'a>(repetition: &'a str, delimiters: &Delimiters) -> DelimitedSplit<'a> {
    DelimitedSplit::new(repetition, delimiters.component)
}

/// Subcomponents of one component.
pub fn subcomponents<'a>(component: &'a str, delimiters: &Delimiters) -> DelimitedSplit<'a> {
    DelimitedSplit::new(component, delimiters.subcomponent)
}

/// Splits message text into lines.
///
/// `\r\n`, `\r` and `\n` each count as one terminator, so a message using
/// any mixture of them produces the same lines.
#[derive(Debug, Clone)]
pub struct Lines<'a> {
    rest: Option<&'a str>,
}

impl<'a> Lines<'a> {
    /// Create a line enumerator over a whole message
    pub fn new(input: &'a str) -> Self {
        Self { rest: Some(input) }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        match rest.find(['\r', '\n']) {
            Some(pos) => {
                let bytes = rest.as_bytes();
                // \r\n is a single terminator
                let width = if bytes[pos] == b'\r' && bytes.get(pos + 1) == Some(&b'\n') {
                    2
                } else {
                    1
                };
                self.rest = Some(&rest[pos + width..]);
                Some(&rest[..pos])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}

impl FusedIterator for Lines<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn consecutive_delimiters_yield_empty_slices() {
        let parts: Vec<_> = DelimitedSplit::new("a|||b", '|').collect();
        assert_eq!(parts, vec!["a", "", "", "b"]);
    }

    #[test]
    fn trailing_delimiter_yields_trailing_empty_slice() {
        let parts: Vec<_> = DelimitedSplit::new("a|b|", '|').collect();
        assert_eq!(parts, vec!["a", "b", ""]);
    }

    #[test]
    fn empty_input_yields_one_empty_slice() {
        let parts: Vec<_> = DelimitedSplit::new("", '^').collect();
        assert_eq!(parts, vec![""]);
    }

    #[test]
    fn multibyte_delimiter_is_supported() {
        let parts: Vec<_> = DelimitedSplit::new("aéb", 'é').collect();
        assert_eq!(parts, vec!["a", "b"]);
    }

    #[test]
    fn split_is_not_restartable() {
        let mut split = DelimitedSplit::new("a^b", '^');
        assert_eq!(split.next(), Some("a"));
        assert_eq!(split.next(), Some("b"));
        assert_eq!(split.next(), None);
        assert_eq!(split.next(), None);
    }

    #[test]
    fn level_helpers_use_their_own_delimiter() {
        let d = Delimiters::DEFAULT;
        assert_eq!(fields("PID|1|2", &d).count(), 3);
        assert_eq!(repetitions("a~b", &d).count(), 2);
        assert_eq!(components("a^b^c", &d).count(), 3);
        assert_eq!(subcomponents("a&b", &d).count(), 2);
    }

    #[test]
    fn lines_accept_every_terminator() {
        let lines: Vec<_> = Lines::new("A\rB\nC\r\nD").collect();
        assert_eq!(lines, vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn lines_keep_empty_lines_between_terminators() {
        let lines: Vec<_> = Lines::new("A\r\rB\n\r\nC\r").collect();
        assert_eq!(lines, vec!["A", "", "B", "", "C", ""]);
    }

    #[test]
    fn lone_terminators_terminate() {
        let lines: Vec<_> = Lines::new("\n\r").collect();
        assert_eq!(lines, vec!["", "", ""]);
    }
}
