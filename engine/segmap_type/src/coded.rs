// HL7 coded element (CE)

use segmap_lexer::{components, escape, unescape, Delimiters};

use crate::traits::WireValue;
use crate::value::{Record, Value};

/// A coded value with an optional alternate coding, HL7 data type `CE`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodedElement {
    pub identifier: String,
    pub text: String,
    pub coding_system: String,
    pub alternate_identifier: String,
    pub alternate_text: String,
    pub alternate_coding_system: String,
}

impl CodedElement {
    fn parts(&self) -> [(&'static str, &str); 6] {
        [
            ("identifier", self.identifier.as_str()),
            ("text", self.text.as_str()),
            ("coding_system", self.coding_system.as_str()),
            ("alternate_identifier", self.alternate_identifier.as_str()),
            ("alternate_text", self.alternate_text.as_str()),
            ("alternate_coding_system", self.alternate_coding_system.as_str()),
        ]
    }
}

impl WireValue for CodedElement {
    const TYPE_NAME: &'static str = "CE";

    fn is_empty(&self) -> bool {
        self.parts().iter().all(|(_, part)| part.is_empty())
    }

    fn parse(raw: &str, delimiters: &Delimiters) -> Self {
        let mut parts = components(raw, delimiters).map(|c| unescape(c, delimiters).into_owned());
        let mut next = || parts.next().unwrap_or_default();
        CodedElement {
            identifier: next(),
            text: next(),
            coding_system: next(),
            alternate_identifier: next(),
            alternate_text: next(),
            alternate_coding_system: next(),
        }
    }

    fn to_wire_string(&self, delimiters: &Delimiters) -> String {
        let parts = self.parts();
        let used = parts
            .iter()
            .rposition(|(_, part)| !part.is_empty())
            .map_or(0, |last| last + 1);
        let mut out = String::new();
        for (i, (_, part)) in parts[..used].iter().enumerate() {
            if i > 0 {
                out.push(delimiters.component);
            }
            out.push_str(&escape(part, delimiters));
        }
        out
    }

    fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        if self.identifier.is_empty() && self.text.is_empty() && !self.is_empty() {
            problems.push("identifier or text is required".to_string());
        }
        if !self.coding_system.is_empty() && self.identifier.is_empty() {
            problems.push("coding system given without an identifier".to_string());
        }
        if !self.alternate_identifier.is_empty() && self.alternate_coding_system.is_empty() {
            problems.push("alternate identifier requires an alternate coding system".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    fn to_value(&self) -> Value {
        let mut record = Record::with_capacity(6);
        for (name, part) in self.parts() {
            if !part.is_empty() {
                record.insert(name, Value::from(part));
            }
        }
        Value::Record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const D: Delimiters = Delimiters::DEFAULT;

    #[test]
    fn parses_components_and_unescapes() {
        let ce = CodedElement::parse("I10^Essential \\T\\ primary^ICD10", &D);
        assert_eq!(ce.identifier, "I10");
        assert_eq!(ce.text, "Essential & primary");
        assert_eq!(ce.coding_system, "ICD10");
        assert!(ce.alternate_identifier.is_empty());
    }

    #[test]
    fn wire_string_drops_trailing_empty_components() {
        let ce = CodedElement::parse("I10^Essential \\T\\ primary^ICD10^^^", &D);
        assert_eq!(ce.to_wire_string(&D), "I10^Essential \\T\\ primary^ICD10");
        assert_eq!(CodedElement::default().to_wire_string(&D), "");
    }

    #[test]
    fn validation_collects_every_problem() {
        let ce = CodedElement::parse("^^LN^X1", &D);
        let problems = ce.validate().unwrap_err();
        assert_eq!(problems.len(), 3);
        assert!(CodedElement::parse("I10^^ICD10", &D).validate().is_ok());
    }
}
