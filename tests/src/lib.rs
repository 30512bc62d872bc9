//! Shared fixtures for the end-to-end scenarios.

/// Spec document mapping admissions and grouping pharmacy orders.
pub const ADMISSION_SPEC: &str = include_str!("../fixtures/admission.json");

/// An emergency admission with no header segment.
pub const EMERGENCY_FRAGMENT: &str = "PID|1||MRN123||DOE^JOHN||19800115|M\rPV1|1|E";

/// A pharmacy order message: two orders, each with one RXO and two RXR.
pub const PHARMACY: &str = "MSH|^~\\&|SRC|FAC|DST|HOSP|202501010101||OMP^O09|1|P|2.5\r\
                            PID|1||MRN123\r\
                            ORC|NW|A1\r\
                            RXO|DRUG1\r\
                            RXR|PO\r\
                            RXR|IV\r\
                            ORC|NW|A2\r\
                            RXO|DRUG2\r\
                            NTE|1||take with food\r\
                            RXR|IM\r\
                            RXR|SC\r";

/// Open a fragment with the standard delimiters.
pub fn fragment(text: &str) -> segmap_path::Message<'_> {
    segmap_path::Message::with_delimiters(text, segmap_lexer::Delimiters::DEFAULT)
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
