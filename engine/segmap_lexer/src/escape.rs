//! HL7 escape sequences.
//!
//! Delimiter characters never appear literally inside a value; they are
//! written as `\F\`, `\S\`, `\T\`, `\R\` and `\E\` (using the declared escape
//! character). Splitting therefore never has to look at escapes, and decoding
//! only happens when a resolved slice is converted to a value.

use std::borrow::Cow;

use crate::delimiters::Delimiters;

/// Decode the delimiter escape sequences in `text`.
///
/// Borrows when `text` contains no escape character. Sequences other than
/// the five delimiter escapes (`\H\`, `\N\`, `\Xhh\`, ...) and an unterminated
/// escape are kept verbatim.
pub fn unescape<'a>(text: &'a str, delimiters: &Delimiters) -> Cow<'a, str> {
    let esc = delimiters.escape;
    if !text.contains(esc) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(esc) {
        out.push_str(&rest[..start]);
        let after = &rest[start + esc.len_utf8()..];
        let Some(end) = after.find(esc) else {
            // Unterminated escape, keep the tail as is
            out.push_str(&rest[start..]);
            return Cow::Owned(out);
        };
        let code = &after[..end];
        match decode(code, delimiters) {
            Some(c) => out.push(c),
            None => {
                out.push(esc);
                out.push_str(code);
                out.push(esc);
            }
        }
        rest = &after[end + esc.len_utf8()..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode(code: &str, delimiters: &Delimiters) -> Option<char> {
    match code {
        "F" => Some(delimiters.field),
        "S" => Some(delimiters.component),
        "T" => Some(delimiters.subcomponent),
        "R" => Some(delimiters.repetition),
        "E" => Some(delimiters.escape),
        _ => None,
    }
}

/// Encode every delimiter character in `text` as its escape sequence.
///
/// Borrows when `text` contains no delimiter.
pub fn escape<'a>(text: &'a str, delimiters: &Delimiters) -> Cow<'a, str> {
    if !text.chars().any(|c| delimiters.is_delimiter(c)) {
        return Cow::Borrowed(text);
    }

    let esc = delimiters.escape;
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        let code = if c == delimiters.field {
            Some('F')
        } else if c == delimiters.component {
            Some('S')
        } else if c == delimiters.subcomponent {
            Some('T')
        } else if c == delimiters.repetition {
            Some('R')
        } else if c == delimiters.escape {
            Some('E')
        } else {
            None
        };
        match code {
            Some(code) => {
                out.push(esc);
                out.push(code);
                out.push(esc);
            }
            None => out.push(c),
        }
    }
    Cow::Owned(out)
}
