use log::trace;
use segmap_path::FieldAddress;

use crate::condition::Condition;
use crate::diagnostics::ConditionError;
use crate::token::{tokenize, CondToken, Token};

/// A stream of tokens from the lexer
struct TokenStream<'s, 'a> {
    /// The tokens being parsed
    tokens: &'s [Token<'a>],
    /// Current position in the token stream
    position: usize,
    /// Length of the source, used to place end-of-input errors
    end: usize,
}

impl<'s, 'a> TokenStream<'s, 'a> {
    fn new(tokens: &'s [Token<'a>], end: usize) -> Self {
        TokenStream {
            tokens,
            position: 0,
            end,
        }
    }

    /// Get the current token without advancing
    fn peek(&self) -> Option<&'s Token<'a>> {
        self.tokens.get(self.position)
    }

    /// Check if we're at the end of input
    fn is_empty(&self) -> bool {
        self.position >= self.tokens.len()
    }

    /// Consume a token of one of the given kinds or report what was found
    fn expect(
        &mut self,
        kinds: &[CondToken],
        expected: &'static str,
    ) -> Result<&'s Token<'a>, ConditionError> {
        match self.peek() {
            Some(token) if kinds.contains(&token.kind) => {
                self.position += 1;
                Ok(token)
            }
            Some(token) => Err(ConditionError::Expected {
                expected,
                found: format!("{} {:?}", token.kind.describe(), token.lexeme),
                span: token.span.clone(),
            }),
            None => Err(ConditionError::Expected {
                expected,
                found: "end of input".to_string(),
                span: self.end..self.end,
            }),
        }
    }
}

/// Parse condition text.
///
/// Grammar: empty, or `comparison ('&&' comparison)*` where a comparison is
/// `ADDRESS ('==' | '!=') LITERAL`. A literal is a bare word or a
/// double-quoted string. `&&` associates to the left.
pub fn parse_condition(source: &str) -> Result<Condition, ConditionError> {
    let tokens =
        tokenize(source).map_err(|offset| ConditionError::UnexpectedCharacter { offset })?;
    let mut stream = TokenStream::new(&tokens, source.len());
    if stream.is_empty() {
        return Ok(Condition::Always);
    }

    let mut condition = parse_comparison(&mut stream)?;
    while !stream.is_empty() {
        stream.expect(&[CondToken::AndAnd], "'&&'")?;
        let rhs = parse_comparison(&mut stream)?;
        condition = Condition::And(Box::new(condition), Box::new(rhs));
    }
    trace!("parsed condition {source:?} as {condition}");
    Ok(condition)
}

fn parse_comparison(stream: &mut TokenStream<'_, '_>) -> Result<Condition, ConditionError> {
    let address = stream.expect(&[CondToken::Word], "field address")?;
    let field = FieldAddress::parse(address.lexeme).map_err(|source| {
        ConditionError::InvalidAddress {
            source,
            span: address.span.clone(),
        }
    })?;

    let op = stream.expect(
        &[CondToken::EqualEqual, CondToken::NotEqual],
        "comparison operator",
    )?;
    let literal = stream.expect(&[CondToken::Word, CondToken::Quoted], "literal")?;
    let value = match literal.kind {
        CondToken::Quoted => literal.lexeme[1..literal.lexeme.len() - 1].to_string(),
        _ => literal.lexeme.to_string(),
    };

    Ok(match op.kind {
        CondToken::NotEqual => Condition::NotEquals(field, value),
        _ => Condition::Equals(field, value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addr(s: &str) -> FieldAddress {
        FieldAddress::parse(s).unwrap()
    }

    #[test]
    fn empty_text_is_always_true() {
        assert_eq!(parse_condition("").unwrap(), Condition::Always);
        assert_eq!(parse_condition("   ").unwrap(), Condition::Always);
    }

    #[test]
    fn parses_single_comparison() {
        assert_eq!(
            parse_condition("PV1.2 == E").unwrap(),
            Condition::Equals(addr("PV1.2"), "E".into())
        );
        assert_eq!(
            parse_condition("PID.8!=M").unwrap(),
            Condition::NotEquals(addr("PID.8"), "M".into())
        );
    }

    #[test]
    fn literal_that_looks_like_an_address_is_a_literal() {
        assert_eq!(
            parse_condition("PV1.3.1 == CCU").unwrap(),
            Condition::Equals(addr("PV1.3.1"), "CCU".into())
        );
    }

    #[test]
    fn quoted_literals_keep_spaces_and_can_be_empty() {
        assert_eq!(
            parse_condition("PID.11.3 == \"NEW YORK\"").unwrap(),
            Condition::Equals(addr("PID.11.3"), "NEW YORK".into())
        );
        assert_eq!(
            parse_condition("PID.2 == \"\"").unwrap(),
            Condition::Equals(addr("PID.2"), String::new())
        );
    }

    #[test]
    fn conjunction_is_left_associative() {
        let parsed = parse_condition("PV1.2 == I && PV1.3.1 == CCU && PID.8 != F").unwrap();
        let expected = Condition::And(
            Box::new(Condition::And(
                Box::new(Condition::Equals(addr("PV1.2"), "I".into())),
                Box::new(Condition::Equals(addr("PV1.3.1"), "CCU".into())),
            )),
            Box::new(Condition::NotEquals(addr("PID.8"), "F".into())),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn reports_missing_parts() {
        assert!(matches!(
            parse_condition("PV1.2 E"),
            Err(ConditionError::Expected { expected: "comparison operator", .. })
        ));
        assert!(matches!(
            parse_condition("PV1.2 =="),
            Err(ConditionError::Expected { expected: "literal", span, .. }) if span == (8..8)
        ));
        assert!(matches!(
            parse_condition("PV1.2 == E PV1.3 == F"),
            Err(ConditionError::Expected { expected: "'&&'", .. })
        ));
        assert!(matches!(
            parse_condition("== E"),
            Err(ConditionError::Expected { expected: "field address", .. })
        ));
    }

    #[test]
    fn reports_bad_addresses() {
        let err = parse_condition("pv1.2 == E").unwrap_err();
        assert!(matches!(err, ConditionError::InvalidAddress { span, .. } if span == (0..5)));
    }

    #[test]
    fn reports_stray_characters() {
        assert_eq!(
            parse_condition("PV1.2 = E"),
            Err(ConditionError::UnexpectedCharacter { offset: 6 })
        );
    }
}
