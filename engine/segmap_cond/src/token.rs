use std::ops::Range;

use logos::Logos;

/// Raw token type used by the logos lexer
#[derive(Logos, Debug, PartialEq, Eq, Clone, Copy)]
#[logos(skip r"[ \t\r\n]+")]
pub enum CondToken {
    // Operators
    #[token("==")]
    EqualEqual,
    #[token("!=")]
    NotEqual,
    #[token("&&")]
    AndAnd,

    // Double-quoted literal, may hold spaces and operator characters
    #[regex(r#""[^"]*""#)]
    Quoted,

    // Addresses and bare literals
    #[regex(r#"[^ \t\r\n"=!&]+"#)]
    Word,
}

impl CondToken {
    /// How the token is named in diagnostics
    pub fn describe(&self) -> &'static str {
        match self {
            CondToken::EqualEqual => "'=='",
            CondToken::NotEqual => "'!='",
            CondToken::AndAnd => "'&&'",
            CondToken::Quoted => "quoted literal",
            CondToken::Word => "word",
        }
    }
}

/// A token together with its source text and byte span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    /// The token kind
    pub kind: CondToken,
    /// The exact source text of the token
    pub lexeme: &'a str,
    /// Byte span within the condition text
    pub span: Range<usize>,
}

/// Tokenize a condition; on failure returns the offset of the first
/// character no token starts with.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, usize> {
    let mut lexer = CondToken::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                lexeme: lexer.slice(),
                span,
            }),
            Err(()) => return Err(span.start),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<CondToken> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_comparisons_and_conjunctions() {
        assert_eq!(
            kinds("PV1.2 == E && PID.8 != \"M F\""),
            vec![
                CondToken::Word,
                CondToken::EqualEqual,
                CondToken::Word,
                CondToken::AndAnd,
                CondToken::Word,
                CondToken::NotEqual,
                CondToken::Quoted,
            ]
        );
    }

    #[test]
    fn operators_need_no_spaces() {
        let tokens = tokenize("PV1.2==E").unwrap();
        assert_eq!(tokens[0].lexeme, "PV1.2");
        assert_eq!(tokens[1].kind, CondToken::EqualEqual);
        assert_eq!(tokens[2].lexeme, "E");
        assert_eq!(tokens[2].span, 7..8);
    }

    #[test]
    fn lone_operator_characters_are_rejected() {
        assert_eq!(tokenize("PV1.2 = E"), Err(6));
        assert_eq!(tokenize("A == B & C"), Err(7));
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        assert_eq!(tokenize("PV1.2 == \"E"), Err(9));
    }
}
