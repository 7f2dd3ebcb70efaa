//! Logos-based lexer for schema files.

use std::ops::Range;

use logos::{Lexer, Logos};

/// Byte range of a token in the source.
pub type Span = Range<usize>;

/// Schema tokens. Whitespace is skipped; comments are kept so the parser can
/// surface them as elements.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    #[regex(r"//[^\n]*", |lex| lex.slice()[2..].trim().to_string())]
    LineComment(String),

    #[token("/*", block_comment)]
    BlockComment(String),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"0[xX][0-9a-fA-F]+|[0-9]+", |lex| lex.slice().to_string())]
    Int(String),

    #[regex(
        r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?|[0-9]+[eE][+-]?[0-9]+|\.[0-9]+([eE][+-]?[0-9]+)?",
        |lex| lex.slice().to_string()
    )]
    Float(String),

    #[regex(r#""([^"\\\n]|\\.)*""#, unquote)]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, unquote)]
    Str(String),

    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("=")]
    Eq,
    #[token(":")]
    Colon,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token("/")]
    Slash,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("<")]
    LAngle,
    #[token(">")]
    RAngle,
}

impl Token {
    pub fn is_comment(&self) -> bool {
        matches!(self, Token::LineComment(_) | Token::BlockComment(_))
    }

    /// Source-like text of the token, used for option values and messages.
    pub fn text(&self) -> String {
        match self {
            Token::LineComment(s) => format!("// {s}"),
            Token::BlockComment(s) => format!("/* {s} */"),
            Token::Ident(s) | Token::Int(s) | Token::Float(s) => s.clone(),
            Token::Str(s) => format!("{s:?}"),
            Token::Semi => ";".into(),
            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::Eq => "=".into(),
            Token::Colon => ":".into(),
            Token::Minus => "-".into(),
            Token::Plus => "+".into(),
            Token::Slash => "/".into(),
            Token::LBrace => "{".into(),
            Token::RBrace => "}".into(),
            Token::LBracket => "[".into(),
            Token::RBracket => "]".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::LAngle => "<".into(),
            Token::RAngle => ">".into(),
        }
    }
}

/// Consumes a block comment body up to and including the closing `*/`.
fn block_comment(lex: &mut Lexer<Token>) -> Option<String> {
    let rest = lex.remainder();
    let end = rest.find("*/")?;
    let body = rest[..end].trim().to_string();
    lex.bump(end + 2);
    Some(body)
}

/// Strips the quotes of a string literal and decodes simple escapes.
fn unquote(lex: &mut Lexer<Token>) -> String {
    let raw = lex.slice();
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Tokenizes `source`, returning the span of the first unrecognized input on failure.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>, Span> {
    let mut tokens = Vec::new();
    for (token, span) in Token::lexer(source).spanned() {
        match token {
            Ok(t) => tokens.push((t, span)),
            Err(()) => return Err(span),
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    #[test]
    fn test_field_tokens() {
        assert_eq!(
            kinds("repeated a.B items = 3;"),
            vec![
                Token::Ident("repeated".into()),
                Token::Ident("a".into()),
                Token::Dot,
                Token::Ident("B".into()),
                Token::Ident("items".into()),
                Token::Eq,
                Token::Int("3".into()),
                Token::Semi,
            ]
        );
    }

    #[test]
    fn test_comments_are_kept() {
        let tokens = kinds("// hello\n/* multi\n * line **/ x");
        assert_eq!(tokens[0], Token::LineComment("hello".into()));
        assert!(matches!(&tokens[1], Token::BlockComment(body) if body.starts_with("multi")));
        assert_eq!(tokens[2], Token::Ident("x".into()));
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(kinds(r#""a\"b""#), vec![Token::Str("a\"b".into())]);
        assert_eq!(kinds("'single'"), vec![Token::Str("single".into())]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("0x1F"), vec![Token::Int("0x1F".into())]);
        assert_eq!(kinds("1.5e3"), vec![Token::Float("1.5e3".into())]);
    }

    #[test]
    fn test_unknown_character_reports_span() {
        assert_eq!(tokenize("message ?"), Err(8..9));
    }
}
