//! Logos-based lexer for C# declarations
//!
//! Only the token shapes needed to recover type and member declarations are
//! distinguished; keywords are plain identifiers and the scanner compares text.

use logos::Logos;

/// A token with its kind, text, and position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: CsToken,
    pub text: &'a str,
    pub offset: usize,
}

/// An unrecognized character sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub offset: usize,
    pub text: String,
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+|//[^\n]*|/\*([^*]|\*+[^*/])*\*+/")]
pub enum CsToken {
    #[regex(r"#[^\n]*")]
    Directive,

    #[regex(r"@?[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[regex(r#"\$?@?"([^"\\\n]|\\.)*""#)]
    Str,

    #[regex(r"'([^'\\\n]|\\.)*'")]
    Char,

    #[regex(r"[0-9][0-9A-Za-z_.]*")]
    Number,

    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("=")]
    Eq,
    #[token("=>")]
    Arrow,
    #[token("?")]
    Question,
    #[token("*")]
    Star,

    #[regex(r"[+\-/%&|\^!~]")]
    Op,
}

/// Tokenize C# source, dropping preprocessor lines
pub fn tokenize(input: &str) -> (Vec<Token<'_>>, Vec<LexError>) {
    let mut lexer = CsToken::lexer(input);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(CsToken::Directive) => {}
            Ok(kind) => tokens.push(Token {
                kind,
                text: lexer.slice(),
                offset: span.start,
            }),
            Err(()) => errors.push(LexError {
                offset: span.start,
                text: lexer.slice().to_string(),
            }),
        }
    }

    (tokens, errors)
}

/// Strip quotes and the verbatim/interpolation prefix from a string literal
pub fn unquote(text: &str) -> &str {
    let text = text.trim_start_matches(['$', '@']);
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
}
