//! Logos-based lexer for Objective-C headers and implementation files

use logos::Logos;

/// A token with its kind, text, and position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: ObjcToken,
    pub text: &'a str,
    pub offset: usize,
}

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+|//[^\n]*|/\*([^*]|\*+[^*/])*\*+/")]
pub enum ObjcToken {
    /// Preprocessor line (`#import <AppKit/AppKit.h>`)
    #[regex(r"#[^\n]*")]
    Directive,

    /// `@interface`, `@end`, `@property`, ...
    #[regex(r"@[A-Za-z_][A-Za-z0-9_]*")]
    AtKeyword,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[regex(r#"@?"([^"\\\n]|\\.)*""#)]
    Str,

    #[regex(r"'([^'\\\n]|\\.)*'")]
    Char,

    #[regex(r"[0-9][0-9A-Za-z_.]*")]
    Number,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
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
    #[token("*")]
    Star,
    #[token("^")]
    Caret,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token("=")]
    Eq,
    #[token("...")]
    Ellipsis,

    #[regex(r"[./%&|!~?]")]
    Op,
}

/// Tokenize Objective-C source
///
/// Unrecognized input is returned as `(offset, text)` pairs.
pub fn tokenize(input: &str) -> (Vec<Token<'_>>, Vec<(usize, String)>) {
    let mut lexer = ObjcToken::lexer(input);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    while let Some(result) = lexer.next() {
        let offset = lexer.span().start;
        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                text: lexer.slice(),
                offset,
            }),
            Err(()) => errors.push((offset, lexer.slice().to_string())),
        }
    }

    (tokens, errors)
}
