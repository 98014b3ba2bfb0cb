//! Native Side
//!
//! Objective-C front-end: lexer, cursor tree, visitor, and the declaration
//! collector used by the FromNative pass.

mod ast;
mod collector;
mod lexer;
mod visitor;

pub use ast::{
    Cursor, CursorCategory, CursorKind, Diagnostic, ParseOptions, Severity, SourceLocation,
    TranslationUnit,
};
pub use collector::{
    DeclarationCollector, NativeAction, NativeDeclaration, NativeDeclarationParser, NativeOutlet,
    NativeParameter, ParseError,
};
pub use visitor::{CursorVisitor, walk};
