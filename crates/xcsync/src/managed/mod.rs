//! Managed Side
//!
//! The C# front-end (lexer, declaration scanner, symbol model) and the reader
//! that turns registered classes into type mappings.

mod lexer;
mod reader;
mod scanner;
mod symbols;

pub use reader::{Discovery, ManagedProjectReader, ReaderError};
pub use scanner::{CompilationError, CompilerFrontEnd, SourceScanner};
pub use symbols::{
    AttributeData, ClassDecl, ClassSymbol, Compilation, MemberDecl, MemberKind, ParameterDecl,
    ScanDiagnostic, find_attribute, is_designer_file,
};
