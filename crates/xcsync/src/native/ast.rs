//! Native AST
//!
//! A libclang-style cursor tree for the Objective-C declaration subset that UI
//! bindings use, together with the diagnostics reported while building it.
//! Bodies, expressions and C declarations are skipped, not modelled.

use std::fmt;
use std::path::PathBuf;

use super::lexer::{self, ObjcToken, Token};
use crate::project::TargetPlatform;
use crate::text::LineIndex;

// ─────────────────────────────────────────────────────────────────────────────
// Cursors
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of a node in the cursor tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorKind {
    TranslationUnit,
    ObjCInterfaceDecl,
    ObjCImplementationDecl,
    ObjCCategoryDecl,
    ObjCProtocolDecl,
    ObjCForwardClassDecl,
    ObjCPropertyDecl,
    ObjCInstanceMethodDecl,
    ObjCClassMethodDecl,
    ParmDecl,
    ObjCSynthesizeDecl,
    ObjCSuperClassRef,
    ObjCProtocolRef,
    TypeRef,
    IBOutletAttr,
    IBOutletCollectionAttr,
    IBActionAttr,
    CompoundStmt,
    InclusionDirective,
}

/// Coarse node category used for visitor dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorCategory {
    Attribute,
    Declaration,
    Reference,
    Statement,
    Other,
}

impl CursorKind {
    pub fn category(self) -> CursorCategory {
        match self {
            Self::IBOutletAttr | Self::IBOutletCollectionAttr | Self::IBActionAttr => {
                CursorCategory::Attribute
            }
            Self::ObjCInterfaceDecl
            | Self::ObjCImplementationDecl
            | Self::ObjCCategoryDecl
            | Self::ObjCProtocolDecl
            | Self::ObjCForwardClassDecl
            | Self::ObjCPropertyDecl
            | Self::ObjCInstanceMethodDecl
            | Self::ObjCClassMethodDecl
            | Self::ParmDecl
            | Self::ObjCSynthesizeDecl => CursorCategory::Declaration,
            Self::ObjCSuperClassRef | Self::ObjCProtocolRef | Self::TypeRef => {
                CursorCategory::Reference
            }
            Self::CompoundStmt => CursorCategory::Statement,
            Self::TranslationUnit | Self::InclusionDirective => CursorCategory::Other,
        }
    }
}

/// 1-based line/column position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A node in the cursor tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub kind: CursorKind,
    /// Name of the entity (class name, selector, property name, ...)
    pub spelling: String,
    /// Type spelling for properties, parameters and method results
    pub type_name: Option<String>,
    pub location: SourceLocation,
    pub children: Vec<Cursor>,
}

impl Cursor {
    fn new(kind: CursorKind, spelling: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            kind,
            spelling: spelling.into(),
            type_name: None,
            location,
            children: Vec::new(),
        }
    }

    fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Direct children of a given kind
    pub fn children_of(&self, kind: CursorKind) -> impl Iterator<Item = &Cursor> {
        self.children.iter().filter(move |c| c.kind == kind)
    }

    /// Whether any direct child has the given kind
    pub fn has_child(&self, kind: CursorKind) -> bool {
        self.children.iter().any(|c| c.kind == kind)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Diagnostics & Options
// ─────────────────────────────────────────────────────────────────────────────

/// Diagnostic severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Note,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: SourceLocation,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.location, self.severity, self.message)
    }
}

/// Front-end flags (language mode, target triple, SDK root)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    pub language: String,
    pub target: Option<String>,
    pub sdk_root: Option<PathBuf>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            language: "objective-c".to_string(),
            target: None,
            sdk_root: None,
        }
    }
}

impl ParseOptions {
    /// Options for a target platform
    pub fn for_platform(platform: TargetPlatform, sdk_root: Option<PathBuf>) -> Self {
        let target = match platform {
            TargetPlatform::MacOs => "arm64-apple-macos",
            TargetPlatform::MacCatalyst => "arm64-apple-ios-macabi",
            TargetPlatform::Ios => "arm64-apple-ios",
            TargetPlatform::TvOs => "arm64-apple-tvos",
        };
        Self {
            target: Some(target.to_string()),
            sdk_root,
            ..Self::default()
        }
    }

    /// The options as command-line style arguments
    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec!["-x".to_string(), self.language.clone()];
        if let Some(target) = &self.target {
            args.push("-target".to_string());
            args.push(target.clone());
        }
        if let Some(sdk) = &self.sdk_root {
            args.push("-isysroot".to_string());
            args.push(sdk.display().to_string());
        }
        args
    }
}

/// A parsed source file
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    pub root: Cursor,
    pub diagnostics: Vec<Diagnostic>,
    /// Arguments the unit was parsed with
    pub arguments: Vec<String>,
}

impl TranslationUnit {
    /// Parse source text into a cursor tree
    pub fn parse(source: &str, options: &ParseOptions) -> Self {
        let (tokens, errors) = lexer::tokenize(source);
        let mut parser = Parser {
            tokens,
            pos: 0,
            lines: LineIndex::new(source),
            end: source.len(),
            diagnostics: Vec::new(),
        };
        for (offset, text) in errors {
            let location = parser.location(offset);
            parser.report(Severity::Error, location, format!("invalid character '{text}'"));
        }

        let mut root = Cursor::new(
            CursorKind::TranslationUnit,
            "",
            SourceLocation { line: 1, column: 1 },
        );
        root.children = parser.parse_top_level();

        Self {
            root,
            diagnostics: parser.diagnostics,
            arguments: options.arguments(),
        }
    }

    /// Diagnostics at or above `Error`
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity >= Severity::Error)
    }

    /// Whether the unit is unusable
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parser
// ─────────────────────────────────────────────────────────────────────────────

const TYPE_QUALIFIERS: &[&str] = &[
    "const",
    "volatile",
    "unsigned",
    "signed",
    "__weak",
    "__strong",
    "__unsafe_unretained",
    "__autoreleasing",
    "__kindof",
    "__block",
    "nonnull",
    "nullable",
    "_Nonnull",
    "_Nullable",
    "__nonnull",
    "__nullable",
    "IBInspectable",
    "IBOutlet",
];

const NON_CLASS_TYPES: &[&str] = &["id", "BOOL", "SEL", "Class", "IMP", "instancetype"];

fn is_class_type(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_uppercase()) && !NON_CLASS_TYPES.contains(&name)
}

/// The meaningful type name among the identifiers of a type spelling
fn type_spelling(words: &[Token<'_>]) -> Option<String> {
    let word = words
        .iter()
        .rev()
        .find(|w| !TYPE_QUALIFIERS.contains(&w.text))?;
    Some(match word.text {
        "IBAction" => "void".to_string(),
        other => other.to_string(),
    })
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    lines: LineIndex,
    end: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<ObjcToken> {
        self.peek().map(|t| t.kind)
    }

    fn peek_kind_at(&self, n: usize) -> Option<ObjcToken> {
        self.tokens.get(self.pos + n).map(|t| t.kind)
    }

    fn bump(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: ObjcToken) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn location(&self, offset: usize) -> SourceLocation {
        SourceLocation {
            line: self.lines.line(offset),
            column: self.lines.column(offset),
        }
    }

    fn here(&self) -> SourceLocation {
        let offset = self.peek().map(|t| t.offset).unwrap_or(self.end);
        self.location(offset)
    }

    fn report(&mut self, severity: Severity, location: SourceLocation, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            message: message.into(),
            location,
        });
    }

    fn expect_ident(&mut self, what: &str) -> Option<Token<'a>> {
        if self.peek_kind() == Some(ObjcToken::Ident) {
            return self.bump();
        }
        let found = self
            .peek()
            .map(|t| format!("'{}'", t.text))
            .unwrap_or_else(|| "end of file".to_string());
        let location = self.here();
        self.report(Severity::Error, location, format!("expected {what}, found {found}"));
        None
    }

    /// Skip a bracketed group starting at the current opener
    fn skip_balanced(&mut self) {
        let mut depth = 0usize;
        while let Some(kind) = self.peek_kind() {
            self.pos += 1;
            match kind {
                ObjcToken::LParen | ObjcToken::LBrace | ObjcToken::LBracket => depth += 1,
                ObjcToken::RParen | ObjcToken::RBrace | ObjcToken::RBracket => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
        if depth > 0 {
            let location = self.here();
            self.report(Severity::Fatal, location, "unexpected end of file inside a block");
        }
    }

    /// Skip `<...>` (generic arguments, protocol qualifiers)
    fn skip_angles(&mut self) {
        let mut depth = 0usize;
        while let Some(kind) = self.peek_kind() {
            match kind {
                ObjcToken::Lt => depth += 1,
                ObjcToken::Gt => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.pos += 1;
                        return;
                    }
                }
                ObjcToken::Semi => return,
                _ => {}
            }
            self.pos += 1;
        }
    }

    /// Skip one declaration or statement we do not model
    fn skip_declaration(&mut self) {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(kind) = self.peek_kind() {
            match kind {
                ObjcToken::AtKeyword | ObjcToken::Directive if depth == 0 && self.pos > start => {
                    return;
                }
                ObjcToken::LParen | ObjcToken::LBrace | ObjcToken::LBracket => depth += 1,
                ObjcToken::RParen | ObjcToken::RBracket => depth = depth.saturating_sub(1),
                ObjcToken::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.pos += 1;
                        self.eat(ObjcToken::Semi);
                        return;
                    }
                }
                ObjcToken::Semi if depth == 0 => {
                    self.pos += 1;
                    return;
                }
                _ => {}
            }
            self.pos += 1;
        }
        if depth > 0 {
            let location = self.here();
            self.report(Severity::Fatal, location, "unexpected end of file inside a block");
        }
    }

    /// Consume through the next `@end`
    fn recover_to_end(&mut self) {
        while let Some(token) = self.bump() {
            if token.kind == ObjcToken::AtKeyword && token.text == "@end" {
                return;
            }
        }
    }

    /// Identifiers of a parenthesized type, consuming the parentheses
    fn type_in_parens(&mut self) -> Vec<Token<'a>> {
        let mut words = Vec::new();
        let mut depth = 0usize;
        while let Some(token) = self.peek().cloned() {
            match token.kind {
                ObjcToken::LParen => depth += 1,
                ObjcToken::RParen => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.pos += 1;
                        return words;
                    }
                }
                ObjcToken::Lt => {
                    self.skip_angles();
                    continue;
                }
                ObjcToken::Ident if depth == 1 => words.push(token),
                ObjcToken::Semi | ObjcToken::AtKeyword => break,
                _ => {}
            }
            self.pos += 1;
        }
        let location = self.here();
        self.report(Severity::Error, location, "expected ')' to close type");
        words
    }

    fn parse_top_level(&mut self) -> Vec<Cursor> {
        let mut children = Vec::new();
        while let Some(token) = self.peek().cloned() {
            let location = self.location(token.offset);
            match (token.kind, token.text) {
                (ObjcToken::Directive, text) => {
                    self.pos += 1;
                    if let Some(path) = inclusion_path(text) {
                        children.push(Cursor::new(CursorKind::InclusionDirective, path, location));
                    }
                }
                (ObjcToken::AtKeyword, "@interface") => children.extend(self.parse_interface()),
                (ObjcToken::AtKeyword, "@implementation") => {
                    children.extend(self.parse_implementation())
                }
                (ObjcToken::AtKeyword, "@protocol") => children.extend(self.parse_protocol()),
                (ObjcToken::AtKeyword, "@class") => children.extend(self.parse_forward_classes()),
                (ObjcToken::AtKeyword, "@end") => {
                    self.pos += 1;
                    self.report(
                        Severity::Error,
                        location,
                        "'@end' must appear in an Objective-C container",
                    );
                }
                _ => self.skip_declaration(),
            }
        }
        children
    }

    fn parse_interface(&mut self) -> Option<Cursor> {
        let at = self.here();
        self.pos += 1;
        let Some(name) = self.expect_ident("class name after '@interface'") else {
            self.recover_to_end();
            return None;
        };

        let mut cursor = if self.eat(ObjcToken::LParen) {
            let category = match self.peek_kind() {
                Some(ObjcToken::Ident) => self.bump().map(|t| t.text).unwrap_or(""),
                _ => "",
            };
            if !self.eat(ObjcToken::RParen) {
                let location = self.here();
                self.report(Severity::Error, location, "expected ')' after category name");
            }
            let mut cursor = Cursor::new(CursorKind::ObjCCategoryDecl, category, at);
            cursor.children.push(Cursor::new(
                CursorKind::TypeRef,
                name.text,
                self.location(name.offset),
            ));
            cursor
        } else {
            let mut cursor = Cursor::new(CursorKind::ObjCInterfaceDecl, name.text, at);
            if self.eat(ObjcToken::Colon) {
                if let Some(superclass) = self.expect_ident("superclass name") {
                    cursor.children.push(Cursor::new(
                        CursorKind::ObjCSuperClassRef,
                        superclass.text,
                        self.location(superclass.offset),
                    ));
                }
            }
            cursor
        };

        self.parse_protocol_refs(&mut cursor);
        self.parse_members(&mut cursor, "@interface");
        Some(cursor)
    }

    fn parse_implementation(&mut self) -> Option<Cursor> {
        let at = self.here();
        self.pos += 1;
        let Some(name) = self.expect_ident("class name after '@implementation'") else {
            self.recover_to_end();
            return None;
        };
        if self.peek_kind() == Some(ObjcToken::LParen) {
            self.skip_balanced();
        }
        if self.eat(ObjcToken::Colon) {
            self.expect_ident("superclass name");
        }

        let mut cursor = Cursor::new(CursorKind::ObjCImplementationDecl, name.text, at);
        self.parse_members(&mut cursor, "@implementation");
        Some(cursor)
    }

    /// `@protocol P <Q> ... @end`; forward declarations yield nothing
    fn parse_protocol(&mut self) -> Option<Cursor> {
        let at = self.here();
        self.pos += 1;
        let Some(name) = self.expect_ident("protocol name") else {
            self.skip_declaration();
            return None;
        };
        if matches!(self.peek_kind(), Some(ObjcToken::Semi | ObjcToken::Comma)) {
            self.skip_declaration();
            return None;
        }

        let mut cursor = Cursor::new(CursorKind::ObjCProtocolDecl, name.text, at);
        self.parse_protocol_refs(&mut cursor);
        self.parse_members(&mut cursor, "@protocol");
        Some(cursor)
    }

    fn parse_forward_classes(&mut self) -> Vec<Cursor> {
        self.pos += 1;
        let mut cursors = Vec::new();
        while let Some(token) = self.bump() {
            match token.kind {
                ObjcToken::Ident => cursors.push(Cursor::new(
                    CursorKind::ObjCForwardClassDecl,
                    token.text,
                    self.location(token.offset),
                )),
                ObjcToken::Comma => {}
                ObjcToken::Semi => return cursors,
                _ => {
                    let location = self.location(token.offset);
                    self.report(Severity::Error, location, "expected ';' after '@class'");
                    return cursors;
                }
            }
        }
        cursors
    }

    fn parse_protocol_refs(&mut self, cursor: &mut Cursor) {
        if !self.eat(ObjcToken::Lt) {
            return;
        }
        while let Some(token) = self.bump() {
            match token.kind {
                ObjcToken::Ident => cursor.children.push(Cursor::new(
                    CursorKind::ObjCProtocolRef,
                    token.text,
                    self.location(token.offset),
                )),
                ObjcToken::Comma => {}
                ObjcToken::Gt => return,
                _ => {
                    let location = self.location(token.offset);
                    self.report(Severity::Error, location, "expected '>' after protocol list");
                    return;
                }
            }
        }
    }

    fn parse_members(&mut self, cursor: &mut Cursor, context: &str) {
        loop {
            let Some(token) = self.peek().cloned() else {
                let location = self.here();
                self.report(Severity::Error, location, format!("missing '@end' in {context}"));
                return;
            };
            match (token.kind, token.text) {
                (ObjcToken::AtKeyword, "@end") => {
                    self.pos += 1;
                    return;
                }
                (ObjcToken::AtKeyword, "@property") => cursor.children.extend(self.parse_property()),
                (ObjcToken::AtKeyword, "@synthesize") => {
                    cursor.children.extend(self.parse_synthesize())
                }
                (ObjcToken::AtKeyword, "@dynamic") => self.skip_declaration(),
                (ObjcToken::AtKeyword, "@interface" | "@implementation" | "@protocol") => {
                    let location = self.location(token.offset);
                    self.report(Severity::Error, location, format!("missing '@end' in {context}"));
                    return;
                }
                // @optional, @required, visibility keywords
                (ObjcToken::AtKeyword, _) => self.pos += 1,
                (ObjcToken::Minus | ObjcToken::Plus, _) => {
                    cursor.children.extend(self.parse_method())
                }
                (ObjcToken::Directive, _) => self.pos += 1,
                // instance variable block
                (ObjcToken::LBrace, _) => self.skip_balanced(),
                (_, text) => {
                    let location = self.location(token.offset);
                    self.report(
                        Severity::Warning,
                        location,
                        format!("ignoring unexpected '{text}' in {context}"),
                    );
                    self.skip_declaration();
                }
            }
        }
    }

    fn parse_property(&mut self) -> Option<Cursor> {
        let at = self.here();
        self.pos += 1;
        if self.peek_kind() == Some(ObjcToken::LParen) {
            self.skip_balanced();
        }

        let mut attribute = None;
        let mut words: Vec<Token<'a>> = Vec::new();
        while let Some(token) = self.peek().cloned() {
            let location = self.location(token.offset);
            match token.kind {
                ObjcToken::Semi => {
                    self.pos += 1;
                    break;
                }
                ObjcToken::AtKeyword | ObjcToken::Directive => {
                    self.report(Severity::Error, location, "expected ';' after property");
                    break;
                }
                ObjcToken::Ident if token.text == "IBOutlet" => {
                    self.pos += 1;
                    attribute = Some(Cursor::new(CursorKind::IBOutletAttr, "", location));
                }
                ObjcToken::Ident if token.text == "IBOutletCollection" => {
                    self.pos += 1;
                    let element = if self.peek_kind() == Some(ObjcToken::LParen) {
                        type_spelling(&self.type_in_parens()).unwrap_or_default()
                    } else {
                        String::new()
                    };
                    attribute = Some(Cursor::new(
                        CursorKind::IBOutletCollectionAttr,
                        element,
                        location,
                    ));
                }
                ObjcToken::Lt => self.skip_angles(),
                ObjcToken::LParen => self.skip_balanced(),
                ObjcToken::Ident => {
                    words.push(token);
                    self.pos += 1;
                }
                _ => self.pos += 1,
            }
        }

        let Some(name) = words.pop() else {
            self.report(Severity::Error, at, "expected property name");
            return None;
        };
        let Some(type_name) = type_spelling(&words) else {
            self.report(Severity::Error, at, format!("missing type for property '{}'", name.text));
            return None;
        };

        let mut cursor =
            Cursor::new(CursorKind::ObjCPropertyDecl, name.text, at).with_type(&type_name);
        cursor.children.extend(attribute);
        if is_class_type(&type_name) {
            cursor
                .children
                .push(Cursor::new(CursorKind::TypeRef, type_name, at));
        }
        Some(cursor)
    }

    fn parse_synthesize(&mut self) -> Vec<Cursor> {
        self.pos += 1;
        let mut cursors = Vec::new();
        while let Some(token) = self.bump() {
            match token.kind {
                ObjcToken::Ident => {
                    cursors.push(Cursor::new(
                        CursorKind::ObjCSynthesizeDecl,
                        token.text,
                        self.location(token.offset),
                    ));
                    if self.eat(ObjcToken::Eq) {
                        self.expect_ident("instance variable name");
                    }
                }
                ObjcToken::Comma => {}
                ObjcToken::Semi => break,
                _ => {
                    let location = self.location(token.offset);
                    self.report(Severity::Error, location, "expected ';' after '@synthesize'");
                    break;
                }
            }
        }
        cursors
    }

    fn parse_method(&mut self) -> Option<Cursor> {
        let at = self.here();
        let kind = match self.bump().map(|t| t.kind) {
            Some(ObjcToken::Minus) => CursorKind::ObjCInstanceMethodDecl,
            _ => CursorKind::ObjCClassMethodDecl,
        };

        let mut is_action = false;
        let mut result_type = "id".to_string();
        if self.peek_kind() == Some(ObjcToken::LParen) {
            let words = self.type_in_parens();
            is_action = words.iter().any(|w| w.text == "IBAction");
            if let Some(spelling) = type_spelling(&words) {
                result_type = spelling;
            }
        }

        let Some(first) = self.expect_ident("method name") else {
            self.skip_declaration();
            return None;
        };

        let mut selector = String::new();
        let mut parameters = Vec::new();
        if !self.eat(ObjcToken::Colon) {
            selector.push_str(first.text);
        } else {
            let mut keyword = first.text;
            loop {
                selector.push_str(keyword);
                selector.push(':');

                let type_name = if self.peek_kind() == Some(ObjcToken::LParen) {
                    type_spelling(&self.type_in_parens()).unwrap_or_else(|| "id".to_string())
                } else {
                    "id".to_string()
                };
                let Some(name) = self.expect_ident("parameter name") else {
                    self.skip_declaration();
                    return None;
                };
                let location = self.location(name.offset);
                let mut parameter =
                    Cursor::new(CursorKind::ParmDecl, name.text, location).with_type(&type_name);
                if is_class_type(&type_name) {
                    parameter
                        .children
                        .push(Cursor::new(CursorKind::TypeRef, type_name, location));
                }
                parameters.push(parameter);

                match (self.peek_kind(), self.peek_kind_at(1)) {
                    (Some(ObjcToken::Ident), Some(ObjcToken::Colon)) => {
                        keyword = self.bump().map(|t| t.text).unwrap_or("");
                        self.pos += 1;
                    }
                    (Some(ObjcToken::Colon), _) => {
                        keyword = "";
                        self.pos += 1;
                    }
                    _ => break,
                }
            }
            if self.eat(ObjcToken::Comma) {
                self.eat(ObjcToken::Ellipsis);
            }
        }

        // Trailing macros and __attribute__((...))
        while self.peek_kind() == Some(ObjcToken::Ident) {
            self.pos += 1;
            if self.peek_kind() == Some(ObjcToken::LParen) {
                self.skip_balanced();
            }
        }

        let mut cursor = Cursor::new(kind, selector, at).with_type(result_type);
        if is_action {
            cursor
                .children
                .push(Cursor::new(CursorKind::IBActionAttr, "", at));
        }
        cursor.children.extend(parameters);

        match self.peek_kind() {
            Some(ObjcToken::Semi) => self.pos += 1,
            Some(ObjcToken::LBrace) => {
                let location = self.here();
                self.skip_balanced();
                cursor
                    .children
                    .push(Cursor::new(CursorKind::CompoundStmt, "", location));
            }
            _ => {
                let location = self.here();
                self.report(
                    Severity::Error,
                    location,
                    format!("expected ';' after method '{}'", cursor.spelling),
                );
            }
        }
        Some(cursor)
    }
}

/// Path of an `#import`/`#include` directive
fn inclusion_path(directive: &str) -> Option<String> {
    let rest = directive.trim_start_matches('#').trim_start();
    let rest = rest
        .strip_prefix("import")
        .or_else(|| rest.strip_prefix("include"))?
        .trim();
    let path = rest
        .strip_prefix('<')
        .and_then(|r| r.strip_suffix('>'))
        .or_else(|| rest.strip_prefix('"').and_then(|r| r.strip_suffix('"')))?;
    Some(path.to_string())
}
