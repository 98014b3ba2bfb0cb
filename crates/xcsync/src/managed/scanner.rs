//! Managed Front-End
//!
//! Recovers class declarations from C# sources: namespaces, `using` directives,
//! base lists, attributes and member signatures. Member bodies are skipped
//! without being interpreted.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};

use super::lexer::{self, CsToken, Token};
use super::symbols::{
    AttributeData, ClassDecl, Compilation, MemberDecl, MemberKind, ParameterDecl, ScanDiagnostic,
    qualify,
};
use crate::project::{LoadError, ProjectLoader};
use crate::sync::TextEncoding;
use crate::text::LineIndex;

/// Error type for opening a managed project
#[derive(Debug, thiserror::Error)]
pub enum CompilationError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Failed to read source {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Produces a [`Compilation`] for a managed project
#[async_trait]
pub trait CompilerFrontEnd: Send + Sync {
    /// Open the project at `path` (a directory or `.csproj`)
    async fn open_project(&self, path: &Path) -> Result<Compilation, CompilationError>;
}

/// Front-end that scans the project's `.cs` files
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceScanner;

#[async_trait]
impl CompilerFrontEnd for SourceScanner {
    async fn open_project(&self, path: &Path) -> Result<Compilation, CompilationError> {
        let root = ProjectLoader::project_root(path)?;
        let files = ProjectLoader::source_files(&root).await?;

        let mut compilation = Compilation::new();
        for file in files {
            let bytes = fs::read(&file)
                .await
                .map_err(|source| CompilationError::Read {
                    path: file.clone(),
                    source,
                })?;
            let (_, source) = TextEncoding::decode(&bytes);
            Self::scan_source(&file, &source, &mut compilation);
        }

        for diagnostic in &compilation.diagnostics {
            warn!(
                "{}:{}: {}",
                diagnostic.file.display(),
                diagnostic.line,
                diagnostic.message
            );
        }
        info!(
            "Scanned {} classes from {}",
            compilation.len(),
            root.display()
        );
        Ok(compilation)
    }
}

impl SourceScanner {
    /// Scan one source file into `compilation`
    pub fn scan_source(file: &Path, source: &str, compilation: &mut Compilation) {
        let (tokens, errors) = lexer::tokenize(source);
        let lines = LineIndex::new(source);

        for error in errors {
            compilation.diagnostics.push(ScanDiagnostic {
                file: file.to_path_buf(),
                line: lines.line(error.offset),
                message: format!("unrecognized input `{}`", error.text),
            });
        }

        let mut parser = DeclParser {
            tokens,
            pos: 0,
            file: file.to_path_buf(),
            lines,
            usings: Vec::new(),
            classes: Vec::new(),
            diagnostics: Vec::new(),
        };
        parser.parse_namespace_body(None, false);

        debug!(
            "Scanned {}: {} class declarations",
            file.display(),
            parser.classes.len()
        );
        compilation.diagnostics.extend(parser.diagnostics);
        for class in parser.classes {
            compilation.add_class(class);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Declaration Parser
// ─────────────────────────────────────────────────────────────────────────────

const MODIFIERS: &[&str] = &[
    "public", "private", "protected", "internal", "static", "abstract", "sealed", "override",
    "virtual", "readonly", "async", "new", "unsafe", "extern", "partial", "volatile", "const",
    "required", "file", "fixed", "event",
];

const TYPE_KEYWORDS: &[&str] = &["class", "struct", "interface", "enum", "record"];

const PARAMETER_MODIFIERS: &[&str] = &["this", "ref", "out", "in", "params", "scoped", "readonly"];

struct DeclParser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    file: PathBuf,
    lines: LineIndex,
    usings: Vec<String>,
    classes: Vec<ClassDecl>,
    diagnostics: Vec<ScanDiagnostic>,
}

impl<'a> DeclParser<'a> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token<'a>> {
        self.tokens.get(self.pos + ahead)
    }

    fn peek_kind(&self) -> Option<CsToken> {
        self.peek().map(|t| t.kind)
    }

    fn peek_is_ident(&self, text: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == CsToken::Ident && t.text == text)
    }

    fn bump(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: CsToken) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn current_line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|t| self.lines.line(t.offset))
            .unwrap_or(1)
    }

    fn error(&mut self, message: impl Into<String>) {
        let line = self.current_line();
        self.diagnostics.push(ScanDiagnostic {
            file: self.file.clone(),
            line,
            message: message.into(),
        });
    }

    /// Parse declarations until the end of the file or the closing brace of a
    /// block-scoped namespace
    fn parse_namespace_body(&mut self, namespace: Option<String>, braced: bool) {
        let mut namespace = namespace;
        let mut attributes = Vec::new();

        loop {
            let Some(token) = self.peek().cloned() else {
                if braced {
                    self.error("unterminated namespace block");
                }
                return;
            };

            match token.kind {
                CsToken::RBrace if braced => {
                    self.bump();
                    return;
                }
                CsToken::LBracket => attributes.extend(self.parse_attribute_section()),
                CsToken::Ident => match token.text {
                    "global" if self.peek_at(1).is_some_and(|t| t.text == "using") => {
                        self.bump();
                    }
                    "using" => self.parse_using(),
                    "namespace" => {
                        self.bump();
                        let name = self.parse_qualified_name();
                        let full = qualify(namespace.as_deref(), &name);
                        if self.eat(CsToken::Semi) {
                            namespace = Some(full);
                        } else if self.eat(CsToken::LBrace) {
                            self.parse_namespace_body(Some(full), true);
                        } else {
                            self.error(format!("expected namespace body after `{name}`"));
                        }
                    }
                    _ if self.at_type_declaration() => {
                        let attrs = std::mem::take(&mut attributes);
                        self.parse_type_decl(namespace.clone(), attrs);
                    }
                    _ => {
                        self.bump();
                    }
                },
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Whether the upcoming modifiers are followed by a type keyword
    fn at_type_declaration(&self) -> bool {
        let mut ahead = 0;
        while let Some(token) = self.peek_at(ahead) {
            if token.kind != CsToken::Ident {
                return false;
            }
            if TYPE_KEYWORDS.contains(&token.text) {
                return true;
            }
            if !MODIFIERS.contains(&token.text) {
                return false;
            }
            ahead += 1;
        }
        false
    }

    fn parse_using(&mut self) {
        self.bump();
        if self.peek_is_ident("static") {
            self.bump();
        }
        let mut parts = Vec::new();
        let mut alias = false;
        while let Some(token) = self.bump() {
            match token.kind {
                CsToken::Semi => break,
                CsToken::Eq => alias = true,
                _ => parts.push(token.text),
            }
        }
        if !alias && !parts.is_empty() {
            let using = parts.concat();
            if !self.usings.contains(&using) {
                self.usings.push(using);
            }
        }
    }

    fn parse_qualified_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(token) = self.peek() {
            match token.kind {
                CsToken::Ident | CsToken::Dot => {
                    name.push_str(token.text);
                    self.pos += 1;
                }
                _ => break,
            }
        }
        name
    }

    /// Parse `[A, B(args)]` into attribute data
    fn parse_attribute_section(&mut self) -> Vec<AttributeData> {
        let mut attributes = Vec::new();
        self.bump();

        // Attribute target (`assembly:`, `return:`)
        if self.peek_kind() == Some(CsToken::Ident)
            && self.peek_at(1).is_some_and(|t| t.kind == CsToken::Colon)
        {
            self.pos += 2;
        }

        loop {
            match self.peek_kind() {
                None => {
                    self.error("unterminated attribute section");
                    return attributes;
                }
                Some(CsToken::RBracket) => {
                    self.bump();
                    return attributes;
                }
                Some(CsToken::Comma) => {
                    self.bump();
                }
                Some(CsToken::Ident) => {
                    let mut attribute = AttributeData {
                        name: self.parse_qualified_name(),
                        ..Default::default()
                    };
                    if self.peek_kind() == Some(CsToken::LParen) {
                        for argument in self.parse_argument_groups() {
                            Self::push_argument(&mut attribute, &argument);
                        }
                    }
                    attributes.push(attribute);
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn push_argument(attribute: &mut AttributeData, tokens: &[Token<'a>]) {
        if tokens.len() >= 3
            && tokens[0].kind == CsToken::Ident
            && matches!(tokens[1].kind, CsToken::Eq | CsToken::Colon)
        {
            attribute
                .named
                .push((tokens[0].text.to_string(), argument_text(&tokens[2..])));
        } else if !tokens.is_empty() {
            attribute.positional.push(argument_text(tokens));
        }
    }

    /// Parse a parenthesized list into comma-separated token groups
    fn parse_argument_groups(&mut self) -> Vec<Vec<Token<'a>>> {
        let mut groups = Vec::new();
        let mut current = Vec::new();
        let mut depth = 0usize;
        self.bump();

        while let Some(token) = self.bump() {
            match token.kind {
                CsToken::LParen | CsToken::LBracket | CsToken::LBrace | CsToken::Lt => {
                    depth += 1;
                    current.push(token);
                }
                CsToken::RParen if depth == 0 => {
                    if !current.is_empty() {
                        groups.push(current);
                    }
                    return groups;
                }
                CsToken::RParen | CsToken::RBracket | CsToken::RBrace | CsToken::Gt => {
                    depth = depth.saturating_sub(1);
                    current.push(token);
                }
                CsToken::Comma if depth == 0 => groups.push(std::mem::take(&mut current)),
                _ => current.push(token),
            }
        }

        self.error("unterminated argument list");
        groups
    }

    fn skip_modifiers(&mut self) -> bool {
        let mut is_partial = false;
        while let Some(token) = self.peek() {
            if token.kind != CsToken::Ident || !MODIFIERS.contains(&token.text) {
                break;
            }
            is_partial |= token.text == "partial";
            self.pos += 1;
        }
        is_partial
    }

    fn parse_type_decl(&mut self, namespace: Option<String>, attributes: Vec<AttributeData>) {
        let line = self.current_line();
        let is_partial = self.skip_modifiers();

        let Some(keyword) = self.bump().map(|t| t.text) else {
            return;
        };
        if keyword == "record" && (self.peek_is_ident("class") || self.peek_is_ident("struct")) {
            self.bump();
        }

        let name = match self.peek() {
            Some(token) if token.kind == CsToken::Ident => token.text.to_string(),
            _ => {
                self.error(format!("expected a name after `{keyword}`"));
                return;
            }
        };
        self.bump();

        if self.peek_kind() == Some(CsToken::Lt) {
            self.skip_balanced(CsToken::Lt, CsToken::Gt);
        }
        if self.peek_kind() == Some(CsToken::LParen) {
            self.skip_balanced(CsToken::LParen, CsToken::RParen);
        }

        let mut base_list = Vec::new();
        if self.eat(CsToken::Colon) {
            let mut current = Vec::new();
            let mut depth = 0usize;
            while let Some(token) = self.peek().cloned() {
                match token.kind {
                    CsToken::LBrace | CsToken::Semi if depth == 0 => break,
                    CsToken::Ident if depth == 0 && token.text == "where" => break,
                    CsToken::Comma if depth == 0 => {
                        base_list.push(type_text(&current));
                        current.clear();
                    }
                    CsToken::Lt | CsToken::LParen => {
                        depth += 1;
                        current.push(token);
                    }
                    CsToken::Gt | CsToken::RParen => {
                        depth = depth.saturating_sub(1);
                        current.push(token);
                    }
                    _ => current.push(token),
                }
                self.pos += 1;
            }
            if !current.is_empty() {
                base_list.push(type_text(&current));
            }
        }

        // Generic constraints
        while let Some(kind) = self.peek_kind() {
            if matches!(kind, CsToken::LBrace | CsToken::Semi) {
                break;
            }
            self.pos += 1;
        }

        if self.eat(CsToken::Semi) {
            return;
        }
        if !self.eat(CsToken::LBrace) {
            self.error(format!("expected a body for `{name}`"));
            return;
        }

        if keyword != "class" {
            self.skip_block();
            return;
        }

        let nested_namespace = qualify(namespace.as_deref(), &name);
        let members = self.parse_class_body(&nested_namespace);

        self.classes.push(ClassDecl {
            name,
            namespace,
            usings: self.usings.clone(),
            base_list,
            attributes,
            members,
            is_partial,
            file: self.file.clone(),
            line,
        });
    }

    fn parse_class_body(&mut self, nested_namespace: &str) -> Vec<MemberDecl> {
        let mut members = Vec::new();
        let mut attributes = Vec::new();

        loop {
            match self.peek_kind() {
                None => {
                    self.error("unterminated class body");
                    return members;
                }
                Some(CsToken::RBrace) => {
                    self.bump();
                    return members;
                }
                Some(CsToken::LBracket) => attributes.extend(self.parse_attribute_section()),
                Some(CsToken::Semi) => {
                    self.bump();
                }
                Some(_) if self.at_type_declaration() => {
                    let attrs = std::mem::take(&mut attributes);
                    self.parse_type_decl(Some(nested_namespace.to_string()), attrs);
                }
                Some(_) => {
                    let attrs = std::mem::take(&mut attributes);
                    if let Some(member) = self.parse_member(attrs) {
                        members.push(member);
                    }
                }
            }
        }
    }

    fn parse_member(&mut self, attributes: Vec<AttributeData>) -> Option<MemberDecl> {
        let line = self.current_line();
        self.skip_modifiers();

        let mut signature = Vec::new();
        let mut angle = 0usize;
        let mut square = 0usize;
        let stop = loop {
            let token = self.peek()?.clone();
            match token.kind {
                CsToken::Lt => angle += 1,
                CsToken::Gt => angle = angle.saturating_sub(1),
                CsToken::LBracket => square += 1,
                CsToken::RBracket => square = square.saturating_sub(1),
                CsToken::LParen | CsToken::LBrace | CsToken::Semi | CsToken::Eq | CsToken::Arrow
                    if angle == 0 && square == 0 =>
                {
                    break token.kind;
                }
                CsToken::RBrace => return None,
                _ => {}
            }
            signature.push(token);
            self.pos += 1;
        };

        let name_index = name_position(&signature);
        let (name, type_name) = match name_index {
            Some(i) => (signature[i].text.to_string(), type_text(&signature[..i])),
            None => {
                self.skip_to_semi();
                return None;
            }
        };

        let kind = match stop {
            CsToken::LParen => {
                let parameters = self
                    .parse_argument_groups()
                    .iter()
                    .filter_map(|group| parameter_decl(group))
                    .collect();
                self.skip_method_body();
                MemberKind::Method {
                    return_type: type_name,
                    parameters,
                }
            }
            CsToken::LBrace => {
                self.bump();
                self.skip_block();
                if self.peek_kind() == Some(CsToken::Eq) {
                    self.skip_to_semi();
                }
                MemberKind::Property { type_name }
            }
            CsToken::Arrow => {
                self.skip_to_semi();
                MemberKind::Property { type_name }
            }
            _ => {
                self.skip_to_semi();
                MemberKind::Field { type_name }
            }
        };

        Some(MemberDecl {
            name,
            attributes,
            kind,
            line,
        })
    }

    fn skip_method_body(&mut self) {
        while let Some(kind) = self.peek_kind() {
            match kind {
                CsToken::LBrace => {
                    self.bump();
                    self.skip_block();
                    return;
                }
                CsToken::Semi => {
                    self.bump();
                    return;
                }
                CsToken::Arrow => {
                    self.skip_to_semi();
                    return;
                }
                CsToken::RBrace => return,
                CsToken::LParen => self.skip_balanced(CsToken::LParen, CsToken::RParen),
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Skip to the matching close brace; the open brace is already consumed
    fn skip_block(&mut self) {
        let mut depth = 1usize;
        while let Some(token) = self.bump() {
            match token.kind {
                CsToken::LBrace => depth += 1,
                CsToken::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
        self.error("unterminated block");
    }

    fn skip_balanced(&mut self, open: CsToken, close: CsToken) {
        let mut depth = 0usize;
        while let Some(token) = self.bump() {
            if token.kind == open {
                depth += 1;
            } else if token.kind == close {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return;
                }
            }
        }
    }

    /// Skip past the next `;` at brace depth zero, stopping before an
    /// enclosing `}`
    fn skip_to_semi(&mut self) {
        let mut depth = 0usize;
        while let Some(kind) = self.peek_kind() {
            match kind {
                CsToken::LBrace | CsToken::LParen | CsToken::LBracket => depth += 1,
                CsToken::RBrace if depth == 0 => return,
                CsToken::RBrace | CsToken::RParen | CsToken::RBracket => {
                    depth = depth.saturating_sub(1)
                }
                CsToken::Semi if depth == 0 => {
                    self.pos += 1;
                    return;
                }
                _ => {}
            }
            self.pos += 1;
        }
    }
}

/// Index of the member name: the last identifier outside generic arguments
fn name_position(signature: &[Token<'_>]) -> Option<usize> {
    let mut depth = 0usize;
    let mut position = None;
    for (i, token) in signature.iter().enumerate() {
        match token.kind {
            CsToken::Lt => depth += 1,
            CsToken::Gt => depth = depth.saturating_sub(1),
            CsToken::Ident if depth == 0 => position = Some(i),
            _ => {}
        }
    }
    position
}

fn type_text(tokens: &[Token<'_>]) -> String {
    tokens.iter().map(|t| t.text).collect()
}

fn argument_text(tokens: &[Token<'_>]) -> String {
    match tokens {
        [single] if single.kind == CsToken::Str => lexer::unquote(single.text).to_string(),
        _ => tokens.iter().map(|t| t.text).collect::<Vec<_>>().join(" "),
    }
}

fn parameter_decl(group: &[Token<'_>]) -> Option<ParameterDecl> {
    let mut tokens = group;

    // Parameter attributes
    while tokens.first().is_some_and(|t| t.kind == CsToken::LBracket) {
        let end = tokens.iter().position(|t| t.kind == CsToken::RBracket)?;
        tokens = &tokens[end + 1..];
    }
    while tokens
        .first()
        .is_some_and(|t| t.kind == CsToken::Ident && PARAMETER_MODIFIERS.contains(&t.text))
    {
        tokens = &tokens[1..];
    }
    // Default value
    if let Some(eq) = tokens.iter().position(|t| t.kind == CsToken::Eq) {
        tokens = &tokens[..eq];
    }

    let index = name_position(tokens)?;
    Some(ParameterDecl {
        name: tokens[index].text.to_string(),
        type_name: type_text(&tokens[..index]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEW_CONTROLLER: &str = r#"
using System;
using AppKit;
using Foundation;

namespace Sample
{
    [Register ("ViewController")]
    public partial class ViewController : NSViewController, INSTextFieldDelegate
    {
        private int count = 0;

        public ViewController (IntPtr handle) : base (handle)
        {
            var x = new { A = 1 };
        }

        [Outlet]
        AppKit.NSTextField FileLabel { get; set; }

        [Outlet ("images")]
        NSImageView[] Images { get; set; }

        [Action ("UploadButton:")]
        partial void UploadButton (Foundation.NSObject sender);

        public override string Title => "Main";

        public T Find<T> (string key, int depth = 2) where T : class { return null; }

        class Nested : NSObject { }
    }

    enum Mode { A, B }
}
"#;

    fn scan(source: &str) -> Compilation {
        let mut compilation = Compilation::new();
        SourceScanner::scan_source(Path::new("ViewController.cs"), source, &mut compilation);
        compilation
    }

    #[test]
    fn test_scan_class_declaration() {
        let compilation = scan(VIEW_CONTROLLER);
        assert!(compilation.diagnostics.is_empty(), "{:?}", compilation.diagnostics);

        let class = compilation.class("Sample.ViewController").unwrap();
        assert_eq!(class.usings, vec!["System", "AppKit", "Foundation"]);
        assert_eq!(class.base_list, vec!["NSViewController", "INSTextFieldDelegate"]);

        let register = class.attribute("Register").unwrap();
        assert_eq!(register.first_argument(), Some("ViewController"));

        let names: Vec<_> = class.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["count", "ViewController", "FileLabel", "Images", "UploadButton", "Title", "Find"]
        );
    }

    #[test]
    fn test_scan_members() {
        let compilation = scan(VIEW_CONTROLLER);
        let class = compilation.class("Sample.ViewController").unwrap();

        let label = class.members.iter().find(|m| m.name == "FileLabel").unwrap();
        assert_eq!(
            label.kind,
            MemberKind::Property {
                type_name: "AppKit.NSTextField".to_string()
            }
        );
        assert!(label.attributes[0].is("Outlet"));

        let images = class.members.iter().find(|m| m.name == "Images").unwrap();
        assert_eq!(
            images.kind,
            MemberKind::Property {
                type_name: "NSImageView[]".to_string()
            }
        );
        assert_eq!(images.attributes[0].first_argument(), Some("images"));

        let upload = class.members.iter().find(|m| m.name == "UploadButton").unwrap();
        assert_eq!(
            upload.kind,
            MemberKind::Method {
                return_type: "void".to_string(),
                parameters: vec![ParameterDecl {
                    name: "sender".to_string(),
                    type_name: "Foundation.NSObject".to_string(),
                }],
            }
        );

        let find = class.members.iter().find(|m| m.name == "Find").unwrap();
        let MemberKind::Method { parameters, .. } = &find.kind else {
            panic!("Find should be a method");
        };
        assert_eq!(parameters.len(), 2);
        assert_eq!(parameters[1].name, "depth");
    }

    #[test]
    fn test_nested_and_non_class_types() {
        let compilation = scan(VIEW_CONTROLLER);
        assert!(compilation.class("Sample.ViewController.Nested").is_some());
        assert!(compilation.class("Sample.Mode").is_none());
        assert_eq!(compilation.len(), 2);
    }

    #[test]
    fn test_file_scoped_namespace_and_named_arguments() {
        let compilation = scan(
            r#"
namespace Sample.Models;

[Register ("Hidden", SkipRegistration = true), Model]
public class Hidden : Foundation.NSObject { }
"#,
        );
        let class = compilation.class("Sample.Models.Hidden").unwrap();
        let register = class.attribute("Register").unwrap();
        assert_eq!(register.named_argument("SkipRegistration"), Some("true"));
        assert!(class.attribute("Model").is_some());
        assert_eq!(class.base_list, vec!["Foundation.NSObject"]);
    }

    #[test]
    fn test_unterminated_class_reports_diagnostic() {
        let compilation = scan("namespace A { class B : NSObject { void M() { ");
        assert!(!compilation.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_open_project_missing_path_fails() {
        let result = SourceScanner
            .open_project(Path::new("/definitely/not/a/project"))
            .await;
        assert!(matches!(result, Err(CompilationError::Load(LoadError::PathNotFound(_)))));
    }
}
