//! Native Declaration Collector
//!
//! Walks a cursor tree and collects the defining `@interface` of every class,
//! together with the outlets and actions it declares. Each finished declaration
//! is also sent on a channel so a listener can fold it in while the rest of the
//! file is still being walked.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::ast::{Cursor, CursorKind, Diagnostic, ParseOptions, Severity, SourceLocation, TranslationUnit};
use super::visitor::{CursorVisitor, walk};
use crate::sync::TextEncoding;

/// Error type for native parsing
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {errors} parse error(s), first at {first}")]
    Fatal {
        path: PathBuf,
        errors: usize,
        first: Diagnostic,
    },

    #[error("Parser task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Native Declarations
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeOutlet {
    pub name: String,
    /// Control type (element type for collections)
    pub type_name: String,
    pub is_collection: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeParameter {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeAction {
    pub selector: String,
    pub parameters: Vec<NativeParameter>,
}

/// A class interface as declared on the native side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeDeclaration {
    pub name: String,
    pub superclass: Option<String>,
    pub protocols: Vec<String>,
    pub outlets: Vec<NativeOutlet>,
    pub actions: Vec<NativeAction>,
    pub location: SourceLocation,
}

impl NativeDeclaration {
    fn from_cursor(cursor: &Cursor) -> Self {
        Self {
            name: cursor.spelling.clone(),
            superclass: None,
            protocols: Vec::new(),
            outlets: Vec::new(),
            actions: Vec::new(),
            location: cursor.location,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Collector
// ─────────────────────────────────────────────────────────────────────────────

/// Visitor collecting class interfaces
///
/// Forward declarations, categories, protocols and `@implementation` blocks
/// are ignored.
#[derive(Debug, Default)]
pub struct DeclarationCollector {
    current: Option<NativeDeclaration>,
    declarations: Vec<NativeDeclaration>,
    sender: Option<mpsc::UnboundedSender<NativeDeclaration>>,
}

impl DeclarationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collector that also sends each declaration as it completes
    pub fn with_sender(sender: mpsc::UnboundedSender<NativeDeclaration>) -> Self {
        Self {
            sender: Some(sender),
            ..Self::default()
        }
    }

    /// Declarations collected so far, in source order
    pub fn declarations(&self) -> &[NativeDeclaration] {
        &self.declarations
    }

    pub fn into_declarations(self) -> Vec<NativeDeclaration> {
        self.declarations
    }
}

impl CursorVisitor for DeclarationCollector {
    fn visit_declaration(&mut self, cursor: &Cursor, _parent: &Cursor) {
        if cursor.kind == CursorKind::ObjCInterfaceDecl {
            self.current = Some(NativeDeclaration::from_cursor(cursor));
        }
    }

    fn visit_reference(&mut self, cursor: &Cursor, parent: &Cursor) {
        if parent.kind != CursorKind::ObjCInterfaceDecl {
            return;
        }
        let Some(current) = self.current.as_mut() else {
            return;
        };
        match cursor.kind {
            CursorKind::ObjCSuperClassRef => current.superclass = Some(cursor.spelling.clone()),
            CursorKind::ObjCProtocolRef => current.protocols.push(cursor.spelling.clone()),
            _ => {}
        }
    }

    fn visit_attribute(&mut self, cursor: &Cursor, parent: &Cursor) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        match cursor.kind {
            CursorKind::IBOutletAttr => current.outlets.push(NativeOutlet {
                name: parent.spelling.clone(),
                type_name: parent.type_name.clone().unwrap_or_else(|| "id".to_string()),
                is_collection: false,
            }),
            CursorKind::IBOutletCollectionAttr => current.outlets.push(NativeOutlet {
                name: parent.spelling.clone(),
                type_name: cursor.spelling.clone(),
                is_collection: true,
            }),
            CursorKind::IBActionAttr => current.actions.push(NativeAction {
                selector: parent.spelling.clone(),
                parameters: parent
                    .children_of(CursorKind::ParmDecl)
                    .map(|p| NativeParameter {
                        name: p.spelling.clone(),
                        type_name: p.type_name.clone().unwrap_or_else(|| "id".to_string()),
                    })
                    .collect(),
            }),
            _ => {}
        }
    }

    fn leave_declaration(&mut self, cursor: &Cursor) {
        if cursor.kind != CursorKind::ObjCInterfaceDecl {
            return;
        }
        let Some(declaration) = self.current.take() else {
            return;
        };
        if let Some(sender) = &self.sender {
            if sender.send(declaration.clone()).is_err() {
                debug!("Declaration listener dropped; {} not delivered", declaration.name);
            }
        }
        self.declarations.push(declaration);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parser
// ─────────────────────────────────────────────────────────────────────────────

/// Parses native source into [`NativeDeclaration`]s
#[derive(Debug, Clone, Default)]
pub struct NativeDeclarationParser {
    options: ParseOptions,
}

impl NativeDeclarationParser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse source text and return every class interface it declares
    pub fn parse(&self, source: &str) -> Result<Vec<NativeDeclaration>, ParseError> {
        let mut collector = DeclarationCollector::new();
        self.parse_with(Path::new("<input>"), source, &mut collector)?;
        Ok(collector.into_declarations())
    }

    /// Parse source text into `collector`
    ///
    /// A unit with any diagnostic at or above `Error` is rejected before the
    /// collector sees any of it.
    pub fn parse_with(
        &self,
        path: &Path,
        source: &str,
        collector: &mut DeclarationCollector,
    ) -> Result<(), ParseError> {
        let unit = TranslationUnit::parse(source, &self.options);

        for diagnostic in &unit.diagnostics {
            match diagnostic.severity {
                Severity::Note => debug!("{}:{}", path.display(), diagnostic),
                Severity::Warning => warn!("{}:{}", path.display(), diagnostic),
                Severity::Error | Severity::Fatal => {}
            }
        }

        let errors: Vec<_> = unit.errors().collect();
        if let Some(first) = errors.first() {
            return Err(ParseError::Fatal {
                path: path.to_path_buf(),
                errors: errors.len(),
                first: (*first).clone(),
            });
        }

        walk(collector, &unit.root);
        Ok(())
    }

    /// Parse a file off the async runtime, sending each declaration on `sender`
    ///
    /// Returns the number of declarations found.
    pub async fn parse_file(
        &self,
        path: &Path,
        sender: mpsc::UnboundedSender<NativeDeclaration>,
    ) -> Result<usize, ParseError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ParseError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let (_, text) = TextEncoding::decode(&bytes);

        let parser = self.clone();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let mut collector = DeclarationCollector::with_sender(sender);
            parser.parse_with(&path, &text, &mut collector)?;
            Ok(collector.declarations().len())
        })
        .await?
    }
}
