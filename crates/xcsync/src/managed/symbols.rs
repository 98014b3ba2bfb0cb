//! Managed Symbols
//!
//! The declaration-level symbol model produced by the managed front-end: classes
//! merged across partial declarations, their attributes and members.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

/// An attribute application with its arguments
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributeData {
    /// Attribute name as written (may be qualified, may carry the `Attribute` suffix)
    pub name: String,
    /// Positional constructor arguments (string literals unquoted)
    pub positional: Vec<String>,
    /// Named arguments
    pub named: Vec<(String, String)>,
}

impl AttributeData {
    /// Whether this attribute is `short` (`Register`, `RegisterAttribute`,
    /// `Foundation.Register` all match `Register`)
    pub fn is(&self, short: &str) -> bool {
        let name = self.name.rsplit('.').next().unwrap_or(&self.name);
        let name = name.strip_suffix("Attribute").unwrap_or(name);
        name == short
    }

    /// First positional argument, if non-empty
    pub fn first_argument(&self) -> Option<&str> {
        self.positional
            .first()
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Value of a named argument
    pub fn named_argument(&self, name: &str) -> Option<&str> {
        self.named
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Find an attribute by short name
pub fn find_attribute<'a>(attributes: &'a [AttributeData], short: &str) -> Option<&'a AttributeData> {
    attributes.iter().find(|a| a.is(short))
}

/// A method parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDecl {
    pub name: String,
    pub type_name: String,
}

/// What kind of member a declaration is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberKind {
    Property { type_name: String },
    Method { return_type: String, parameters: Vec<ParameterDecl> },
    Field { type_name: String },
}

/// A member declaration inside a class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDecl {
    pub name: String,
    pub attributes: Vec<AttributeData>,
    pub kind: MemberKind,
    pub line: usize,
}

/// One (possibly partial) class declaration in one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    pub name: String,
    pub namespace: Option<String>,
    pub usings: Vec<String>,
    pub base_list: Vec<String>,
    pub attributes: Vec<AttributeData>,
    pub members: Vec<MemberDecl>,
    pub is_partial: bool,
    pub file: PathBuf,
    pub line: usize,
}

impl ClassDecl {
    /// Fully qualified name
    pub fn full_name(&self) -> String {
        qualify(self.namespace.as_deref(), &self.name)
    }
}

/// Join a namespace and a name
pub fn qualify(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}.{name}"),
        _ => name.to_string(),
    }
}

/// Whether a path is a designer file
pub fn is_designer_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".designer.cs"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Class Symbol
// ─────────────────────────────────────────────────────────────────────────────

/// A class with all its partial declarations merged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSymbol {
    pub full_name: String,
    pub name: String,
    pub namespace: Option<String>,
    /// Union of `using` directives across the declaring files
    pub usings: Vec<String>,
    /// Base list of the first declaration that has one
    pub base_list: Vec<String>,
    pub attributes: Vec<AttributeData>,
    pub members: Vec<MemberDecl>,
    /// Declaring files in scan order
    pub files: Vec<PathBuf>,
}

impl ClassSymbol {
    fn from_decl(decl: ClassDecl) -> Self {
        Self {
            full_name: decl.full_name(),
            name: decl.name,
            namespace: decl.namespace,
            usings: decl.usings,
            base_list: decl.base_list,
            attributes: decl.attributes,
            members: decl.members,
            files: vec![decl.file],
        }
    }

    fn merge(&mut self, decl: ClassDecl) {
        for using in decl.usings {
            if !self.usings.contains(&using) {
                self.usings.push(using);
            }
        }
        if self.base_list.is_empty() {
            self.base_list = decl.base_list;
        }
        self.attributes.extend(decl.attributes);
        self.members.extend(decl.members);
        if !self.files.contains(&decl.file) {
            self.files.push(decl.file);
        }
    }

    /// Find an attribute on the class
    pub fn attribute(&self, short: &str) -> Option<&AttributeData> {
        find_attribute(&self.attributes, short)
    }

    /// The user-authored file (first non-designer declaration)
    pub fn source_file(&self) -> Option<&Path> {
        self.files
            .iter()
            .find(|f| !is_designer_file(f))
            .or_else(|| self.files.first())
            .map(PathBuf::as_path)
    }

    /// The designer file, if the class has a designer part
    pub fn designer_file(&self) -> Option<&Path> {
        self.files
            .iter()
            .find(|f| is_designer_file(f))
            .map(PathBuf::as_path)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Compilation
// ─────────────────────────────────────────────────────────────────────────────

/// A diagnostic reported while scanning sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanDiagnostic {
    pub file: PathBuf,
    pub line: usize,
    pub message: String,
}

/// All in-source classes of a managed project
#[derive(Debug, Clone, Default)]
pub struct Compilation {
    classes: IndexMap<String, ClassSymbol>,
    pub diagnostics: Vec<ScanDiagnostic>,
}

impl Compilation {
    /// Create an empty compilation
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class declaration, merging partial declarations
    pub fn add_class(&mut self, decl: ClassDecl) {
        let full_name = decl.full_name();
        match self.classes.get_mut(&full_name) {
            Some(symbol) => symbol.merge(decl),
            None => {
                self.classes.insert(full_name, ClassSymbol::from_decl(decl));
            }
        }
    }

    /// Look up a class by fully qualified name
    pub fn class(&self, full_name: &str) -> Option<&ClassSymbol> {
        self.classes.get(full_name)
    }

    /// All classes in first-declaration order
    pub fn classes(&self) -> impl Iterator<Item = &ClassSymbol> {
        self.classes.values()
    }

    /// Number of distinct classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the compilation has no classes
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Candidate fully qualified names for a type reference written in `context`
    ///
    /// Qualified references are tried as written first. Simple names are tried
    /// against the enclosing namespaces (innermost first), then each `using`,
    /// then the global namespace.
    pub fn candidates(name: &str, context: &ClassSymbol) -> Vec<String> {
        let name = name.trim_start_matches("global::");
        let mut candidates = Vec::new();

        if name.contains('.') {
            candidates.push(name.to_string());
        }

        let mut namespace = context.namespace.clone();
        while let Some(ns) = namespace {
            candidates.push(format!("{ns}.{name}"));
            namespace = ns.rsplit_once('.').map(|(parent, _)| parent.to_string());
        }
        for using in &context.usings {
            candidates.push(format!("{using}.{name}"));
        }
        if !name.contains('.') {
            candidates.push(name.to_string());
        }

        candidates.dedup();
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(name: &str, file: &str) -> ClassDecl {
        ClassDecl {
            name: name.to_string(),
            namespace: Some("Sample".to_string()),
            usings: vec!["AppKit".to_string()],
            base_list: Vec::new(),
            attributes: Vec::new(),
            members: Vec::new(),
            is_partial: true,
            file: PathBuf::from(file),
            line: 1,
        }
    }

    #[test]
    fn test_attribute_name_matching() {
        let attr = AttributeData {
            name: "Foundation.RegisterAttribute".to_string(),
            positional: vec!["Main".to_string()],
            named: vec![("SkipRegistration".to_string(), "true".to_string())],
        };
        assert!(attr.is("Register"));
        assert!(!attr.is("Model"));
        assert_eq!(attr.first_argument(), Some("Main"));
        assert_eq!(attr.named_argument("SkipRegistration"), Some("true"));
    }

    #[test]
    fn test_partial_classes_merge() {
        let mut compilation = Compilation::new();
        let mut main = decl("ViewController", "ViewController.cs");
        main.base_list = vec!["NSViewController".to_string()];
        compilation.add_class(main);

        let mut designer = decl("ViewController", "ViewController.designer.cs");
        designer.usings = vec!["Foundation".to_string()];
        compilation.add_class(designer);

        assert_eq!(compilation.len(), 1);
        let symbol = compilation.class("Sample.ViewController").unwrap();
        assert_eq!(symbol.base_list, vec!["NSViewController"]);
        assert_eq!(symbol.usings, vec!["AppKit", "Foundation"]);
        assert_eq!(symbol.source_file(), Some(Path::new("ViewController.cs")));
        assert_eq!(
            symbol.designer_file(),
            Some(Path::new("ViewController.designer.cs"))
        );
    }

    #[test]
    fn test_candidates() {
        let mut compilation = Compilation::new();
        let mut nested = decl("Panel", "Panel.cs");
        nested.namespace = Some("Sample.Views".to_string());
        compilation.add_class(nested);
        let symbol = compilation.class("Sample.Views.Panel").unwrap();

        assert_eq!(
            Compilation::candidates("NSTextField", symbol),
            vec![
                "Sample.Views.NSTextField",
                "Sample.NSTextField",
                "AppKit.NSTextField",
                "NSTextField",
            ]
        );
        assert_eq!(
            Compilation::candidates("global::AppKit.NSView", symbol)[0],
            "AppKit.NSView"
        );
    }
}
