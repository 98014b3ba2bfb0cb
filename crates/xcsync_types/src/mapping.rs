//! Type Mapping
//!
//! The canonical record linking one managed class declaration to one native
//! (Objective-C) declaration, plus the outlet/action descriptors it carries.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

// ─────────────────────────────────────────────────────────────────────────────
// Member Descriptors
// ─────────────────────────────────────────────────────────────────────────────

/// A parameter of an [`Action`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name on the managed side
    pub managed_name: String,
    /// Parameter name on the native side
    pub native_name: String,
    /// Fully qualified managed type (e.g. `Foundation.NSObject`)
    pub managed_type: String,
    /// Native type name without pointer decoration (e.g. `id`, `NSButton`)
    pub native_type: String,
}

impl Parameter {
    /// Create a parameter whose name is the same on both sides
    pub fn new(
        name: impl Into<String>,
        managed_type: impl Into<String>,
        native_type: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            managed_name: name.clone(),
            native_name: name,
            managed_type: managed_type.into(),
            native_type: native_type.into(),
        }
    }
}

/// A UI control reference exposed as a property
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outlet {
    /// Property name on the managed side
    pub managed_name: String,
    /// Property name on the native side
    pub native_name: String,
    /// Fully qualified managed type of the control (element type for collections)
    pub managed_type: String,
    /// Native type of the control (element type for collections)
    pub native_type: String,
    /// Whether this outlet is an outlet collection
    pub is_collection: bool,
}

impl Outlet {
    /// Create an outlet whose name is the same on both sides
    pub fn new(
        name: impl Into<String>,
        managed_type: impl Into<String>,
        native_type: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            managed_name: name.clone(),
            native_name: name,
            managed_type: managed_type.into(),
            native_type: native_type.into(),
            is_collection: false,
        }
    }

    /// Mark this outlet as a collection
    pub fn collection(mut self) -> Self {
        self.is_collection = true;
        self
    }

    /// Override the native property name
    pub fn with_native_name(mut self, native_name: impl Into<String>) -> Self {
        self.native_name = native_name.into();
        self
    }
}

/// A UI event handler method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Method name on the managed side
    pub managed_name: String,
    /// Objective-C selector (e.g. `UploadButton:`)
    pub selector: String,
    /// Ordered parameters
    pub parameters: Vec<Parameter>,
}

impl Action {
    /// Create an action with an explicit selector
    pub fn new(managed_name: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            managed_name: managed_name.into(),
            selector: selector.into(),
            parameters: Vec::new(),
        }
    }

    /// Add a parameter
    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// The selector split into its keyword parts (`a:b:` -> `["a", "b"]`)
    pub fn selector_parts(&self) -> Vec<&str> {
        if self.parameters.is_empty() {
            return vec![self.selector.trim_end_matches(':')];
        }
        self.selector
            .split(':')
            .filter(|part| !part.is_empty())
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mapping Origin
// ─────────────────────────────────────────────────────────────────────────────

/// Where the managed side of a mapping was declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingOrigin {
    /// A platform framework type (not part of the user project)
    Framework,
    /// A class declared in the managed project
    Source {
        /// The user-authored file declaring the class
        file: PathBuf,
        /// The `.designer.cs` file holding outlet/action plumbing, if any
        designer_file: Option<PathBuf>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Type Mapping
// ─────────────────────────────────────────────────────────────────────────────

/// One bound pair of managed/native type declarations
///
/// Mappings are immutable once built; they are shared as `Arc<TypeMapping>` and
/// updates go through [`crate::TypeRegistry::try_update_mapping`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMapping {
    /// Fully qualified managed type name (unique)
    pub managed_id: String,
    /// Native class name (unique)
    pub native_id: String,
    /// Base class mapping, `None` only for the platform root type
    pub base: Option<Arc<TypeMapping>>,
    /// Data model type: carries no UI binding members
    pub is_model: bool,
    /// Interface without implementation, excluded from codegen
    pub is_protocol: bool,
    /// Declared (at least partially) in a designer file
    pub in_designer: bool,
    /// Outlets in declaration order
    pub outlets: Vec<Outlet>,
    /// Actions in declaration order
    pub actions: Vec<Action>,
    /// Framework names referenced by this type
    pub frameworks: BTreeSet<String>,
    /// Declaration origin
    pub origin: MappingOrigin,
}

impl TypeMapping {
    /// Create a framework mapping with no members
    pub fn new(managed_id: impl Into<String>, native_id: impl Into<String>) -> Self {
        Self {
            managed_id: managed_id.into(),
            native_id: native_id.into(),
            base: None,
            is_model: false,
            is_protocol: false,
            in_designer: false,
            outlets: Vec::new(),
            actions: Vec::new(),
            frameworks: BTreeSet::new(),
            origin: MappingOrigin::Framework,
        }
    }

    /// Set the base mapping
    pub fn with_base(mut self, base: Arc<TypeMapping>) -> Self {
        self.base = Some(base);
        self
    }

    /// Set the origin; a designer file also sets `in_designer`
    pub fn with_origin(mut self, origin: MappingOrigin) -> Self {
        if let MappingOrigin::Source { designer_file, .. } = &origin {
            self.in_designer = designer_file.is_some();
        }
        self.origin = origin;
        self
    }

    /// Set the outlets
    pub fn with_outlets(mut self, outlets: Vec<Outlet>) -> Self {
        self.outlets = outlets;
        self
    }

    /// Set the actions
    pub fn with_actions(mut self, actions: Vec<Action>) -> Self {
        self.actions = actions;
        self
    }

    /// Add a framework reference
    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.frameworks.insert(framework.into());
        self
    }

    /// Mark as a data model type
    pub fn model(mut self) -> Self {
        self.is_model = true;
        self
    }

    /// Mark as protocol-only
    pub fn protocol(mut self) -> Self {
        self.is_protocol = true;
        self
    }

    /// The unqualified managed class name
    pub fn managed_name(&self) -> &str {
        self.managed_id
            .rsplit_once('.')
            .map(|(_, name)| name)
            .unwrap_or(&self.managed_id)
    }

    /// The managed namespace, if any
    pub fn namespace(&self) -> Option<&str> {
        self.managed_id.rsplit_once('.').map(|(ns, _)| ns)
    }

    /// Whether this type is declared in the user project
    pub fn is_source(&self) -> bool {
        matches!(self.origin, MappingOrigin::Source { .. })
    }

    /// Whether native header/implementation files are generated for this type
    pub fn generates_native(&self) -> bool {
        self.is_source() && !self.is_protocol
    }

    /// Whether a managed designer fragment is generated for this type
    pub fn generates_designer(&self) -> bool {
        self.is_source() && !self.is_model && !self.is_protocol
    }

    /// The designer file this type writes back to
    ///
    /// Falls back to `<Name>.designer.cs` beside the user file when the class
    /// has no designer part yet.
    pub fn designer_path(&self) -> Option<PathBuf> {
        match &self.origin {
            MappingOrigin::Framework => None,
            MappingOrigin::Source {
                designer_file: Some(path),
                ..
            } => Some(path.clone()),
            MappingOrigin::Source { file, .. } => {
                let dir = file.parent().map(PathBuf::from).unwrap_or_default();
                Some(dir.join(format!("{}.designer.cs", self.managed_name())))
            }
        }
    }

    /// Whether both identity keys equal those of `other`
    pub fn same_identity(&self, other: &TypeMapping) -> bool {
        self.managed_id == other.managed_id && self.native_id == other.native_id
    }

    /// Check the base-type invariant against the platform root type
    pub fn has_valid_base(&self, root_managed_id: &str) -> bool {
        self.base.is_some() || self.managed_id == root_managed_id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
