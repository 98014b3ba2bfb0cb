//! Managed Project Reader
//!
//! Converts registered managed classes (and everything they reference) into
//! [`TypeMapping`]s. Conversion is memoized per managed name, so each class in a
//! base chain is converted once no matter how many descendants reference it, and
//! cyclic base chains resolve to "no base type" instead of recursing forever.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};
use xcsync_types::{Action, MappingOrigin, Outlet, Parameter, TypeMapping};

use super::scanner::{CompilationError, CompilerFrontEnd};
use super::symbols::{ClassSymbol, Compilation, MemberDecl, MemberKind, find_attribute};
use crate::project::{FrameworkType, PlatformTable};

/// Error type for the managed reader
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("Failed to open managed project {path}: {source}")]
    Compilation {
        path: std::path::PathBuf,
        #[source]
        source: CompilationError,
    },
}

/// Memo table slot
#[derive(Debug, Clone)]
enum Slot {
    /// Conversion of this type is on the current resolution stack
    InProgress,
    /// Finished; `None` means the type has no resolvable base chain
    Done(Option<Arc<TypeMapping>>),
}

/// A type reference resolved against the compilation and platform tables
enum ResolvedType<'a> {
    Source(&'a ClassSymbol),
    Framework(&'a FrameworkType),
}

impl ResolvedType<'_> {
    fn full_name(&self) -> &str {
        match self {
            ResolvedType::Source(class) => &class.full_name,
            ResolvedType::Framework(framework) => &framework.managed,
        }
    }
}

/// Reads type mappings out of a managed compilation
pub struct ManagedProjectReader {
    compilation: Arc<Compilation>,
    platform: Arc<PlatformTable>,
    cache: HashMap<String, Slot>,
    /// Managed names in conversion-completion order (bases before derived)
    completed: Vec<String>,
    conversions: usize,
}

impl ManagedProjectReader {
    /// Create a reader over an already opened compilation
    pub fn new(compilation: Arc<Compilation>, platform: Arc<PlatformTable>) -> Self {
        Self {
            compilation,
            platform,
            cache: HashMap::new(),
            completed: Vec::new(),
            conversions: 0,
        }
    }

    /// Open a managed project through a front-end
    ///
    /// Failing to produce a compilation is fatal.
    pub async fn open(
        front_end: &dyn CompilerFrontEnd,
        path: &Path,
        platform: Arc<PlatformTable>,
    ) -> Result<Self, ReaderError> {
        let compilation = front_end
            .open_project(path)
            .await
            .map_err(|source| ReaderError::Compilation {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::new(Arc::new(compilation), platform))
    }

    /// The underlying compilation
    pub fn compilation(&self) -> &Compilation {
        &self.compilation
    }

    /// Number of conversions performed so far (one per distinct type)
    pub fn conversion_count(&self) -> usize {
        self.conversions
    }

    /// Lazily yield a mapping for every registered class
    ///
    /// Protocol-only types are yielded too; filtering them out of code
    /// generation is up to the caller.
    pub fn discover(&mut self) -> Discovery<'_> {
        let candidates = self
            .compilation
            .classes()
            .filter(|class| Self::is_registered(class))
            .map(|class| class.full_name.clone())
            .collect::<Vec<_>>()
            .into_iter();
        Discovery {
            reader: self,
            candidates,
        }
    }

    /// Every successfully converted mapping, bases before derived types
    pub fn converted(&self) -> Vec<Arc<TypeMapping>> {
        self.completed
            .iter()
            .filter_map(|name| match self.cache.get(name) {
                Some(Slot::Done(Some(mapping))) => Some(Arc::clone(mapping)),
                _ => None,
            })
            .collect()
    }

    /// Whether a class opts in through `[Register]` without skipping registration
    fn is_registered(class: &ClassSymbol) -> bool {
        let Some(register) = class.attribute("Register") else {
            return false;
        };
        !register
            .named_argument("SkipRegistration")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Convert a type by fully qualified managed name (memoized)
    pub fn convert(&mut self, managed_name: &str) -> Option<Arc<TypeMapping>> {
        match self.cache.get(managed_name) {
            Some(Slot::Done(mapping)) => return mapping.clone(),
            Some(Slot::InProgress) => {
                warn!("Cyclic base type chain through {}; treating as unresolvable", managed_name);
                return None;
            }
            None => {}
        }

        self.cache
            .insert(managed_name.to_string(), Slot::InProgress);

        let compilation = Arc::clone(&self.compilation);
        let platform = Arc::clone(&self.platform);
        let result = if let Some(class) = compilation.class(managed_name) {
            self.convert_source(class)
        } else if let Some(framework) = platform.framework_type(managed_name) {
            self.convert_framework(framework)
        } else {
            debug!("Unknown managed type {}", managed_name);
            None
        };

        self.conversions += 1;
        self.cache
            .insert(managed_name.to_string(), Slot::Done(result.clone()));
        if result.is_some() {
            self.completed.push(managed_name.to_string());
        }
        result
    }

    fn convert_framework(&mut self, framework: &FrameworkType) -> Option<Arc<TypeMapping>> {
        let mut mapping = TypeMapping::new(&framework.managed, &framework.native);
        if let Some(base) = &framework.base {
            mapping = mapping.with_base(self.convert(base)?);
        } else if framework.managed != self.platform.root_type {
            return None;
        }
        if self.platform.is_framework(framework.framework()) {
            mapping = mapping.with_framework(framework.framework());
        }
        Some(Arc::new(mapping))
    }

    fn convert_source(&mut self, class: &ClassSymbol) -> Option<Arc<TypeMapping>> {
        let mut namespaces = BTreeSet::new();

        let Some(base_name) = self.resolve_base(class) else {
            debug!("{} has no resolvable base type", class.full_name);
            return None;
        };
        let base = self.convert(&base_name)?;
        namespaces.extend(base.frameworks.iter().cloned());
        namespaces.insert(namespace_of(&base_name).to_string());

        let register = class.attribute("Register");
        let native_id = register
            .and_then(|r| r.first_argument())
            .unwrap_or(&class.name)
            .to_string();
        let is_model = class.attribute("Model").is_some();
        let is_protocol = class.attribute("Protocol").is_some();

        let mut outlets = Vec::new();
        let mut actions = Vec::new();
        if !is_model {
            for member in &class.members {
                if let Some(outlet) = self.convert_outlet(class, member, &mut namespaces) {
                    outlets.push(outlet);
                } else if let Some(action) = self.convert_action(class, member, &mut namespaces) {
                    actions.push(action);
                }
            }
        }

        let frameworks = namespaces
            .into_iter()
            .filter(|ns| self.platform.is_framework(ns))
            .collect();

        let mut mapping = TypeMapping::new(&class.full_name, native_id)
            .with_base(base)
            .with_origin(MappingOrigin::Source {
                file: class.source_file().unwrap_or(Path::new("")).to_path_buf(),
                designer_file: class.designer_file().map(Path::to_path_buf),
            })
            .with_outlets(outlets)
            .with_actions(actions);
        mapping.frameworks = frameworks;
        mapping.is_model = is_model;
        mapping.is_protocol = is_protocol;

        Some(Arc::new(mapping))
    }

    fn convert_outlet(
        &mut self,
        class: &ClassSymbol,
        member: &MemberDecl,
        namespaces: &mut BTreeSet<String>,
    ) -> Option<Outlet> {
        let attribute = find_attribute(&member.attributes, "Outlet")?;
        let MemberKind::Property { type_name } = &member.kind else {
            warn!(
                "{}.{}: [Outlet] is only supported on properties; skipping",
                class.full_name, member.name
            );
            return None;
        };

        let type_name = type_name.trim_end_matches('?');
        let (element, is_collection) = match type_name.strip_suffix("[]") {
            Some(element) => (element, true),
            None => (type_name, false),
        };

        let Some((managed_type, native_type)) = self.convert_reference(class, element) else {
            warn!(
                "{}.{}: cannot resolve outlet type {}; skipping",
                class.full_name, member.name, element
            );
            return None;
        };
        namespaces.insert(namespace_of(&managed_type).to_string());

        let mut outlet = Outlet::new(&member.name, managed_type, native_type);
        if let Some(native_name) = attribute.first_argument() {
            outlet = outlet.with_native_name(native_name);
        }
        if is_collection {
            outlet = outlet.collection();
        }
        Some(outlet)
    }

    fn convert_action(
        &mut self,
        class: &ClassSymbol,
        member: &MemberDecl,
        namespaces: &mut BTreeSet<String>,
    ) -> Option<Action> {
        let attribute = find_attribute(&member.attributes, "Action")?;
        let MemberKind::Method { parameters, .. } = &member.kind else {
            warn!(
                "{}.{}: [Action] is only supported on methods; skipping",
                class.full_name, member.name
            );
            return None;
        };

        let mut converted = Vec::with_capacity(parameters.len());
        for parameter in parameters {
            let type_name = parameter.type_name.trim_end_matches('?');
            let Some((managed_type, native_type)) = self.convert_reference(class, type_name) else {
                warn!(
                    "{}.{}: cannot resolve parameter type {}; skipping",
                    class.full_name, member.name, type_name
                );
                return None;
            };
            namespaces.insert(namespace_of(&managed_type).to_string());
            // Untyped senders are `id` on the native side
            let native_type = if managed_type == self.platform.root_type {
                "id".to_string()
            } else {
                native_type
            };
            converted.push(Parameter::new(&parameter.name, managed_type, native_type));
        }

        let selector = attribute
            .first_argument()
            .map(str::to_string)
            .unwrap_or_else(|| default_selector(&member.name, &converted));

        let mut action = Action::new(&member.name, selector);
        action.parameters = converted;
        Some(action)
    }

    /// Resolve and convert a referenced type, returning (managed, native) names
    fn convert_reference(&mut self, class: &ClassSymbol, name: &str) -> Option<(String, String)> {
        let resolved = self.resolve(class, name)?;
        let full_name = resolved.full_name().to_string();
        let mapping = self.convert(&full_name)?;
        Some((mapping.managed_id.clone(), mapping.native_id.clone()))
    }

    fn resolve_base(&self, class: &ClassSymbol) -> Option<String> {
        class
            .base_list
            .iter()
            .find_map(|name| self.resolve(class, name).map(|r| r.full_name().to_string()))
    }

    fn resolve<'s>(&'s self, class: &ClassSymbol, name: &str) -> Option<ResolvedType<'s>> {
        let name = strip_generics(name);
        Compilation::candidates(name, class).into_iter().find_map(|candidate| {
            if let Some(source) = self.compilation.class(&candidate) {
                Some(ResolvedType::Source(source))
            } else {
                self.platform
                    .framework_type(&candidate)
                    .map(ResolvedType::Framework)
            }
        })
    }
}

/// Iterator returned by [`ManagedProjectReader::discover`]
pub struct Discovery<'r> {
    reader: &'r mut ManagedProjectReader,
    candidates: std::vec::IntoIter<String>,
}

impl Iterator for Discovery<'_> {
    type Item = Arc<TypeMapping>;

    fn next(&mut self) -> Option<Self::Item> {
        for candidate in self.candidates.by_ref() {
            if let Some(mapping) = self.reader.convert(&candidate) {
                return Some(mapping);
            }
            debug!("Skipping {}: does not derive from the binding root", candidate);
        }
        None
    }
}

fn namespace_of(full_name: &str) -> &str {
    full_name.rsplit_once('.').map(|(ns, _)| ns).unwrap_or("")
}

fn strip_generics(name: &str) -> &str {
    name.split('<').next().unwrap_or(name)
}

/// `Name:` for one parameter, `Name:p2:p3:` for more, `Name` for none
fn default_selector(name: &str, parameters: &[Parameter]) -> String {
    let mut selector = name.to_string();
    for (i, parameter) in parameters.iter().enumerate() {
        if i > 0 {
            selector.push_str(&parameter.managed_name);
        }
        selector.push(':');
    }
    selector
}
