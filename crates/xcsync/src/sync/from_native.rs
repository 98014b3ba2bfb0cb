//! FromNative Pass
//!
//! Parses native headers and folds each declared interface back into the
//! registry, then regenerates the designer fragment of every type whose
//! outlets or actions changed.

use std::collections::BTreeSet;
use std::path::PathBuf;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use xcsync_types::{Action, Outlet, Parameter, TypeMapping, TypeRegistry};

use super::encoding::TextEncoding;
use super::orchestrator::{PassReport, SyncError};
use super::state::SyncDirection;
use super::writer::{FileWriter, PendingWrite};
use crate::codegen;
use crate::native::{NativeAction, NativeDeclaration, NativeDeclarationParser};
use crate::project::{PlatformTable, ProjectLoader, SyncConfig};

/// Native type used for untyped parameters and outlets
const UNTYPED: &str = "id";

// ─────────────────────────────────────────────────────────────────────────────
// Type Translation
// ─────────────────────────────────────────────────────────────────────────────

/// Translates native type names back to managed ones
struct NativeTypes<'a> {
    registry: &'a TypeRegistry,
    platform: &'a PlatformTable,
}

impl NativeTypes<'_> {
    fn managed(&self, native: &str) -> String {
        if native == UNTYPED {
            return self.platform.root_type.clone();
        }
        if let Some(mapping) = self.registry.get_native(native) {
            return mapping.managed_id.clone();
        }
        if let Some(framework_type) = self.platform.framework_type_by_native(native) {
            return framework_type.managed.clone();
        }
        warn!("Unknown native type {}; using {}", native, self.platform.root_type);
        self.platform.root_type.clone()
    }

    fn outlet(&self, existing: &TypeMapping, native: &crate::native::NativeOutlet) -> Outlet {
        if let Some(outlet) = existing
            .outlets
            .iter()
            .find(|o| o.native_name == native.name && o.native_type == native.type_name)
        {
            return Outlet {
                is_collection: native.is_collection,
                ..outlet.clone()
            };
        }
        let outlet = Outlet::new(&native.name, self.managed(&native.type_name), &native.type_name);
        if native.is_collection {
            outlet.collection()
        } else {
            outlet
        }
    }

    fn action(&self, existing: &TypeMapping, native: &NativeAction) -> Action {
        let previous = existing.actions.iter().find(|a| a.selector == native.selector);
        let managed_name = match previous {
            Some(action) => action.managed_name.clone(),
            None => native
                .selector
                .split(':')
                .next()
                .unwrap_or(&native.selector)
                .to_string(),
        };

        let mut action = Action::new(managed_name, &native.selector);
        for (index, parameter) in native.parameters.iter().enumerate() {
            let kept = previous
                .and_then(|a| a.parameters.get(index))
                .filter(|p| p.native_type == parameter.type_name);
            action = action.with_parameter(match kept {
                Some(p) => p.clone(),
                None => Parameter::new(
                    &parameter.name,
                    self.managed(&parameter.type_name),
                    &parameter.type_name,
                ),
            });
        }
        action
    }

    /// The mapping `existing` updated with the members of `declaration`
    fn rebuild(&self, existing: &TypeMapping, declaration: &NativeDeclaration) -> TypeMapping {
        let outlets: Vec<_> = declaration
            .outlets
            .iter()
            .map(|o| self.outlet(existing, o))
            .collect();
        let actions: Vec<_> = declaration
            .actions
            .iter()
            .map(|a| self.action(existing, a))
            .collect();

        let mut frameworks: BTreeSet<String> = existing.frameworks.clone();
        let member_types = outlets
            .iter()
            .map(|o| o.managed_type.as_str())
            .chain(actions.iter().flat_map(|a| a.parameters.iter().map(|p| p.managed_type.as_str())));
        for managed_type in member_types {
            if let Some((namespace, _)) = managed_type.rsplit_once('.') {
                if self.platform.is_framework(namespace) {
                    frameworks.insert(namespace.to_string());
                }
            }
        }

        TypeMapping {
            outlets,
            actions,
            frameworks,
            ..existing.clone()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FromNative Pass
// ─────────────────────────────────────────────────────────────────────────────

/// One FromNative pass over borrowed orchestrator collaborators
pub(crate) struct FromNativePass<'a> {
    pub config: &'a SyncConfig,
    pub registry: &'a TypeRegistry,
    pub parser: &'a NativeDeclarationParser,
    pub writer: &'a FileWriter,
}

impl FromNativePass<'_> {
    /// Parse `headers` (every header under the native root when `None`)
    pub async fn run(self, headers: Option<Vec<PathBuf>>) -> Result<PassReport, SyncError> {
        let mut report = PassReport::new(SyncDirection::FromNative);
        let headers = match headers {
            Some(headers) => headers,
            None => ProjectLoader::walk(&self.config.native_root)
                .await?
                .into_iter()
                .filter(|p| p.extension().is_some_and(|ext| ext == "h"))
                .collect(),
        };
        info!("Parsing {} native header(s)", headers.len());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let parsing = join_all(
            headers
                .iter()
                .map(|path| self.parser.parse_file(path, tx.clone())),
        );
        drop(tx);

        let types = NativeTypes {
            registry: self.registry,
            platform: &self.config.platform,
        };
        let listening = async {
            let mut pending = Vec::new();
            let mut skipped = 0;
            while let Some(declaration) = rx.recv().await {
                match self.fold(&types, &declaration).await {
                    Some(write) => pending.push(write),
                    None => skipped += 1,
                }
            }
            (pending, skipped)
        };

        let (results, (pending, skipped)) = tokio::join!(parsing, listening);
        for (path, result) in headers.iter().zip(results) {
            match result {
                Ok(count) => debug!("{}: {} declaration(s)", path.display(), count),
                Err(e) => error!("Skipping {}: {}", path.display(), e),
            }
        }

        report.types_generated = pending.len();
        report.types_skipped = skipped;
        report.settle(pending).await?;
        Ok(report)
    }

    /// Fold one declaration into the registry and publish its designer file
    ///
    /// Returns `None` when nothing is written back.
    async fn fold(&self, types: &NativeTypes<'_>, declaration: &NativeDeclaration) -> Option<PendingWrite> {
        let name = &declaration.name;
        let Some(existing) = self.registry.get_native(name) else {
            info!(native = %name, "No managed type for native declaration; skipping");
            return None;
        };
        if !existing.generates_designer() {
            debug!(native = %name, "Type has no designer fragment");
            return None;
        }
        if !existing.in_designer {
            warn!(
                managed = %existing.managed_id,
                "Type has no designer file; native changes are not written back"
            );
            return None;
        }

        let updated = types.rebuild(&existing, declaration);
        if updated == *existing {
            debug!(managed = %existing.managed_id, "Unchanged");
            return None;
        }

        let path = updated.designer_path()?;
        let current = match tokio::fs::read(&path).await {
            Ok(bytes) => Some(TextEncoding::decode(&bytes).1),
            Err(_) => None,
        };
        if let Some(current) = &current {
            if codegen::declared_class_count(current) > 1 {
                warn!(
                    "{} declares more than one class; not rewriting it",
                    path.display()
                );
                return None;
            }
            let expected = codegen::designer(&existing).ok();
            if expected.as_deref() != Some(current.as_str()) {
                warn!(
                    managed = %existing.managed_id,
                    "{} changed on both sides; native members replace managed edits",
                    path.display()
                );
            }
        }

        let text = match codegen::designer(&updated) {
            Ok(text) => text,
            Err(e) => {
                warn!(managed = %updated.managed_id, "Skipping type: {}", e);
                return None;
            }
        };
        if !self.registry.try_update_mapping(&existing, updated) {
            warn!(managed = %existing.managed_id, "Mapping was replaced concurrently; skipping");
            return None;
        }

        info!(managed = %existing.managed_id, "Writing back {}", path.display());
        Some(self.writer.publish_text(path, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{NativeOutlet, NativeParameter, SourceLocation};
    use crate::project::TargetPlatform;
    use std::sync::Arc;

    fn existing() -> TypeMapping {
        TypeMapping::new("Sample.ViewController", "ViewController")
            .with_base(Arc::new(TypeMapping::new("Foundation.NSObject", "NSObject")))
            .with_outlets(vec![
                Outlet::new("Images", "AppKit.NSImageView", "NSImageView")
                    .collection()
                    .with_native_name("images"),
            ])
            .with_actions(vec![Action::new("OnUpload", "UploadButton:").with_parameter(
                Parameter::new("button", "Foundation.NSObject", "id"),
            )])
            .with_framework("AppKit")
    }

    fn declaration() -> NativeDeclaration {
        NativeDeclaration {
            name: "ViewController".to_string(),
            superclass: Some("NSViewController".to_string()),
            protocols: Vec::new(),
            outlets: vec![
                NativeOutlet {
                    name: "images".to_string(),
                    type_name: "NSImageView".to_string(),
                    is_collection: true,
                },
                NativeOutlet {
                    name: "Browser".to_string(),
                    type_name: "WKWebView".to_string(),
                    is_collection: false,
                },
            ],
            actions: vec![
                NativeAction {
                    selector: "UploadButton:".to_string(),
                    parameters: vec![NativeParameter {
                        name: "sender".to_string(),
                        type_name: "id".to_string(),
                    }],
                },
                NativeAction {
                    selector: "move:to:".to_string(),
                    parameters: vec![
                        NativeParameter {
                            name: "sender".to_string(),
                            type_name: "id".to_string(),
                        },
                        NativeParameter {
                            name: "target".to_string(),
                            type_name: "Custom".to_string(),
                        },
                    ],
                },
            ],
            location: SourceLocation { line: 1, column: 1 },
        }
    }

    #[test]
    fn test_rebuild_keeps_managed_names() {
        let registry = TypeRegistry::new();
        registry
            .add_type(TypeMapping::new("Sample.Custom", "Custom"))
            .unwrap();
        let platform = PlatformTable::for_platform(TargetPlatform::MacOs);
        let types = NativeTypes {
            registry: &registry,
            platform: &platform,
        };

        let updated = types.rebuild(&existing(), &declaration());

        assert_eq!(updated.outlets[0], existing().outlets[0]);
        assert_eq!(updated.outlets[1].managed_type, "WebKit.WKWebView");
        assert!(updated.frameworks.contains("WebKit"));

        assert_eq!(updated.actions[0], existing().actions[0]);
        let moved = &updated.actions[1];
        assert_eq!(moved.managed_name, "move");
        assert_eq!(moved.parameters[0].managed_type, "Foundation.NSObject");
        assert_eq!(moved.parameters[1].managed_type, "Sample.Custom");
        assert!(updated.same_identity(&existing()));
    }

    #[test]
    fn test_unknown_native_type_maps_to_root() {
        let registry = TypeRegistry::new();
        let platform = PlatformTable::for_platform(TargetPlatform::Ios);
        let types = NativeTypes {
            registry: &registry,
            platform: &platform,
        };
        assert_eq!(types.managed("id"), "Foundation.NSObject");
        assert_eq!(types.managed("UILabel"), "UIKit.UILabel");
        assert_eq!(types.managed("Mystery"), "Foundation.NSObject");
    }
}
