//! ToNative Pass
//!
//! Reads the managed project, generates a header and implementation for every
//! bound type, mirrors the IDE resources and publishes a project file that ties
//! them together. Every token in the generated project is derived from the
//! object's kind and path, so running the pass twice yields identical output.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::fs;
use tracing::{debug, info, warn};
use xcsync_types::{TypeMapping, TypeRegistry};

use super::orchestrator::{PassReport, SyncError};
use super::state::SyncDirection;
use super::writer::{FileWriter, PendingWrite};
use crate::codegen;
use crate::managed::{CompilerFrontEnd, ManagedProjectReader};
use crate::pbx::{
    BuildSettingValue, BuildSettings, NativeProject, ObjectGraph, PbxBuildFile, PbxBuildPhase,
    PbxFileReference, PbxGroup, PbxNativeTarget, PbxObject, PbxProject, ProjectError,
    XcBuildConfiguration, XcConfigurationList, derived_token,
};
use crate::project::{PlatformTable, ProjectLoader, SyncConfig, TargetPlatform, bundle};

const CONFIGURATIONS: &[&str] = &["Debug", "Release"];

// ─────────────────────────────────────────────────────────────────────────────
// Native Project Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Collects the files of a native project and builds its object graph
pub struct NativeProjectBuilder {
    project_name: String,
    platform: Arc<PlatformTable>,
    os_version: String,
    sources: BTreeSet<String>,
    resources: BTreeSet<String>,
    frameworks: BTreeSet<String>,
}

impl NativeProjectBuilder {
    /// Start a project linking the platform's default frameworks
    pub fn new(
        project_name: impl Into<String>,
        platform: Arc<PlatformTable>,
        os_version: impl Into<String>,
    ) -> Self {
        let frameworks = platform.default_frameworks.iter().cloned().collect();
        Self {
            project_name: project_name.into(),
            platform,
            os_version: os_version.into(),
            sources: BTreeSet::new(),
            resources: BTreeSet::new(),
            frameworks,
        }
    }

    /// Add a generated `.h` or `.m` file, relative to the native root
    pub fn add_source(&mut self, relative: impl Into<String>) {
        self.sources.insert(relative.into());
    }

    /// Add a mirrored resource, relative to the native root
    ///
    /// Files inside an asset catalog add the catalog itself.
    pub fn add_resource(&mut self, relative: &Path) {
        let mut catalog = std::path::PathBuf::new();
        for component in relative.components() {
            catalog.push(component);
            if component.as_os_str().to_string_lossy().ends_with(".xcassets") {
                self.resources.insert(slash_path(&catalog));
                return;
            }
        }
        self.resources.insert(slash_path(relative));
    }

    /// Link additional frameworks
    pub fn add_frameworks<I, S>(&mut self, frameworks: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.frameworks.extend(frameworks.into_iter().map(Into::into));
    }

    pub fn frameworks(&self) -> &BTreeSet<String> {
        &self.frameworks
    }

    /// Build the project graph
    ///
    /// Fails only on an inconsistent graph, which means a bug in the builder.
    pub fn build(self) -> Result<NativeProject, ProjectError> {
        let name = self.project_name.as_str();
        let root = derived_token(&format!("PBXProject:{name}"));
        let project = NativeProject::new(root.clone());
        let graph = &project.objects;

        let mut main_children = Vec::new();
        let mut compiled = Vec::new();
        for path in &self.sources {
            let file_ref = add(graph, &format!("PBXFileReference:{path}"), file_reference(path))?;
            if path.ends_with(".m") {
                compiled.push(add(graph, &format!("PBXBuildFile:{path}"), build_file(&file_ref))?);
            }
            main_children.push(file_ref);
        }

        let mut bundled = Vec::new();
        let mut info_plist = None;
        let mut entitlements = None;
        for path in &self.resources {
            let file_ref = add(graph, &format!("PBXFileReference:{path}"), file_reference(path))?;
            match file_name(path) {
                "Info.plist" => info_plist = Some(path.clone()),
                "Entitlements.plist" => entitlements = Some(path.clone()),
                _ => bundled.push(add(graph, &format!("PBXBuildFile:{path}"), build_file(&file_ref))?),
            }
            main_children.push(file_ref);
        }

        let mut framework_refs = Vec::new();
        let mut linked = Vec::new();
        for framework in &self.frameworks {
            let file_ref = add(
                graph,
                &format!("PBXFileReference:framework:{framework}"),
                PbxObject::FileReference(PbxFileReference {
                    explicit_file_type: None,
                    include_in_index: None,
                    last_known_file_type: Some("wrapper.framework".to_string()),
                    name: Some(format!("{framework}.framework")),
                    path: format!("System/Library/Frameworks/{framework}.framework"),
                    source_tree: "SDKROOT".to_string(),
                    extra: IndexMap::new(),
                }),
            )?;
            linked.push(add(
                graph,
                &format!("PBXBuildFile:framework:{framework}"),
                build_file(&file_ref),
            )?);
            framework_refs.push(file_ref);
        }

        let product = add(
            graph,
            &format!("PBXFileReference:product:{name}"),
            PbxObject::FileReference(PbxFileReference {
                explicit_file_type: Some("wrapper.application".to_string()),
                include_in_index: Some("0".to_string()),
                last_known_file_type: None,
                name: None,
                path: format!("{name}.app"),
                source_tree: "BUILT_PRODUCTS_DIR".to_string(),
                extra: IndexMap::new(),
            }),
        )?;

        let frameworks_group = add(graph, "PBXGroup:Frameworks", group("Frameworks", framework_refs))?;
        let products_group = add(graph, "PBXGroup:Products", group("Products", vec![product.clone()]))?;
        main_children.push(frameworks_group);
        main_children.push(products_group.clone());
        let main_group = add(
            graph,
            "PBXGroup:main",
            PbxObject::Group(PbxGroup {
                children: main_children,
                name: None,
                path: None,
                source_tree: "<group>".to_string(),
                extra: IndexMap::new(),
            }),
        )?;

        let phases = vec![
            add(graph, "PBXSourcesBuildPhase", PbxObject::SourcesBuildPhase(PbxBuildPhase::new(compiled)))?,
            add(graph, "PBXFrameworksBuildPhase", PbxObject::FrameworksBuildPhase(PbxBuildPhase::new(linked)))?,
            add(graph, "PBXResourcesBuildPhase", PbxObject::ResourcesBuildPhase(PbxBuildPhase::new(bundled)))?,
        ];

        let target_list = configuration_list(graph, &format!("target:{name}"), |configuration| {
            let mut settings = BuildSettings::new();
            settings.insert("PRODUCT_NAME".into(), "$(TARGET_NAME)".into());
            settings.insert(
                "FRAMEWORK_SEARCH_PATHS".into(),
                BuildSettingValue::List(vec!["$(inherited)".to_string()]),
            );
            if let Some(plist) = &info_plist {
                settings.insert("INFOPLIST_FILE".into(), plist.as_str().into());
            }
            if let Some(entitlements) = &entitlements {
                settings.insert("CODE_SIGN_ENTITLEMENTS".into(), entitlements.as_str().into());
            }
            if configuration == "Debug" {
                settings.insert(
                    "GCC_PREPROCESSOR_DEFINITIONS".into(),
                    BuildSettingValue::List(vec!["DEBUG=1".to_string(), "$(inherited)".to_string()]),
                );
            }
            settings
        })?;

        let project_list = configuration_list(graph, &format!("project:{name}"), |configuration| {
            self.project_settings(configuration)
        })?;

        let target = add(
            graph,
            &format!("PBXNativeTarget:{name}"),
            PbxObject::NativeTarget(PbxNativeTarget {
                build_configuration_list: target_list,
                build_phases: phases,
                build_rules: Vec::new(),
                dependencies: Vec::new(),
                name: name.to_string(),
                product_name: Some(name.to_string()),
                product_reference: Some(product),
                product_type: "com.apple.product-type.application".to_string(),
                extra: IndexMap::new(),
            }),
        )?;

        let mut attributes = IndexMap::new();
        attributes.insert("LastUpgradeCheck".to_string(), serde_json::json!("1130"));
        graph.add_object(
            root,
            PbxObject::Project(PbxProject {
                attributes,
                build_configuration_list: project_list,
                compatibility_version: Some("Xcode 3.2".to_string()),
                development_region: Some("en".to_string()),
                has_scanned_for_encodings: "0".to_string(),
                known_regions: vec!["en".to_string(), "Base".to_string()],
                main_group,
                product_ref_group: Some(products_group),
                project_dir_path: String::new(),
                project_root: String::new(),
                targets: vec![target],
                extra: IndexMap::new(),
            }),
        )?;

        graph.validate_references(&project.root_object)?;
        debug!("Built native project {} with {} objects", name, graph.len());
        Ok(project)
    }

    fn project_settings(&self, configuration: &str) -> BuildSettings {
        let platform = &self.platform;
        let mut settings = BuildSettings::new();
        settings.insert("SDKROOT".into(), platform.sdk.as_str().into());
        settings.insert(
            platform.deployment_target_key.clone(),
            self.os_version.as_str().into(),
        );
        settings.insert("CLANG_ENABLE_OBJC_ARC".into(), "YES".into());
        match platform.platform {
            TargetPlatform::MacCatalyst => {
                settings.insert("SUPPORTS_MACCATALYST".into(), "YES".into());
            }
            TargetPlatform::Ios => {
                settings.insert("TARGETED_DEVICE_FAMILY".into(), "1,2".into());
            }
            TargetPlatform::MacOs | TargetPlatform::TvOs => {}
        }
        if configuration == "Debug" {
            settings.insert("ONLY_ACTIVE_ARCH".into(), "YES".into());
            settings.insert("DEBUG_INFORMATION_FORMAT".into(), "dwarf".into());
        } else {
            settings.insert("DEBUG_INFORMATION_FORMAT".into(), "dwarf-with-dsym".into());
        }
        settings
    }
}

fn add(graph: &ObjectGraph, seed: &str, object: PbxObject) -> Result<String, ProjectError> {
    let token = graph.derive_token(seed);
    graph.add_object(token.clone(), object)?;
    Ok(token)
}

fn configuration_list(
    graph: &ObjectGraph,
    scope: &str,
    settings: impl Fn(&str) -> BuildSettings,
) -> Result<String, ProjectError> {
    let mut configurations = Vec::new();
    for configuration in CONFIGURATIONS.iter().copied() {
        configurations.push(add(
            graph,
            &format!("XCBuildConfiguration:{scope}:{configuration}"),
            PbxObject::BuildConfiguration(XcBuildConfiguration {
                build_settings: settings(configuration),
                name: configuration.to_string(),
                extra: IndexMap::new(),
            }),
        )?);
    }
    add(
        graph,
        &format!("XCConfigurationList:{scope}"),
        PbxObject::ConfigurationList(XcConfigurationList {
            build_configurations: configurations,
            default_configuration_is_visible: "0".to_string(),
            default_configuration_name: Some("Release".to_string()),
            extra: IndexMap::new(),
        }),
    )
}

fn file_reference(path: &str) -> PbxObject {
    PbxObject::FileReference(PbxFileReference {
        explicit_file_type: None,
        include_in_index: None,
        last_known_file_type: Some(file_type(path).to_string()),
        name: None,
        path: path.to_string(),
        source_tree: "<group>".to_string(),
        extra: IndexMap::new(),
    })
}

fn build_file(file_ref: &str) -> PbxObject {
    PbxObject::BuildFile(PbxBuildFile {
        file_ref: file_ref.to_string(),
        settings: None,
        extra: IndexMap::new(),
    })
}

fn group(name: &str, children: Vec<String>) -> PbxObject {
    PbxObject::Group(PbxGroup {
        children,
        name: Some(name.to_string()),
        path: None,
        source_tree: "<group>".to_string(),
        extra: IndexMap::new(),
    })
}

/// Xcode file type for a path
fn file_type(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("h") => "sourcecode.c.h",
        Some("m") => "sourcecode.c.objc",
        Some("storyboard") => "file.storyboard",
        Some("xib") => "file.xib",
        Some("plist") => "text.plist.xml",
        Some("xcassets") => "folder.assetcatalog",
        _ => "text",
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

/// Relative path with `/` separators
fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry Population
// ─────────────────────────────────────────────────────────────────────────────

/// Read the managed project into a freshly cleared registry
///
/// Returns the discovered (registered, opted-in) types in discovery order.
/// Types whose identity collides with an earlier one are logged and left out.
pub(crate) async fn populate_registry(
    config: &SyncConfig,
    registry: &TypeRegistry,
    front_end: &dyn CompilerFrontEnd,
    report: &mut PassReport,
) -> Result<Vec<Arc<TypeMapping>>, SyncError> {
    let mut reader =
        ManagedProjectReader::open(front_end, &config.managed_root, Arc::clone(&config.platform))
            .await?;
    let discovered: Vec<_> = reader.discover().collect();
    info!(
        types = discovered.len(),
        conversions = reader.conversion_count(),
        "Read managed project {}",
        config.managed_root.display()
    );

    registry.clear();
    for mapping in reader.converted() {
        if let Err(e) = registry.add_type((*mapping).clone()) {
            warn!(managed = %mapping.managed_id, "Skipping type: {}", e);
        }
    }

    let mut registered = Vec::with_capacity(discovered.len());
    for mapping in discovered {
        let owned = registry
            .get_managed(&mapping.managed_id)
            .is_some_and(|m| m.native_id == mapping.native_id);
        if owned {
            registered.push(mapping);
        } else {
            report.types_skipped += 1;
        }
    }
    Ok(registered)
}

// ─────────────────────────────────────────────────────────────────────────────
// ToNative Pass
// ─────────────────────────────────────────────────────────────────────────────

/// One ToNative pass over borrowed orchestrator collaborators
pub(crate) struct ToNativePass<'a> {
    pub config: &'a SyncConfig,
    pub registry: &'a TypeRegistry,
    pub front_end: &'a dyn CompilerFrontEnd,
    pub writer: &'a FileWriter,
}

impl ToNativePass<'_> {
    pub async fn run(self) -> Result<PassReport, SyncError> {
        let config = self.config;
        let mut report = PassReport::new(SyncDirection::ToNative);

        let project_file = ProjectLoader::find_project_file(&config.managed_root).await?;
        let os_version = ProjectLoader::supported_os_version(&project_file, &config.platform).await;

        let mappings =
            populate_registry(config, self.registry, self.front_end, &mut report).await?;

        let mut builder = NativeProjectBuilder::new(
            config.project_name.clone(),
            Arc::clone(&config.platform),
            os_version,
        );
        let mut pending = Vec::new();

        for mapping in &mappings {
            if !mapping.generates_native() {
                debug!(managed = %mapping.managed_id, "Protocol type; no native files");
                continue;
            }
            match self.generate(mapping, &mut builder) {
                Ok(writes) => {
                    pending.extend(writes);
                    report.types_generated += 1;
                }
                Err(e) => {
                    warn!(managed = %mapping.managed_id, "Skipping type: {}", e);
                    report.types_skipped += 1;
                }
            }
        }

        for resource in ProjectLoader::resource_files(&config.managed_root).await? {
            if resource.path.starts_with(&config.native_root) {
                continue;
            }
            let bytes = fs::read(&resource.path)
                .await
                .map_err(|source| SyncError::Io {
                    path: resource.path.clone(),
                    source,
                })?;
            pending.push(
                self.writer
                    .publish_bytes(config.native_root.join(&resource.relative), bytes),
            );
            builder.add_resource(&resource.relative);
        }

        for (path, text) in
            bundle::bundle_files(&config.project_name, &config.user_name, &config.native_root)
        {
            pending.push(self.writer.publish_text(path, text));
        }

        debug!(frameworks = ?builder.frameworks(), "Linking frameworks");
        let project = builder.build()?;
        pending.push(self.writer.publish_text(config.pbxproj_path(), project.to_json()?));

        report.settle(pending).await?;
        Ok(report)
    }

    /// Publish the generated files of one type
    ///
    /// Designer fragments are only regenerated for types that already have a
    /// designer file; creating one would repeat the `[Register]` attribute of
    /// the user's partial class.
    fn generate(
        &self,
        mapping: &TypeMapping,
        builder: &mut NativeProjectBuilder,
    ) -> Result<Vec<PendingWrite>, codegen::CodegenError> {
        let header = codegen::header(mapping)?;
        let implementation = codegen::implementation(mapping)?;
        let designer = if mapping.in_designer && mapping.generates_designer() {
            mapping
                .designer_path()
                .map(|path| codegen::designer(mapping).map(|text| (path, text)))
                .transpose()?
        } else {
            None
        };

        let native_root = &self.config.native_root;
        let header_name = codegen::header_file_name(mapping);
        let implementation_name = codegen::implementation_file_name(mapping);

        let mut writes = vec![
            self.writer.publish_text(native_root.join(&header_name), header),
            self.writer
                .publish_text(native_root.join(&implementation_name), implementation),
        ];
        if let Some((path, text)) = designer {
            writes.push(self.writer.publish_text(path, text));
        }

        builder.add_source(header_name);
        builder.add_source(implementation_name);
        builder.add_frameworks(mapping.frameworks.iter().cloned());
        Ok(writes)
    }
}
