//! Project Objects
//!
//! The closed set of object kinds a native project file may contain. Each kind
//! is a variant of [`PbxObject`], tagged by its `isa` string.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A build setting value, kept in the form it was written in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BuildSettingValue {
    Scalar(String),
    List(Vec<String>),
}

impl From<&str> for BuildSettingValue {
    fn from(value: &str) -> Self {
        BuildSettingValue::Scalar(value.to_string())
    }
}

impl From<Vec<String>> for BuildSettingValue {
    fn from(values: Vec<String>) -> Self {
        BuildSettingValue::List(values)
    }
}

pub type BuildSettings = IndexMap<String, BuildSettingValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbxBuildFile {
    pub file_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<IndexMap<String, serde_json::Value>>,
    /// Keys the model does not interpret
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbxFileReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit_file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_in_index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_known_file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub path: String,
    pub source_tree: String,
    /// Keys the model does not interpret
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbxGroup {
    pub children: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub source_tree: String,
    /// Keys the model does not interpret
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

/// Shared shape of the sources, resources and frameworks build phases
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbxBuildPhase {
    pub build_action_mask: String,
    pub files: Vec<String>,
    pub run_only_for_deployment_postprocessing: String,
    /// Keys the model does not interpret
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl PbxBuildPhase {
    pub fn new(files: Vec<String>) -> Self {
        Self {
            build_action_mask: "2147483647".to_string(),
            files,
            run_only_for_deployment_postprocessing: "0".to_string(),
            extra: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XcBuildConfiguration {
    pub build_settings: BuildSettings,
    pub name: String,
    /// Keys the model does not interpret
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XcConfigurationList {
    pub build_configurations: Vec<String>,
    pub default_configuration_is_visible: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_configuration_name: Option<String>,
    /// Keys the model does not interpret
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbxNativeTarget {
    pub build_configuration_list: String,
    pub build_phases: Vec<String>,
    #[serde(default)]
    pub build_rules: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_reference: Option<String>,
    pub product_type: String,
    /// Keys the model does not interpret
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PbxProject {
    #[serde(default)]
    pub attributes: IndexMap<String, serde_json::Value>,
    pub build_configuration_list: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub development_region: Option<String>,
    pub has_scanned_for_encodings: String,
    #[serde(default)]
    pub known_regions: Vec<String>,
    pub main_group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_ref_group: Option<String>,
    pub project_dir_path: String,
    pub project_root: String,
    pub targets: Vec<String>,
    /// Keys the model does not interpret
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Object Kinds
// ─────────────────────────────────────────────────────────────────────────────

/// Every object kind the model understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "isa")]
pub enum PbxObject {
    #[serde(rename = "PBXBuildFile")]
    BuildFile(PbxBuildFile),
    #[serde(rename = "PBXFileReference")]
    FileReference(PbxFileReference),
    #[serde(rename = "PBXGroup")]
    Group(PbxGroup),
    #[serde(rename = "PBXSourcesBuildPhase")]
    SourcesBuildPhase(PbxBuildPhase),
    #[serde(rename = "PBXResourcesBuildPhase")]
    ResourcesBuildPhase(PbxBuildPhase),
    #[serde(rename = "PBXFrameworksBuildPhase")]
    FrameworksBuildPhase(PbxBuildPhase),
    #[serde(rename = "XCBuildConfiguration")]
    BuildConfiguration(XcBuildConfiguration),
    #[serde(rename = "XCConfigurationList")]
    ConfigurationList(XcConfigurationList),
    #[serde(rename = "PBXNativeTarget")]
    NativeTarget(PbxNativeTarget),
    #[serde(rename = "PBXProject")]
    Project(PbxProject),
}

impl PbxObject {
    /// `isa` values of every known kind
    pub const KINDS: &'static [&'static str] = &[
        "PBXBuildFile",
        "PBXFileReference",
        "PBXGroup",
        "PBXSourcesBuildPhase",
        "PBXResourcesBuildPhase",
        "PBXFrameworksBuildPhase",
        "XCBuildConfiguration",
        "XCConfigurationList",
        "PBXNativeTarget",
        "PBXProject",
    ];

    /// Whether an `isa` string names a known kind
    pub fn is_known_kind(isa: &str) -> bool {
        Self::KINDS.contains(&isa)
    }

    pub fn isa(&self) -> &'static str {
        match self {
            PbxObject::BuildFile(_) => "PBXBuildFile",
            PbxObject::FileReference(_) => "PBXFileReference",
            PbxObject::Group(_) => "PBXGroup",
            PbxObject::SourcesBuildPhase(_) => "PBXSourcesBuildPhase",
            PbxObject::ResourcesBuildPhase(_) => "PBXResourcesBuildPhase",
            PbxObject::FrameworksBuildPhase(_) => "PBXFrameworksBuildPhase",
            PbxObject::BuildConfiguration(_) => "XCBuildConfiguration",
            PbxObject::ConfigurationList(_) => "XCConfigurationList",
            PbxObject::NativeTarget(_) => "PBXNativeTarget",
            PbxObject::Project(_) => "PBXProject",
        }
    }

    /// Tokens of every object this one refers to
    pub fn references(&self) -> Vec<&str> {
        match self {
            PbxObject::BuildFile(file) => vec![file.file_ref.as_str()],
            PbxObject::FileReference(_) | PbxObject::BuildConfiguration(_) => Vec::new(),
            PbxObject::Group(group) => group.children.iter().map(String::as_str).collect(),
            PbxObject::SourcesBuildPhase(phase)
            | PbxObject::ResourcesBuildPhase(phase)
            | PbxObject::FrameworksBuildPhase(phase) => {
                phase.files.iter().map(String::as_str).collect()
            }
            PbxObject::ConfigurationList(list) => list
                .build_configurations
                .iter()
                .map(String::as_str)
                .collect(),
            PbxObject::NativeTarget(target) => std::iter::once(&target.build_configuration_list)
                .chain(&target.build_phases)
                .chain(&target.build_rules)
                .chain(&target.dependencies)
                .chain(&target.product_reference)
                .map(String::as_str)
                .collect(),
            PbxObject::Project(project) => std::iter::once(&project.build_configuration_list)
                .chain(std::iter::once(&project.main_group))
                .chain(&project.product_ref_group)
                .chain(&project.targets)
                .map(String::as_str)
                .collect(),
        }
    }
}
