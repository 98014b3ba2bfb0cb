//! Native Project Document
//!
//! Loads and saves the JSON form of a native project file. A document that is
//! loaded and saved without changes comes back byte for byte: objects read
//! from disk keep their key order and any keys the model does not know.

use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use tracing::debug;

use super::graph::{ObjectGraph, ProjectError};
use super::objects::PbxObject;

pub const ARCHIVE_VERSION: &str = "1";
pub const OBJECT_VERSION: &str = "46";

const CLASSES: &str = "classes";
const OBJECT_VERSION_KEY: &str = "objectVersion";
const ARCHIVE_VERSION_KEY: &str = "archiveVersion";
const OBJECTS: &str = "objects";
const ROOT_OBJECT: &str = "rootObject";

/// Top-level keys in the order a new document writes them
const DOCUMENT_KEYS: &[&str] = &[CLASSES, OBJECT_VERSION_KEY, ARCHIVE_VERSION_KEY, OBJECTS, ROOT_OBJECT];

/// A native project file
#[derive(Debug)]
pub struct NativeProject {
    pub classes: IndexMap<String, Value>,
    pub object_version: String,
    pub archive_version: String,
    pub objects: ObjectGraph,
    pub root_object: String,
    /// Top-level keys the model does not interpret
    pub extra: IndexMap<String, Value>,
    /// Top-level key order of the loaded document
    layout: Vec<String>,
}

fn take_string(document: &mut Map<String, Value>, key: &str) -> Result<String, ProjectError> {
    match document.remove(key) {
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(ProjectError::MalformedDocument(format!("'{key}' must be a string"))),
        None => Err(ProjectError::MalformedDocument(format!("missing '{key}'"))),
    }
}

impl NativeProject {
    /// An empty project whose root object is yet to be added
    pub fn new(root_object: impl Into<String>) -> Self {
        Self {
            classes: IndexMap::new(),
            object_version: OBJECT_VERSION.to_string(),
            archive_version: ARCHIVE_VERSION.to_string(),
            objects: ObjectGraph::new(),
            root_object: root_object.into(),
            extra: IndexMap::new(),
            layout: DOCUMENT_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Decode a document
    ///
    /// Each object's `isa` is checked against the known kinds before the
    /// object body is decoded.
    pub fn from_json(text: &str) -> Result<Self, ProjectError> {
        let mut document: Map<String, Value> = serde_json::from_str(text)?;
        let layout = document.keys().cloned().collect();

        let classes = match document.remove(CLASSES) {
            Some(value) => serde_json::from_value(value)?,
            None => IndexMap::new(),
        };
        let object_version = take_string(&mut document, OBJECT_VERSION_KEY)?;
        let archive_version = take_string(&mut document, ARCHIVE_VERSION_KEY)?;
        let root_object = take_string(&mut document, ROOT_OBJECT)?;
        let raw_objects: IndexMap<String, Value> = match document.remove(OBJECTS) {
            Some(value) => serde_json::from_value(value)?,
            None => return Err(ProjectError::MalformedDocument(format!("missing '{OBJECTS}'"))),
        };

        let objects = ObjectGraph::new();
        for (token, value) in raw_objects {
            let isa = value
                .get("isa")
                .and_then(|v| v.as_str())
                .ok_or_else(|| ProjectError::MissingKind {
                    token: token.clone(),
                })?;
            if !PbxObject::is_known_kind(isa) {
                return Err(ProjectError::UnknownObjectKind {
                    token,
                    isa: isa.to_string(),
                });
            }
            let object: PbxObject = serde_json::from_value(value.clone())?;
            objects.add_loaded(token, object, value)?;
        }

        Ok(Self {
            classes,
            object_version,
            archive_version,
            objects,
            root_object,
            extra: document.into_iter().collect(),
            layout,
        })
    }

    /// Encode the document after checking every reference resolves
    pub fn to_json(&self) -> Result<String, ProjectError> {
        self.objects.validate_references(&self.root_object)?;

        let mut objects = Map::new();
        for (token, value) in self.objects.documents()? {
            objects.insert(token, value);
        }
        let mut known: IndexMap<&str, Value> = IndexMap::new();
        known.insert(CLASSES, serde_json::to_value(&self.classes)?);
        known.insert(OBJECT_VERSION_KEY, Value::String(self.object_version.clone()));
        known.insert(ARCHIVE_VERSION_KEY, Value::String(self.archive_version.clone()));
        known.insert(OBJECTS, Value::Object(objects));
        known.insert(ROOT_OBJECT, Value::String(self.root_object.clone()));

        let mut document = Map::new();
        for key in &self.layout {
            if let Some(value) = known.shift_remove(key.as_str()) {
                document.insert(key.clone(), value);
            } else if let Some(value) = self.extra.get(key) {
                document.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in known {
            document.insert(key.to_string(), value);
        }
        for (key, value) in &self.extra {
            if !document.contains_key(key) {
                document.insert(key.clone(), value.clone());
            }
        }

        let mut out = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"\t"));
        document.serialize(&mut serializer)?;
        out.push(b'\n');
        // serde_json only emits valid UTF-8
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Load a project file
    pub async fn load(path: &Path) -> Result<Self, ProjectError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ProjectError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let project = Self::from_json(&text)?;
        debug!("Loaded {} objects from {}", project.objects.len(), path.display());
        Ok(project)
    }

    /// Save to a project file, creating parent directories
    pub async fn save(&self, path: &Path) -> Result<(), ProjectError> {
        let text = self.to_json()?;
        let io_error = |source| ProjectError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(path, text).await.map_err(io_error)?;
        debug!("Saved {} objects to {}", self.objects.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DOCUMENT: &str = "{
\t\"classes\": {},
\t\"objectVersion\": \"46\",
\t\"archiveVersion\": \"1\",
\t\"objects\": {
\t\t\"0A1B2C3D4E5F000000000001\": {
\t\t\t\"isa\": \"PBXFileReference\",
\t\t\t\"lastKnownFileType\": \"sourcecode.c.h\",
\t\t\t\"path\": \"ViewController.h\",
\t\t\t\"sourceTree\": \"<group>\"
\t\t},
\t\t\"0A1B2C3D4E5F000000000002\": {
\t\t\t\"isa\": \"PBXGroup\",
\t\t\t\"children\": [
\t\t\t\t\"0A1B2C3D4E5F000000000001\"
\t\t\t],
\t\t\t\"sourceTree\": \"<group>\"
\t\t},
\t\t\"0A1B2C3D4E5F000000000003\": {
\t\t\t\"isa\": \"XCBuildConfiguration\",
\t\t\t\"buildSettings\": {
\t\t\t\t\"SDKROOT\": \"macosx\",
\t\t\t\t\"FRAMEWORK_SEARCH_PATHS\": [
\t\t\t\t\t\"$(inherited)\"
\t\t\t\t],
\t\t\t\t\"OTHER_LDFLAGS\": []
\t\t\t},
\t\t\t\"name\": \"Debug\"
\t\t},
\t\t\"0A1B2C3D4E5F000000000004\": {
\t\t\t\"isa\": \"XCConfigurationList\",
\t\t\t\"buildConfigurations\": [
\t\t\t\t\"0A1B2C3D4E5F000000000003\"
\t\t\t],
\t\t\t\"defaultConfigurationIsVisible\": \"0\",
\t\t\t\"defaultConfigurationName\": \"Debug\"
\t\t},
\t\t\"0A1B2C3D4E5F000000000005\": {
\t\t\t\"isa\": \"PBXProject\",
\t\t\t\"attributes\": {
\t\t\t\t\"LastUpgradeCheck\": \"1130\"
\t\t\t},
\t\t\t\"buildConfigurationList\": \"0A1B2C3D4E5F000000000004\",
\t\t\t\"hasScannedForEncodings\": \"0\",
\t\t\t\"knownRegions\": [
\t\t\t\t\"en\"
\t\t\t],
\t\t\t\"mainGroup\": \"0A1B2C3D4E5F000000000002\",
\t\t\t\"projectDirPath\": \"\",
\t\t\t\"projectRoot\": \"\",
\t\t\t\"targets\": []
\t\t}
\t},
\t\"rootObject\": \"0A1B2C3D4E5F000000000005\"
}
";

    #[test]
    fn test_round_trip_is_byte_identical() {
        let project = NativeProject::from_json(DOCUMENT).unwrap();
        assert_eq!(project.objects.len(), 5);
        assert_eq!(project.to_json().unwrap(), DOCUMENT);
    }

    #[test]
    fn test_round_trip_keeps_foreign_keys_and_order() {
        let text = DOCUMENT
            .replace(
                "\t\"classes\": {},\n\t\"objectVersion\": \"46\",\n",
                "\t\"objectVersion\": \"46\",\n\t\"classes\": {},\n",
            )
            .replace(
                "\t\t\t\"lastKnownFileType\": \"sourcecode.c.h\",\n\t\t\t\"path\": \"ViewController.h\",\n\t\t\t\"sourceTree\": \"<group>\"\n",
                "\t\t\t\"fileEncoding\": \"4\",\n\t\t\t\"lastKnownFileType\": \"sourcecode.c.h\",\n\t\t\t\"sourceTree\": \"<group>\",\n\t\t\t\"path\": \"ViewController.h\"\n",
            )
            .replace(
                "\t\"rootObject\": \"0A1B2C3D4E5F000000000005\"\n",
                "\t\"rootObject\": \"0A1B2C3D4E5F000000000005\",\n\t\"generator\": \"xcsync\"\n",
            );
        assert!(text.contains("fileEncoding") && text.contains("generator"));
        assert!(text.find("\"sourceTree\": \"<group>\",\n\t\t\t\"path\"").is_some());

        let project = NativeProject::from_json(&text).unwrap();
        assert_eq!(project.to_json().unwrap(), text);
        assert_eq!(project.extra["generator"], "xcsync");

        match project.objects.get("0A1B2C3D4E5F000000000001") {
            Some(PbxObject::FileReference(file)) => {
                assert_eq!(file.path, "ViewController.h");
                assert_eq!(file.extra["fileEncoding"], "4");
            }
            other => panic!("expected a file reference, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_root_object() {
        let text = DOCUMENT.replace(
            ",\n\t\"rootObject\": \"0A1B2C3D4E5F000000000005\"\n",
            "\n",
        );
        assert!(matches!(
            NativeProject::from_json(&text),
            Err(ProjectError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_unknown_object_kind() {
        let text = DOCUMENT.replace("\"PBXGroup\"", "\"PBXVariantGroup\"");
        match NativeProject::from_json(&text) {
            Err(ProjectError::UnknownObjectKind { token, isa }) => {
                assert_eq!(token, "0A1B2C3D4E5F000000000002");
                assert_eq!(isa, "PBXVariantGroup");
            }
            other => panic!("expected unknown object kind, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_isa() {
        let text = DOCUMENT.replace("\t\t\t\"isa\": \"PBXGroup\",\n", "");
        assert!(matches!(
            NativeProject::from_json(&text),
            Err(ProjectError::MissingKind { .. })
        ));
    }

    #[test]
    fn test_dangling_reference_blocks_save() {
        let project = NativeProject::from_json(DOCUMENT).unwrap();
        project.objects.remove_object("0A1B2C3D4E5F000000000001").unwrap();
        assert!(matches!(
            project.to_json(),
            Err(ProjectError::DanglingReference { .. })
        ));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("App.xcodeproj").join("project.pbxproj");

        let project = NativeProject::from_json(DOCUMENT).unwrap();
        project.save(&path).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DOCUMENT);

        let loaded = NativeProject::load(&path).await.unwrap();
        assert_eq!(loaded.root_object, "0A1B2C3D4E5F000000000005");
        assert_eq!(loaded.objects.len(), 5);
    }
}
