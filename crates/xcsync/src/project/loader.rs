//! Project Loader
//!
//! Enumerates the files of a managed project: its `.csproj`, C# sources, and the
//! IDE-relevant resources (plists, storyboards, asset catalogs) mirrored into the
//! native project.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use super::config::PlatformTable;

/// Error type for project loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Project path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("No .csproj found in {0}")]
    ProjectFileNotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Kind of IDE resource mirrored between the projects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Info.plist / Entitlements.plist
    PropertyList,
    /// Interface Builder storyboard or xib
    Interface,
    /// File inside an `.xcassets` asset catalog
    AssetCatalog,
}

/// A resource file with its path relative to the project root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFile {
    pub kind: ResourceKind,
    pub path: PathBuf,
    pub relative: PathBuf,
}

/// Directory names never descended into
const SKIPPED_DIRS: &[&str] = &["bin", "obj"];

/// Managed project loader
pub struct ProjectLoader;

impl ProjectLoader {
    /// Resolve a project argument (directory or `.csproj`) to its root directory
    pub fn project_root(path: &Path) -> Result<PathBuf, LoadError> {
        if !path.exists() {
            return Err(LoadError::PathNotFound(path.to_path_buf()));
        }
        if path.is_file() {
            return Ok(path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")));
        }
        Ok(path.to_path_buf())
    }

    /// Find the `.csproj` in a project root
    pub async fn find_project_file(root: &Path) -> Result<PathBuf, LoadError> {
        let mut entries = fs::read_dir(root).await.map_err(|source| LoadError::ReadError {
            path: root.to_path_buf(),
            source,
        })?;
        let mut candidates = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "csproj") {
                candidates.push(path);
            }
        }
        candidates.sort();
        candidates
            .into_iter()
            .next()
            .ok_or_else(|| LoadError::ProjectFileNotFound(root.to_path_buf()))
    }

    /// Recursively list all files under `root`, skipping build output and hidden
    /// directories
    pub async fn walk(root: &Path) -> Result<Vec<PathBuf>, LoadError> {
        if !root.exists() {
            return Err(LoadError::PathNotFound(root.to_path_buf()));
        }

        let mut files = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(|source| LoadError::ReadError {
                path: dir.clone(),
                source,
            })?;
            while let Some(entry) = entries.next_entry().await.map_err(|source| {
                LoadError::ReadError {
                    path: dir.clone(),
                    source,
                }
            })? {
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();
                let file_type = entry.file_type().await.map_err(|source| LoadError::ReadError {
                    path: path.clone(),
                    source,
                })?;

                if file_type.is_dir() {
                    if name.starts_with('.')
                        || SKIPPED_DIRS.contains(&name.as_str())
                        || name.ends_with(".xcodeproj")
                    {
                        debug!("Skipping directory {}", path.display());
                        continue;
                    }
                    pending.push(path);
                } else if !name.starts_with('.') {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// List the C# source files of a project
    pub async fn source_files(root: &Path) -> Result<Vec<PathBuf>, LoadError> {
        let files = Self::walk(root).await?;
        let sources: Vec<_> = files
            .into_iter()
            .filter(|p| p.extension().is_some_and(|ext| ext == "cs"))
            .collect();
        info!("Found {} C# source files in {}", sources.len(), root.display());
        Ok(sources)
    }

    /// List the resources mirrored into the native project
    pub async fn resource_files(root: &Path) -> Result<Vec<ResourceFile>, LoadError> {
        let files = Self::walk(root).await?;
        let resources: Vec<_> = files
            .into_iter()
            .filter_map(|path| {
                let relative = path.strip_prefix(root).ok()?.to_path_buf();
                let kind = Self::classify_resource(&relative)?;
                Some(ResourceFile {
                    kind,
                    path,
                    relative,
                })
            })
            .collect();
        debug!("Found {} resources in {}", resources.len(), root.display());
        Ok(resources)
    }

    /// Classify a relative path as a mirrored resource
    pub fn classify_resource(relative: &Path) -> Option<ResourceKind> {
        if relative
            .components()
            .any(|c| c.as_os_str().to_string_lossy().ends_with(".xcassets"))
        {
            return Some(ResourceKind::AssetCatalog);
        }
        match relative.extension()?.to_str()? {
            "storyboard" | "xib" => Some(ResourceKind::Interface),
            "plist" => {
                let name = relative.file_name()?.to_str()?;
                matches!(name, "Info.plist" | "Entitlements.plist")
                    .then_some(ResourceKind::PropertyList)
            }
            _ => None,
        }
    }

    /// Read the supported OS version from the project file
    ///
    /// Falls back to the platform default when the project does not declare
    /// `<SupportedOSPlatformVersion>`.
    pub async fn supported_os_version(project_file: &Path, platform: &PlatformTable) -> String {
        let version = match fs::read_to_string(project_file).await {
            Ok(content) => extract_element(&content, "SupportedOSPlatformVersion"),
            Err(e) => {
                debug!("Could not read {}: {}", project_file.display(), e);
                None
            }
        };
        version.unwrap_or_else(|| platform.default_os_version.clone())
    }
}

/// Extract the text of the first `<name>...</name>` element
fn extract_element(content: &str, name: &str) -> Option<String> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    let start = content.find(&open)? + open.len();
    let end = content[start..].find(&close)? + start;
    let value = content[start..end].trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::TargetPlatform;
    use tempfile::TempDir;

    async fn create_test_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let path = dir.path();

        fs::write(
            path.join("App.csproj"),
            "<Project><PropertyGroup><SupportedOSPlatformVersion>11.0</SupportedOSPlatformVersion></PropertyGroup></Project>",
        )
        .await
        .unwrap();
        fs::write(path.join("ViewController.cs"), "class A {}").await.unwrap();
        fs::write(path.join("Info.plist"), "<plist/>").await.unwrap();
        fs::write(path.join("Other.plist"), "<plist/>").await.unwrap();
        fs::create_dir_all(path.join("Views")).await.unwrap();
        fs::write(path.join("Views/Main.storyboard"), "<doc/>").await.unwrap();
        fs::create_dir_all(path.join("Assets.xcassets/AppIcon.appiconset"))
            .await
            .unwrap();
        fs::write(path.join("Assets.xcassets/AppIcon.appiconset/Contents.json"), "{}")
            .await
            .unwrap();
        fs::create_dir_all(path.join("obj/xcode")).await.unwrap();
        fs::write(path.join("obj/xcode/Generated.cs"), "class B {}").await.unwrap();

        dir
    }

    #[tokio::test]
    async fn test_source_files_skip_build_output() {
        let dir = create_test_project().await;
        let sources = ProjectLoader::source_files(dir.path()).await.unwrap();
        assert_eq!(sources, vec![dir.path().join("ViewController.cs")]);
    }

    #[tokio::test]
    async fn test_resource_files() {
        let dir = create_test_project().await;
        let resources = ProjectLoader::resource_files(dir.path()).await.unwrap();
        let relative: Vec<_> = resources.iter().map(|r| r.relative.clone()).collect();

        assert!(relative.contains(&PathBuf::from("Info.plist")));
        assert!(relative.contains(&PathBuf::from("Views/Main.storyboard")));
        assert!(relative.contains(&PathBuf::from(
            "Assets.xcassets/AppIcon.appiconset/Contents.json"
        )));
        assert!(!relative.contains(&PathBuf::from("Other.plist")));
    }

    #[tokio::test]
    async fn test_project_file_and_os_version() {
        let dir = create_test_project().await;
        let project = ProjectLoader::find_project_file(dir.path()).await.unwrap();
        assert_eq!(project, dir.path().join("App.csproj"));

        let table = PlatformTable::for_platform(TargetPlatform::MacOs);
        assert_eq!(ProjectLoader::supported_os_version(&project, &table).await, "11.0");

        let missing = dir.path().join("Missing.csproj");
        assert_eq!(
            ProjectLoader::supported_os_version(&missing, &table).await,
            table.default_os_version
        );
    }

    #[test]
    fn test_project_root_missing() {
        let result = ProjectLoader::project_root(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(LoadError::PathNotFound(_))));
    }
}
