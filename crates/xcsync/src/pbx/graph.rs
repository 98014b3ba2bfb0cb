//! Object Graph
//!
//! The token → object index of a native project, kept alongside the ordered
//! token list that fixes serialization order. Both live behind one lock so
//! they can never be observed out of step.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::objects::PbxObject;
use super::token::{derived_token, random_token};

/// Error type for native project operations
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Unknown object kind '{isa}' for object {token}")]
    UnknownObjectKind { token: String, isa: String },

    #[error("Malformed project document: {0}")]
    MalformedDocument(String),

    #[error("Object {token} has no 'isa' key")]
    MissingKind { token: String },

    #[error("Duplicate object token: {0}")]
    DuplicateToken(String),

    #[error("Unknown object token: {0}")]
    UnknownToken(String),

    #[error("Object {from} references missing object {to}")]
    DanglingReference { from: String, to: String },

    #[error("Object graph is inconsistent: {0}")]
    InternalConsistency(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An object and, for objects read from disk, the form it was read in
#[derive(Debug)]
struct Entry {
    object: PbxObject,
    source: Option<serde_json::Value>,
}

#[derive(Debug, Default)]
struct GraphInner {
    order: Vec<String>,
    objects: HashMap<String, Entry>,
}

impl GraphInner {
    fn check(&self) -> Result<(), ProjectError> {
        if self.order.len() != self.objects.len() {
            return Err(ProjectError::InternalConsistency(format!(
                "{} ordered tokens but {} indexed objects",
                self.order.len(),
                self.objects.len()
            )));
        }
        if let Some(token) = self.order.iter().find(|t| !self.objects.contains_key(*t)) {
            return Err(ProjectError::InternalConsistency(format!(
                "token {token} is ordered but not indexed"
            )));
        }
        Ok(())
    }

    fn insert(&mut self, token: String, entry: Entry) -> Result<(), ProjectError> {
        if self.objects.contains_key(&token) {
            return Err(ProjectError::DuplicateToken(token));
        }
        self.order.push(token.clone());
        self.objects.insert(token, entry);
        self.check()
    }
}

/// Token-keyed objects of a native project
#[derive(Debug, Default)]
pub struct ObjectGraph {
    inner: Mutex<GraphInner>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object under `token`
    pub fn add_object(&self, token: impl Into<String>, object: PbxObject) -> Result<(), ProjectError> {
        self.inner.lock().insert(
            token.into(),
            Entry {
                object,
                source: None,
            },
        )
    }

    /// Add an object decoded from `source`, which is written back verbatim
    pub(crate) fn add_loaded(
        &self,
        token: impl Into<String>,
        object: PbxObject,
        source: serde_json::Value,
    ) -> Result<(), ProjectError> {
        self.inner.lock().insert(
            token.into(),
            Entry {
                object,
                source: Some(source),
            },
        )
    }

    /// Remove and return the object under `token`
    ///
    /// The graph is left untouched when the token is unknown or the index
    /// and order disagree about it.
    pub fn remove_object(&self, token: &str) -> Result<PbxObject, ProjectError> {
        let mut inner = self.inner.lock();
        let indexed = inner.objects.contains_key(token);
        let position = inner.order.iter().position(|t| t == token);
        let position = match (indexed, position) {
            (true, Some(position)) => position,
            (false, None) => return Err(ProjectError::UnknownToken(token.to_string())),
            (true, None) => {
                return Err(ProjectError::InternalConsistency(format!(
                    "token {token} is indexed but not ordered"
                )));
            }
            (false, Some(_)) => {
                return Err(ProjectError::InternalConsistency(format!(
                    "token {token} is ordered but not indexed"
                )));
            }
        };
        inner.order.remove(position);
        let entry = inner
            .objects
            .remove(token)
            .ok_or_else(|| ProjectError::UnknownToken(token.to_string()))?;
        inner.check()?;
        Ok(entry.object)
    }

    pub fn get(&self, token: &str) -> Option<PbxObject> {
        self.inner.lock().objects.get(token).map(|e| e.object.clone())
    }

    pub fn contains(&self, token: &str) -> bool {
        self.inner.lock().objects.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All objects in insertion order
    pub fn entries(&self) -> Result<Vec<(String, PbxObject)>, ProjectError> {
        let inner = self.inner.lock();
        inner.check()?;
        Ok(inner
            .order
            .iter()
            .filter_map(|token| {
                inner
                    .objects
                    .get(token)
                    .map(|entry| (token.clone(), entry.object.clone()))
            })
            .collect())
    }

    /// All objects in insertion order as JSON, loaded ones in their on-disk form
    pub(crate) fn documents(&self) -> Result<Vec<(String, serde_json::Value)>, ProjectError> {
        let inner = self.inner.lock();
        inner.check()?;
        let mut documents = Vec::with_capacity(inner.order.len());
        for token in &inner.order {
            let Some(entry) = inner.objects.get(token) else {
                continue;
            };
            let value = match &entry.source {
                Some(source) => source.clone(),
                None => serde_json::to_value(&entry.object)?,
            };
            documents.push((token.clone(), value));
        }
        Ok(documents)
    }

    /// A fresh random token not used in this graph
    pub fn generate_token(&self) -> String {
        let inner = self.inner.lock();
        loop {
            let token = random_token();
            if !inner.objects.contains_key(&token) {
                return token;
            }
        }
    }

    /// A token derived from `seed`, disambiguated if already taken
    pub fn derive_token(&self, seed: &str) -> String {
        let inner = self.inner.lock();
        let mut token = derived_token(seed);
        let mut attempt = 1;
        while inner.objects.contains_key(&token) {
            token = derived_token(&format!("{seed}#{attempt}"));
            attempt += 1;
        }
        token
    }

    /// Check that `root` and every referenced token resolve
    pub fn validate_references(&self, root: &str) -> Result<(), ProjectError> {
        let inner = self.inner.lock();
        if !inner.objects.contains_key(root) {
            return Err(ProjectError::DanglingReference {
                from: "rootObject".to_string(),
                to: root.to_string(),
            });
        }
        for token in &inner.order {
            let Some(entry) = inner.objects.get(token) else {
                continue;
            };
            if let Some(missing) = entry
                .object
                .references()
                .into_iter()
                .find(|r| !inner.objects.contains_key(*r))
            {
                return Err(ProjectError::DanglingReference {
                    from: token.clone(),
                    to: missing.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pbx::{PbxBuildFile, PbxGroup};
    use indexmap::IndexMap;
    use std::sync::Arc;

    fn group(children: &[&str]) -> PbxObject {
        PbxObject::Group(PbxGroup {
            children: children.iter().map(|c| c.to_string()).collect(),
            name: None,
            path: None,
            source_tree: "<group>".into(),
            extra: IndexMap::new(),
        })
    }

    #[test]
    fn test_add_and_remove_keep_order() {
        let graph = ObjectGraph::new();
        graph.add_object("A", group(&[])).unwrap();
        graph.add_object("B", group(&[])).unwrap();
        graph.add_object("C", group(&[])).unwrap();

        graph.remove_object("B").unwrap();
        let tokens: Vec<_> = graph.entries().unwrap().into_iter().map(|(t, _)| t).collect();
        assert_eq!(tokens, vec!["A", "C"]);
    }

    #[test]
    fn test_duplicate_token() {
        let graph = ObjectGraph::new();
        graph.add_object("A", group(&[])).unwrap();
        assert!(matches!(
            graph.add_object("A", group(&["X"])),
            Err(ProjectError::DuplicateToken(t)) if t == "A"
        ));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get("A"), Some(group(&[])));
    }

    #[test]
    fn test_remove_unknown_token() {
        let graph = ObjectGraph::new();
        assert!(matches!(
            graph.remove_object("missing"),
            Err(ProjectError::UnknownToken(_))
        ));
    }

    #[test]
    fn test_inconsistent_remove_leaves_graph_unchanged() {
        let graph = ObjectGraph::new();
        graph.add_object("A", group(&[])).unwrap();
        graph.add_object("B", group(&[])).unwrap();
        graph.inner.lock().order.retain(|t| t != "B");

        assert!(matches!(
            graph.remove_object("B"),
            Err(ProjectError::InternalConsistency(_))
        ));
        assert!(graph.contains("B"));
        assert_eq!(graph.inner.lock().order, vec!["A"]);
        assert!(matches!(
            graph.entries(),
            Err(ProjectError::InternalConsistency(_))
        ));
    }

    #[test]
    fn test_dangling_reference() {
        let graph = ObjectGraph::new();
        graph.add_object("ROOT", group(&["FILE"])).unwrap();
        graph
            .add_object(
                "BUILD",
                PbxObject::BuildFile(PbxBuildFile {
                    file_ref: "FILE".into(),
                    settings: None,
                    extra: IndexMap::new(),
                }),
            )
            .unwrap();

        match graph.validate_references("ROOT") {
            Err(ProjectError::DanglingReference { from, to }) => {
                assert_eq!(from, "ROOT");
                assert_eq!(to, "FILE");
            }
            other => panic!("expected dangling reference, got {other:?}"),
        }
        assert!(matches!(
            graph.validate_references("NOPE"),
            Err(ProjectError::DanglingReference { .. })
        ));

        graph.add_object("FILE", group(&[])).unwrap();
        graph.validate_references("ROOT").unwrap();
    }

    #[test]
    fn test_token_generation_avoids_collisions() {
        let graph = ObjectGraph::new();
        let first = graph.derive_token("seed");
        graph.add_object(first.clone(), group(&[])).unwrap();
        let second = graph.derive_token("seed");
        assert_ne!(first, second);

        let random = graph.generate_token();
        assert!(!graph.contains(&random));
    }

    #[test]
    fn test_concurrent_adds() {
        let graph = Arc::new(ObjectGraph::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let graph = Arc::clone(&graph);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        graph.add_object(format!("T{i}-{j}"), group(&[])).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(graph.len(), 400);
        assert_eq!(graph.entries().unwrap().len(), 400);
    }
}
