//! Type Registry
//!
//! A concurrent bidirectional index of [`TypeMapping`] keyed by managed name and
//! native name. Inserts are all-or-nothing and changes are broadcast to
//! subscribers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::TypeMapping;

// ─────────────────────────────────────────────────────────────────────────────
// Type Registry Events
// ─────────────────────────────────────────────────────────────────────────────

/// Events broadcast when the type registry changes
#[derive(Debug, Clone)]
pub enum TypeChange {
    /// A new mapping was registered
    Added(Arc<TypeMapping>),
    /// A mapping was replaced
    Updated(Arc<TypeMapping>),
    /// The registry was emptied at the start of a pass
    Cleared,
}

impl TypeChange {
    /// Get the managed id affected by this change
    pub fn managed_id(&self) -> Option<&str> {
        match self {
            TypeChange::Added(mapping) | TypeChange::Updated(mapping) => {
                Some(&mapping.managed_id)
            }
            TypeChange::Cleared => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Type Registry Error
// ─────────────────────────────────────────────────────────────────────────────

/// Which identity key collided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKey {
    Managed,
    Native,
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityKey::Managed => write!(f, "managed"),
            IdentityKey::Native => write!(f, "native"),
        }
    }
}

/// Errors that can occur when working with the type registry
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeRegistryError {
    #[error("Duplicate {key} type identity: {id}")]
    DuplicateIdentity { key: IdentityKey, id: String },
    #[error("Invalid type mapping {0}: only the root type may lack a base type")]
    InvalidMapping(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Type Registry
// ─────────────────────────────────────────────────────────────────────────────

struct RegistryEntry {
    seq: u64,
    mapping: Arc<TypeMapping>,
}

/// The central registry of type mappings
///
/// Reads are lock-free through the underlying `DashMap`s. Writers are serialized
/// by a gate so that the check-then-insert across both indexes is atomic with
/// respect to other writers. A mapping becomes visible through the managed
/// index only after its native key is claimed, so readers never observe a
/// half-inserted entry.
pub struct TypeRegistry {
    /// Mappings by managed id
    by_managed: DashMap<String, RegistryEntry>,
    /// Managed id by native id
    by_native: DashMap<String, String>,
    /// Root managed type allowed to have no base (no check when `None`)
    root_type: Option<String>,
    /// Insertion sequence for ordered enumeration
    next_seq: AtomicU64,
    /// Serializes writers
    write_gate: Mutex<()>,
    /// Change notification channel
    change_tx: broadcast::Sender<TypeChange>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create a new empty registry without base-type validation
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(256);
        Self {
            by_managed: DashMap::new(),
            by_native: DashMap::new(),
            root_type: None,
            next_seq: AtomicU64::new(0),
            write_gate: Mutex::new(()),
            change_tx,
        }
    }

    /// Create a registry that rejects base-less mappings other than `root_type`
    pub fn with_root(root_type: impl Into<String>) -> Self {
        Self {
            root_type: Some(root_type.into()),
            ..Self::new()
        }
    }

    /// Create a new registry wrapped in an Arc
    pub fn new_shared(root_type: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::with_root(root_type))
    }

    /// Subscribe to registry changes
    pub fn subscribe(&self) -> broadcast::Receiver<TypeChange> {
        self.change_tx.subscribe()
    }

    /// Add a mapping
    ///
    /// Fails with `DuplicateIdentity` when either key already exists; in that
    /// case the registry is left exactly as it was.
    pub fn add_type(&self, mapping: TypeMapping) -> Result<Arc<TypeMapping>, TypeRegistryError> {
        if let Some(root) = &self.root_type {
            if !mapping.has_valid_base(root) {
                return Err(TypeRegistryError::InvalidMapping(mapping.managed_id));
            }
        }

        let mapping = Arc::new(mapping);
        let managed_id = mapping.managed_id.clone();
        let native_id = mapping.native_id.clone();

        let _gate = self.write_gate.lock();

        if self.by_managed.contains_key(&managed_id) {
            return Err(TypeRegistryError::DuplicateIdentity {
                key: IdentityKey::Managed,
                id: managed_id,
            });
        }

        match self.by_native.entry(native_id.clone()) {
            Entry::Occupied(_) => {
                return Err(TypeRegistryError::DuplicateIdentity {
                    key: IdentityKey::Native,
                    id: native_id,
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(managed_id.clone());
            }
        }

        match self.by_managed.entry(managed_id.clone()) {
            Entry::Occupied(_) => {
                // Roll back the native claim
                self.by_native.remove(&native_id);
                return Err(TypeRegistryError::DuplicateIdentity {
                    key: IdentityKey::Managed,
                    id: managed_id,
                });
            }
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                slot.insert(RegistryEntry {
                    seq,
                    mapping: Arc::clone(&mapping),
                });
            }
        }

        // Notify subscribers (ignore send errors - means no subscribers)
        let _ = self.change_tx.send(TypeChange::Added(Arc::clone(&mapping)));

        Ok(mapping)
    }

    /// Query mappings by managed id, native id, both, or neither
    ///
    /// With both keys the result is the intersection. Unfiltered results come
    /// back in insertion order.
    pub fn query_types(
        &self,
        managed_id: Option<&str>,
        native_id: Option<&str>,
    ) -> Vec<Arc<TypeMapping>> {
        match (managed_id, native_id) {
            (Some(managed), native) => self
                .by_managed
                .get(managed)
                .map(|entry| Arc::clone(&entry.mapping))
                .filter(|m| native.is_none_or(|n| m.native_id == n))
                .into_iter()
                .collect(),
            (None, Some(native)) => self
                .by_native
                .get(native)
                .map(|managed| managed.value().clone())
                .and_then(|managed| self.by_managed.get(&managed).map(|e| Arc::clone(&e.mapping)))
                .filter(|m| m.native_id == native)
                .into_iter()
                .collect(),
            (None, None) => self.all(),
        }
    }

    /// Get a mapping by managed id
    pub fn get_managed(&self, managed_id: &str) -> Option<Arc<TypeMapping>> {
        self.query_types(Some(managed_id), None).pop()
    }

    /// Get a mapping by native id
    pub fn get_native(&self, native_id: &str) -> Option<Arc<TypeMapping>> {
        self.query_types(None, Some(native_id)).pop()
    }

    /// Replace `old` with `new` if both carry the registered identity keys
    ///
    /// Returns `false` without modifying anything on mismatch.
    pub fn try_update_mapping(&self, old: &TypeMapping, new: TypeMapping) -> bool {
        if !old.same_identity(&new) {
            return false;
        }

        let _gate = self.write_gate.lock();

        let Some(mut entry) = self.by_managed.get_mut(&old.managed_id) else {
            return false;
        };
        if entry.mapping.native_id != old.native_id {
            return false;
        }

        let mapping = Arc::new(new);
        entry.mapping = Arc::clone(&mapping);
        drop(entry);

        let _ = self.change_tx.send(TypeChange::Updated(mapping));
        true
    }

    /// Get all mappings in insertion order
    pub fn all(&self) -> Vec<Arc<TypeMapping>> {
        let mut entries: Vec<_> = self
            .by_managed
            .iter()
            .map(|r| (r.value().seq, Arc::clone(&r.value().mapping)))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, mapping)| mapping).collect()
    }

    /// Remove every mapping (start of a sync pass)
    pub fn clear(&self) {
        let _gate = self.write_gate.lock();
        self.by_managed.clear();
        self.by_native.clear();
        let _ = self.change_tx.send(TypeChange::Cleared);
    }

    /// Get the number of registered mappings
    pub fn len(&self) -> usize {
        self.by_managed.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.by_managed.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Arc<TypeMapping> {
        Arc::new(TypeMapping::new("Foundation.NSObject", "NSObject"))
    }

    fn mapping(managed: &str, native: &str) -> TypeMapping {
        TypeMapping::new(managed, native).with_base(root())
    }

    #[test]
    fn test_query_by_either_key() {
        let registry = TypeRegistry::with_root("Foundation.NSObject");
        let pairs = [
            ("Sample.ViewController", "ViewController"),
            ("Sample.MainWindow", "MainWindow"),
            ("Sample.Other.ViewController", "OtherViewController"),
        ];
        for (managed, native) in pairs {
            registry.add_type(mapping(managed, native)).unwrap();
        }

        for (managed, native) in pairs {
            let by_managed = registry.query_types(Some(managed), None);
            assert_eq!(by_managed.len(), 1);
            assert_eq!(by_managed[0].native_id, native);

            let by_native = registry.query_types(None, Some(native));
            assert_eq!(by_native.len(), 1);
            assert_eq!(by_native[0].managed_id, managed);

            assert_eq!(registry.query_types(Some(managed), Some(native)).len(), 1);
        }

        assert!(
            registry
                .query_types(Some("Sample.ViewController"), Some("MainWindow"))
                .is_empty()
        );
    }

    #[test]
    fn test_unfiltered_query_is_insertion_ordered() {
        let registry = TypeRegistry::new();
        for name in ["C", "A", "B"] {
            registry.add_type(mapping(&format!("N.{name}"), name)).unwrap();
        }
        let order: Vec<_> = registry
            .query_types(None, None)
            .iter()
            .map(|m| m.native_id.clone())
            .collect();
        assert_eq!(order, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_duplicate_managed_id_leaves_registry_unchanged() {
        let registry = TypeRegistry::new();
        registry.add_type(mapping("Sample.A", "A")).unwrap();

        let result = registry.add_type(mapping("Sample.A", "OtherA"));
        assert!(matches!(
            result,
            Err(TypeRegistryError::DuplicateIdentity {
                key: IdentityKey::Managed,
                ..
            })
        ));
        assert_eq!(registry.len(), 1);
        assert!(registry.get_native("OtherA").is_none());
    }

    #[test]
    fn test_duplicate_native_id_rolls_back() {
        let registry = TypeRegistry::new();
        registry.add_type(mapping("Sample.A", "A")).unwrap();

        let result = registry.add_type(mapping("Sample.B", "A"));
        assert!(matches!(
            result,
            Err(TypeRegistryError::DuplicateIdentity {
                key: IdentityKey::Native,
                ..
            })
        ));
        assert_eq!(registry.len(), 1);
        assert!(registry.get_managed("Sample.B").is_none());
        assert_eq!(registry.get_native("A").unwrap().managed_id, "Sample.A");
    }

    #[test]
    fn test_rejects_baseless_non_root() {
        let registry = TypeRegistry::with_root("Foundation.NSObject");
        assert!(registry.add_type(TypeMapping::new("Foundation.NSObject", "NSObject")).is_ok());
        assert!(matches!(
            registry.add_type(TypeMapping::new("AppKit.NSView", "NSView")),
            Err(TypeRegistryError::InvalidMapping(_))
        ));
    }

    #[test]
    fn test_try_update_mapping() {
        let registry = TypeRegistry::new();
        let old = registry.add_type(mapping("Sample.A", "A")).unwrap();

        let renamed = mapping("Sample.A", "Renamed");
        assert!(!registry.try_update_mapping(&old, renamed));

        let updated = mapping("Sample.A", "A").model();
        assert!(registry.try_update_mapping(&old, updated));
        assert!(registry.get_managed("Sample.A").unwrap().is_model);

        let missing = mapping("Sample.Missing", "Missing");
        assert!(!registry.try_update_mapping(&missing, missing.clone()));
    }

    #[test]
    fn test_concurrent_adds_keep_indexes_consistent() {
        let registry = Arc::new(TypeRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        // Every worker races for the same identities
                        let _ = registry.add_type(mapping(&format!("N.T{i}"), &format!("T{i}")));
                        let _ = registry.add_type(mapping(
                            &format!("N.W{worker}_{i}"),
                            &format!("T{i}"),
                        ));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 50);
        for i in 0..50 {
            let native = registry.get_native(&format!("T{i}")).unwrap();
            assert_eq!(
                registry.get_managed(&native.managed_id).unwrap().native_id,
                format!("T{i}")
            );
        }
    }

    #[tokio::test]
    async fn test_subscribe_to_changes() {
        let registry = TypeRegistry::new();
        let mut rx = registry.subscribe();

        let added = registry.add_type(mapping("Sample.A", "A")).unwrap();
        let change = rx.recv().await.unwrap();
        assert!(matches!(change, TypeChange::Added(_)));
        assert_eq!(change.managed_id(), Some("Sample.A"));

        assert!(registry.try_update_mapping(&added, mapping("Sample.A", "A")));
        assert!(matches!(rx.recv().await.unwrap(), TypeChange::Updated(_)));

        registry.clear();
        assert!(matches!(rx.recv().await.unwrap(), TypeChange::Cleared));
        assert!(registry.is_empty());
    }
}
