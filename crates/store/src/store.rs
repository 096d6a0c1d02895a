//! The object store: entities, last-known values, typed relationships, and
//! the secondary indices that make lookups cheap.

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, warn};

use i3x_core::model::{last_segment, parent_of};
use i3x_core::relationship_types::{HAS_CHILDREN, HAS_PARENT};
use i3x_core::{
    now_rfc3339, relationship_types, ElementId, Error, Namespace, ObjectInstance, ObjectType,
    ObjectValue, Relationship, RelationshipType, Result, Value, PLACEHOLDER_QUALITY,
    PLACEHOLDER_TYPE_ID,
};

/// Change listener invoked synchronously on every successful upsert.
///
/// Listeners must not perform long work; panics are caught and swallowed so
/// a misbehaving listener cannot corrupt the ingest path.
pub type ChangeListener = Box<dyn Fn(&str, &ObjectValue, Option<&ObjectInstance>) + Send + Sync>;

/// Handle returned by [`ObjectStore::add_change_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// Counts reported by [`ObjectStore::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub values: usize,
    pub instances: usize,
    pub object_types: usize,
    pub namespaces: usize,
    pub relationship_types: usize,
    pub relationships: usize,
}

/// A directed edge stored on its source.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Edge {
    target: ElementId,
    type_id: String,
}

#[derive(Default)]
struct StoreInner {
    values: HashMap<ElementId, ObjectValue>,
    instances: HashMap<ElementId, ObjectInstance>,
    namespaces: HashMap<String, Namespace>,
    object_types: HashMap<String, ObjectType>,
    relationship_types: HashMap<String, RelationshipType>,
    /// Forward edges, insertion-ordered per source.
    relationships: HashMap<ElementId, Vec<Edge>>,
    /// Reverse index: target → set of sources with an edge to it.
    target_index: HashMap<ElementId, HashSet<ElementId>>,
    /// namespace uri → element ids of instances in it.
    namespace_index: HashMap<String, HashSet<ElementId>>,
    /// type id → element ids of instances of it.
    type_index: HashMap<String, HashSet<ElementId>>,
}

/// The canonical entity/value/relationship graph.
///
/// Logically single-writer, many-reader: one coarse lock serializes all
/// mutation, and every getter returns an owned snapshot.
pub struct ObjectStore {
    inner: Mutex<StoreInner>,
    listeners: RwLock<Vec<(u64, ChangeListener)>>,
    next_listener_id: Mutex<u64>,
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore {
    /// Create a store seeded with the built-in relationship types and their
    /// namespace.
    pub fn new() -> Self {
        let mut inner = StoreInner::default();
        inner.namespaces.insert(
            relationship_types::NAMESPACE.to_string(),
            Namespace {
                uri: relationship_types::NAMESPACE.to_string(),
                display_name: "i3X Relationships".to_string(),
            },
        );
        for ty in relationship_types::builtin() {
            inner.relationship_types.insert(ty.element_id.clone(), ty);
        }
        Self {
            inner: Mutex::new(inner),
            listeners: RwLock::new(Vec::new()),
            next_listener_id: Mutex::new(0),
        }
    }

    // ------------------------------------------------------------------
    // Values & instances

    /// Install or replace the value for an element, optionally together with
    /// its instance. Parent links are (re)derived from the element id, with
    /// placeholder ancestors created as needed. Listeners run synchronously
    /// before this returns.
    pub fn upsert(&self, value: ObjectValue, instance: Option<ObjectInstance>) {
        let element_id = value.element_id.clone();
        {
            let mut inner = self.inner.lock();
            inner.values.insert(element_id.clone(), value.clone());

            if let Some(ref inst) = instance {
                Self::remove_from_secondary_indices(&mut inner, &element_id);
                inner
                    .namespace_index
                    .entry(inst.namespace_uri.clone())
                    .or_default()
                    .insert(element_id.clone());
                inner
                    .type_index
                    .entry(inst.type_id.clone())
                    .or_default()
                    .insert(element_id.clone());
                inner.instances.insert(element_id.clone(), inst.clone());

                if let Some(parent_id) = parent_of(&element_id).map(str::to_string) {
                    // Self-parenting would recurse forever.
                    if parent_id != element_id {
                        Self::ensure_parent_exists(&mut inner, &parent_id, &inst.namespace_uri);
                        // A rename-by-upsert may point at a new parent.
                        Self::remove_edges_of_type(&mut inner, &element_id, HAS_PARENT);
                        Self::insert_edge(&mut inner, &element_id, &parent_id, HAS_PARENT);
                        Self::insert_edge(&mut inner, &parent_id, &element_id, HAS_CHILDREN);
                    }
                }
            }
        }
        self.notify(&element_id, &value, instance.as_ref());
    }

    /// Remove an element's value, instance, and every edge touching it.
    /// Returns false when nothing was stored under the id.
    pub fn delete(&self, element_id: &str) -> bool {
        let mut inner = self.inner.lock();
        let had_value = inner.values.remove(element_id).is_some();
        let had_instance = inner.instances.remove(element_id).is_some();
        if had_instance {
            Self::remove_from_secondary_indices_removed(&mut inner, element_id);
        }
        Self::clear_relationships_inner(&mut inner, element_id);
        debug!(element_id, "deleted element");
        had_value || had_instance
    }

    /// Drop all runtime state (values, instances, relationships, indices).
    /// Registered namespaces and type catalogues survive.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.values.clear();
        inner.instances.clear();
        inner.relationships.clear();
        inner.target_index.clear();
        inner.namespace_index.clear();
        inner.type_index.clear();
    }

    pub fn get_value(&self, element_id: &str) -> Option<ObjectValue> {
        self.inner.lock().values.get(element_id).cloned()
    }

    /// Values for the requested ids, `None` for unknown ids (positional).
    pub fn get_values(&self, element_ids: &[String]) -> Vec<Option<ObjectValue>> {
        let inner = self.inner.lock();
        element_ids
            .iter()
            .map(|id| inner.values.get(id).cloned())
            .collect()
    }

    pub fn get_all_values(&self) -> Vec<ObjectValue> {
        self.inner.lock().values.values().cloned().collect()
    }

    pub fn get_instance(&self, element_id: &str) -> Option<ObjectInstance> {
        self.inner.lock().instances.get(element_id).cloned()
    }

    pub fn get_instances(&self, element_ids: &[String]) -> Vec<Option<ObjectInstance>> {
        let inner = self.inner.lock();
        element_ids
            .iter()
            .map(|id| inner.instances.get(id).cloned())
            .collect()
    }

    pub fn get_all_instances(&self) -> Vec<ObjectInstance> {
        self.inner.lock().instances.values().cloned().collect()
    }

    pub fn get_instances_by_namespace(&self, namespace_uri: &str) -> Vec<ObjectInstance> {
        let inner = self.inner.lock();
        inner
            .namespace_index
            .get(namespace_uri)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.instances.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_instances_by_type(&self, type_id: &str) -> Vec<ObjectInstance> {
        let inner = self.inner.lock();
        inner
            .type_index
            .get(type_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.instances.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Registries

    /// Register a namespace. Returns false when the uri was already known
    /// (the existing registration is left untouched).
    pub fn register_namespace(&self, namespace: Namespace) -> bool {
        let mut inner = self.inner.lock();
        if inner.namespaces.contains_key(&namespace.uri) {
            return false;
        }
        inner.namespaces.insert(namespace.uri.clone(), namespace);
        true
    }

    pub fn get_namespace(&self, uri: &str) -> Option<Namespace> {
        self.inner.lock().namespaces.get(uri).cloned()
    }

    pub fn get_namespaces(&self) -> Vec<Namespace> {
        self.inner.lock().namespaces.values().cloned().collect()
    }

    /// Install or replace an object type.
    pub fn register_object_type(&self, object_type: ObjectType) {
        let mut inner = self.inner.lock();
        inner
            .object_types
            .insert(object_type.element_id.clone(), object_type);
    }

    pub fn get_object_type(&self, type_id: &str) -> Option<ObjectType> {
        self.inner.lock().object_types.get(type_id).cloned()
    }

    pub fn get_object_types(&self) -> Vec<ObjectType> {
        self.inner.lock().object_types.values().cloned().collect()
    }

    pub fn get_object_types_by_namespace(&self, namespace_uri: &str) -> Vec<ObjectType> {
        self.inner
            .lock()
            .object_types
            .values()
            .filter(|t| t.namespace_uri == namespace_uri)
            .cloned()
            .collect()
    }

    /// Remove an object type from the catalogue. Refused while any live
    /// instance still references it.
    pub fn delete_object_type(&self, type_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.object_types.contains_key(type_id) {
            return Err(Error::not_found(format!("object type '{}'", type_id)));
        }
        let in_use = inner
            .type_index
            .get(type_id)
            .map(|ids| !ids.is_empty())
            .unwrap_or(false);
        if in_use {
            return Err(Error::conflict(format!(
                "object type '{}' has live instances",
                type_id
            )));
        }
        inner.object_types.remove(type_id);
        Ok(())
    }

    pub fn register_relationship_type(&self, relationship_type: RelationshipType) {
        let mut inner = self.inner.lock();
        inner
            .relationship_types
            .insert(relationship_type.element_id.clone(), relationship_type);
    }

    pub fn get_relationship_type(&self, type_id: &str) -> Option<RelationshipType> {
        self.inner.lock().relationship_types.get(type_id).cloned()
    }

    pub fn get_relationship_types(&self) -> Vec<RelationshipType> {
        self.inner
            .lock()
            .relationship_types
            .values()
            .cloned()
            .collect()
    }

    pub fn get_relationship_types_by_namespace(&self, namespace_uri: &str) -> Vec<RelationshipType> {
        self.inner
            .lock()
            .relationship_types
            .values()
            .filter(|t| t.namespace_uri == namespace_uri)
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Relationships

    /// Add a directed edge and, when the type has a registered inverse, its
    /// paired reverse edge. Idempotent: an identical edge is a no-op.
    pub fn add_relationship(&self, source: &str, target: &str, type_id: &str) {
        let mut inner = self.inner.lock();
        Self::insert_edge(&mut inner, source, target, type_id);
        if let Some(reverse) = Self::reverse_of(&inner, type_id) {
            Self::insert_edge(&mut inner, target, source, &reverse);
        }
    }

    /// Forward edges from an element, insertion-ordered, optionally filtered
    /// by type.
    pub fn get_relationships(&self, element_id: &str, type_id: Option<&str>) -> Vec<Relationship> {
        let inner = self.inner.lock();
        inner
            .relationships
            .get(element_id)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|e| type_id.map_or(true, |t| e.type_id == t))
                    .map(|e| Relationship {
                        source_id: element_id.to_string(),
                        target_id: e.target.clone(),
                        type_id: e.type_id.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Targets of an element's forward edges, optionally filtered by type.
    pub fn get_related_element_ids(&self, element_id: &str, type_id: Option<&str>) -> Vec<ElementId> {
        self.get_relationships(element_id, type_id)
            .into_iter()
            .map(|r| r.target_id)
            .collect()
    }

    /// Sources with any edge pointing at the target. O(1) reverse lookup.
    pub fn get_sources_for_target(&self, target_id: &str) -> Vec<ElementId> {
        self.inner
            .lock()
            .target_index
            .get(target_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Remove edges from source to target (all types, or one), together with
    /// their paired inverse edges.
    pub fn remove_relationship(&self, source: &str, target: &str, type_id: Option<&str>) {
        let mut inner = self.inner.lock();
        let removed = Self::remove_edges_matching(&mut inner, source, |e| {
            e.target == target && type_id.map_or(true, |t| e.type_id == t)
        });
        for edge in removed {
            if let Some(reverse) = Self::reverse_of(&inner, &edge.type_id) {
                Self::remove_edges_matching(&mut inner, target, |e| {
                    e.target == source && e.type_id == reverse
                });
            }
        }
    }

    /// Remove every edge of one type from an element (and the inverses).
    pub fn remove_relationships_by_type(&self, element_id: &str, type_id: &str) {
        let mut inner = self.inner.lock();
        Self::remove_edges_of_type(&mut inner, element_id, type_id);
    }

    /// Remove every edge touching an element, in both directions.
    pub fn clear_relationships(&self, element_id: &str) {
        let mut inner = self.inner.lock();
        Self::clear_relationships_inner(&mut inner, element_id);
    }

    /// Parent of an element, derived from its first `HasParent` edge.
    pub fn get_parent_id(&self, element_id: &str) -> Option<ElementId> {
        let inner = self.inner.lock();
        inner.relationships.get(element_id).and_then(|edges| {
            edges
                .iter()
                .find(|e| e.type_id == HAS_PARENT)
                .map(|e| e.target.clone())
        })
    }

    /// Whether any element claims this one as parent, derived from the
    /// stored `HasChildren` edges.
    pub fn has_children(&self, element_id: &str) -> bool {
        let inner = self.inner.lock();
        inner
            .relationships
            .get(element_id)
            .map(|edges| edges.iter().any(|e| e.type_id == HAS_CHILDREN))
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Listeners & stats

    /// Register a change listener. Listeners run synchronously inside
    /// `upsert`, in registration order.
    pub fn add_change_listener(&self, listener: ChangeListener) -> ListenerId {
        let mut next = self.next_listener_id.lock();
        let id = *next;
        *next += 1;
        self.listeners.write().push((id, listener));
        ListenerId(id)
    }

    pub fn remove_change_listener(&self, id: ListenerId) {
        self.listeners.write().retain(|(lid, _)| *lid != id.0);
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.lock();
        StoreStats {
            values: inner.values.len(),
            instances: inner.instances.len(),
            object_types: inner.object_types.len(),
            namespaces: inner.namespaces.len(),
            relationship_types: inner.relationship_types.len(),
            relationships: inner.relationships.values().map(Vec::len).sum(),
        }
    }

    // ------------------------------------------------------------------
    // Internals

    fn notify(&self, element_id: &str, value: &ObjectValue, instance: Option<&ObjectInstance>) {
        let listeners = self.listeners.read();
        for (id, listener) in listeners.iter() {
            let result = catch_unwind(AssertUnwindSafe(|| listener(element_id, value, instance)));
            if result.is_err() {
                warn!(listener = id, element_id, "change listener panicked");
            }
        }
    }

    fn reverse_of(inner: &StoreInner, type_id: &str) -> Option<String> {
        inner
            .relationship_types
            .get(type_id)
            .map(|t| t.reverse_of.clone())
            .filter(|r| !r.is_empty())
    }

    /// Create missing ancestors for `parent_id` and wire each new placeholder
    /// to its own parent. Terminates when the prefix is empty or an existing
    /// instance is reached.
    fn ensure_parent_exists(inner: &mut StoreInner, parent_id: &str, namespace_uri: &str) {
        if inner.instances.contains_key(parent_id) {
            return;
        }
        let placeholder = ObjectInstance {
            element_id: parent_id.to_string(),
            display_name: last_segment(parent_id).to_string(),
            type_id: PLACEHOLDER_TYPE_ID.to_string(),
            namespace_uri: namespace_uri.to_string(),
            is_composition: false,
        };
        inner
            .namespace_index
            .entry(namespace_uri.to_string())
            .or_default()
            .insert(parent_id.to_string());
        inner
            .type_index
            .entry(PLACEHOLDER_TYPE_ID.to_string())
            .or_default()
            .insert(parent_id.to_string());
        inner
            .instances
            .insert(parent_id.to_string(), placeholder);
        inner.values.insert(
            parent_id.to_string(),
            ObjectValue {
                element_id: parent_id.to_string(),
                value: Value::Null,
                timestamp: now_rfc3339(),
                quality: Some(PLACEHOLDER_QUALITY.to_string()),
            },
        );
        debug!(element_id = parent_id, "created placeholder ancestor");

        if let Some(grandparent) = parent_of(parent_id).map(str::to_string) {
            if grandparent != parent_id {
                Self::ensure_parent_exists(inner, &grandparent, namespace_uri);
                Self::insert_edge(inner, parent_id, &grandparent, HAS_PARENT);
                Self::insert_edge(inner, &grandparent, parent_id, HAS_CHILDREN);
            }
        }
    }

    /// Append an edge unless the identical one is already present.
    fn insert_edge(inner: &mut StoreInner, source: &str, target: &str, type_id: &str) {
        let edges = inner.relationships.entry(source.to_string()).or_default();
        let duplicate = edges
            .iter()
            .any(|e| e.target == target && e.type_id == type_id);
        if duplicate {
            return;
        }
        edges.push(Edge {
            target: target.to_string(),
            type_id: type_id.to_string(),
        });
        inner
            .target_index
            .entry(target.to_string())
            .or_default()
            .insert(source.to_string());
    }

    /// Remove every edge from `source` matching the predicate, maintaining
    /// the reverse index. Returns the removed edges.
    fn remove_edges_matching<F>(inner: &mut StoreInner, source: &str, predicate: F) -> Vec<Edge>
    where
        F: Fn(&Edge) -> bool,
    {
        let Some(edges) = inner.relationships.get_mut(source) else {
            return Vec::new();
        };
        let mut removed = Vec::new();
        edges.retain(|e| {
            if predicate(e) {
                removed.push(e.clone());
                false
            } else {
                true
            }
        });
        let now_empty = edges.is_empty();
        if now_empty {
            inner.relationships.remove(source);
        }
        for edge in &removed {
            let still_points = inner
                .relationships
                .get(source)
                .map(|es| es.iter().any(|e| e.target == edge.target))
                .unwrap_or(false);
            if !still_points {
                if let Some(sources) = inner.target_index.get_mut(&edge.target) {
                    sources.remove(source);
                    if sources.is_empty() {
                        inner.target_index.remove(&edge.target);
                    }
                }
            }
        }
        removed
    }

    /// Remove all edges of `type_id` from an element plus their inverses.
    fn remove_edges_of_type(inner: &mut StoreInner, element_id: &str, type_id: &str) {
        let removed = Self::remove_edges_matching(inner, element_id, |e| e.type_id == type_id);
        for edge in removed {
            if let Some(reverse) = Self::reverse_of(inner, &edge.type_id) {
                Self::remove_edges_matching(inner, &edge.target, |e| {
                    e.target == element_id && e.type_id == reverse
                });
            }
        }
    }

    fn clear_relationships_inner(inner: &mut StoreInner, element_id: &str) {
        // Forward edges: drop them and fix the reverse index.
        Self::remove_edges_matching(inner, element_id, |_| true);
        // Inbound edges: every source the reverse index knows about.
        let sources: Vec<ElementId> = inner
            .target_index
            .get(element_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        for source in sources {
            Self::remove_edges_matching(inner, &source, |e| e.target == element_id);
        }
        inner.target_index.remove(element_id);
    }

    fn remove_from_secondary_indices(inner: &mut StoreInner, element_id: &str) {
        if let Some(prev) = inner.instances.get(element_id) {
            let ns = prev.namespace_uri.clone();
            let ty = prev.type_id.clone();
            if let Some(set) = inner.namespace_index.get_mut(&ns) {
                set.remove(element_id);
                if set.is_empty() {
                    inner.namespace_index.remove(&ns);
                }
            }
            if let Some(set) = inner.type_index.get_mut(&ty) {
                set.remove(element_id);
                if set.is_empty() {
                    inner.type_index.remove(&ty);
                }
            }
        }
    }

    /// Index cleanup after the instance has already been removed: sweep both
    /// indices for the id.
    fn remove_from_secondary_indices_removed(inner: &mut StoreInner, element_id: &str) {
        inner.namespace_index.retain(|_, set| {
            set.remove(element_id);
            !set.is_empty()
        });
        inner.type_index.retain(|_, set| {
            set.remove(element_id);
            !set.is_empty()
        });
    }
}
