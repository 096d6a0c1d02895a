//! Graph-level store scenarios: placeholder lifecycle and cascade delete.

use i3x_core::relationship_types::{HAS_CHILDREN, HAS_COMPONENT, HAS_PARENT};
use i3x_core::{
    now_rfc3339, ObjectInstance, ObjectValue, Value, PLACEHOLDER_QUALITY, PLACEHOLDER_TYPE_ID,
};
use i3x_store::ObjectStore;

fn upsert_real(store: &ObjectStore, id: &str, type_id: &str) {
    let instance = ObjectInstance::new(id, id.rsplit('.').next().unwrap(), type_id, "urn:plant");
    let value = ObjectValue::new(id, Value::Number(1.0), now_rfc3339());
    store.upsert(value, Some(instance));
}

#[test]
fn placeholder_lifecycle() {
    let store = ObjectStore::new();

    // A deep instance arrives with no prior entries.
    upsert_real(&store, "a.b.c.d", "Sensor");

    // Every ancestor exists as a placeholder with a null, uncertain value.
    for id in ["a", "a.b", "a.b.c"] {
        let inst = store.get_instance(id).expect(id);
        assert_eq!(inst.type_id, PLACEHOLDER_TYPE_ID);
        let value = store.get_value(id).expect(id);
        assert!(value.value.is_null());
        assert_eq!(value.quality.as_deref(), Some(PLACEHOLDER_QUALITY));
    }

    // The HasParent/HasChildren chain is intact end to end.
    assert_eq!(store.get_parent_id("a.b.c.d").as_deref(), Some("a.b.c"));
    assert_eq!(store.get_parent_id("a.b.c").as_deref(), Some("a.b"));
    assert_eq!(store.get_parent_id("a.b").as_deref(), Some("a"));
    assert_eq!(store.get_parent_id("a"), None);
    for id in ["a", "a.b", "a.b.c"] {
        assert!(store.has_children(id), "{id} should have children");
    }

    // The real instance replaces the placeholder without touching edges.
    let edges_before = store.get_relationships("a.b", None);
    upsert_real(&store, "a.b", "Area");
    let replaced = store.get_instance("a.b").unwrap();
    assert_eq!(replaced.type_id, "Area");
    assert_eq!(store.get_relationships("a.b", None), edges_before);
    assert!(!store.get_value("a.b").unwrap().value.is_null());
}

#[test]
fn cascade_delete_removes_all_edges_of_the_node() {
    let store = ObjectStore::new();
    upsert_real(&store, "line.mid", "Machine");
    upsert_real(&store, "line.mid.axis", "Sensor");
    upsert_real(&store, "line.other", "Machine");
    store.add_relationship("line.mid", "line.other", HAS_COMPONENT);

    assert!(store.delete("line.mid"));

    // The node is gone and nothing references it any more.
    assert!(store.get_instance("line.mid").is_none());
    assert!(store.get_value("line.mid").is_none());
    assert!(store.get_sources_for_target("line.mid").is_empty());
    assert!(store.get_relationships("line.mid", None).is_empty());

    // Neighbours lose only the edges that touched the deleted node.
    assert!(store
        .get_related_element_ids("line.other", None)
        .iter()
        .all(|id| id != "line.mid"));
    assert_eq!(store.get_parent_id("line.mid.axis"), None);
    assert!(store
        .get_relationships("line", Some(HAS_CHILDREN))
        .iter()
        .all(|r| r.target_id != "line.mid"));

    // Other nodes are intact.
    assert!(store.get_instance("line.other").is_some());
    assert!(store.get_instance("line.mid.axis").is_some());
    assert_eq!(store.get_parent_id("line.other").as_deref(), Some("line"));
}

#[test]
fn dot_hierarchy_delete_is_not_recursive() {
    let store = ObjectStore::new();
    upsert_real(&store, "root.child.grandchild", "Sensor");

    assert!(store.delete("root"));

    // Grandchildren remain: the dot hierarchy is not value-composition.
    assert!(store.get_instance("root.child").is_some());
    assert!(store.get_instance("root.child.grandchild").is_some());
    assert!(store
        .get_relationships("root.child", Some(HAS_PARENT))
        .is_empty());
}
