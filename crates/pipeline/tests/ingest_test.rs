//! End-to-end ingest scenarios: raw message in, graph state out.

use std::sync::Arc;

use i3x_core::config::{DecomposeConfig, DecomposeStrategy, Endian, ExtractConfig, MappingConfig};
use i3x_core::relationship_types::{COMPONENT_OF, HAS_COMPONENT};
use i3x_core::Value;
use i3x_pipeline::IngestPipeline;
use i3x_store::ObjectStore;

fn pipeline_with(rules: Vec<MappingConfig>) -> (Arc<ObjectStore>, IngestPipeline) {
    let store = Arc::new(ObjectStore::new());
    let pipeline = IngestPipeline::new(store.clone());
    {
        let mut engine = pipeline.engine().write();
        for rule in rules {
            engine.add_rule(rule).unwrap();
        }
    }
    (store, pipeline)
}

#[test]
fn float32_single_value() {
    let rule = MappingConfig {
        id: "temp".to_string(),
        topic_pattern: "{site}/sensors/temp/{id}".to_string(),
        codec: "float32".to_string(),
        extract: Some(ExtractConfig {
            byte_offset: Some(0),
            byte_length: Some(4),
            endian: Some(Endian::Big),
            ..Default::default()
        }),
        element_id_template: Some("temp.{site}.{id}".to_string()),
        ..Default::default()
    };
    let (store, pipeline) = pipeline_with(vec![rule]);

    pipeline.process("f1/sensors/temp/s01", &[0x42, 0x1C, 0x00, 0x00]);

    let value = store.get_value("temp.f1.s01").expect("value stored");
    assert_eq!(value.value, Value::Number(39.0));
    assert!(value.quality.is_none());
    // The timestamp is a well-formed RFC 3339 instant.
    assert!(chrono::DateTime::parse_from_rfc3339(&value.timestamp).is_ok());

    // Placeholder ancestors carry the hierarchy.
    assert!(!store.has_children("temp.f1.s01"));
    assert!(store.has_children("temp.f1"));
    assert!(store.has_children("temp"));

    let stats = pipeline.stats();
    assert_eq!(stats.received, 1);
    assert_eq!(stats.stored, 1);
    assert_eq!(stats.errors, 0);
}

#[test]
fn json_with_path_extraction() {
    let rule = MappingConfig {
        id: "env".to_string(),
        topic_pattern: "env/{id}".to_string(),
        codec: "json".to_string(),
        value_expr: Some("$.temperature".to_string()),
        timestamp_expr: Some("$.ts".to_string()),
        element_id_template: Some("env.{id}".to_string()),
        ..Default::default()
    };
    let (store, pipeline) = pipeline_with(vec![rule]);

    pipeline.process(
        "env/e1",
        br#"{"temperature":23.5,"ts":"2026-02-02T10:30:45.123Z","status":"ok"}"#,
    );

    let value = store.get_value("env.e1").unwrap();
    assert_eq!(value.value, Value::Number(23.5));
    assert_eq!(value.timestamp, "2026-02-02T10:30:45.123Z");
    assert!(value.quality.is_none());
}

#[test]
fn decomposition_creates_component_graph() {
    let rule = MappingConfig {
        id: "machine".to_string(),
        topic_pattern: "plant/{machine}".to_string(),
        codec: "json".to_string(),
        element_id_template: Some("plant.{machine}".to_string()),
        decompose: Some(DecomposeConfig {
            enabled: true,
            strategy: DecomposeStrategy::Auto,
            ..Default::default()
        }),
        ..Default::default()
    };
    let (store, pipeline) = pipeline_with(vec![rule]);

    pipeline.process(
        "plant/press1",
        br#"{
            "value": {
                "_name": "OEE",
                "_model": "Models/Component/KPI",
                "Value": 87.7,
                "UnitsOfMeasure": "%"
            }
        }"#,
    );

    let primary = store.get_instance("plant.press1").unwrap();
    assert!(primary.is_composition);

    let child = store.get_instance("plant.press1.value").expect("child");
    assert_eq!(child.type_id, "KPI");
    assert_eq!(child.display_name, "OEE");
    assert!(!child.is_composition);

    let child_value = store.get_value("plant.press1.value").unwrap();
    let map = child_value.value.as_map().unwrap();
    assert_eq!(map.get("Value"), Some(&Value::Number(87.7)));
    assert_eq!(
        map.get("UnitsOfMeasure"),
        Some(&Value::String("%".to_string()))
    );

    // HasComponent down, ComponentOf back up.
    assert_eq!(
        store.get_related_element_ids("plant.press1", Some(HAS_COMPONENT)),
        vec!["plant.press1.value".to_string()]
    );
    assert_eq!(
        store.get_related_element_ids("plant.press1.value", Some(COMPONENT_OF)),
        vec!["plant.press1".to_string()]
    );
}

#[test]
fn unmatched_topic_is_counted_and_dropped() {
    let rule = MappingConfig {
        id: "only".to_string(),
        topic_pattern: "known/{x}".to_string(),
        codec: "utf8".to_string(),
        ..Default::default()
    };
    let (store, pipeline) = pipeline_with(vec![rule]);

    pipeline.process("other/topic/entirely", b"payload");

    assert_eq!(pipeline.stats().received, 1);
    assert_eq!(pipeline.stats().dropped_no_match, 1);
    assert_eq!(pipeline.stats().stored, 0);
    assert!(store.get_all_values().is_empty());
}

#[test]
fn decode_failure_increments_errors() {
    let rule = MappingConfig {
        id: "short".to_string(),
        topic_pattern: "n/{x}".to_string(),
        codec: "uint32".to_string(),
        ..Default::default()
    };
    let (store, pipeline) = pipeline_with(vec![rule]);

    pipeline.process("n/1", &[0x01, 0x02]); // two bytes, four needed

    assert_eq!(pipeline.stats().errors, 1);
    assert_eq!(pipeline.stats().stored, 0);
    assert!(store.get_value("n.1").is_none());
}

#[test]
fn first_matching_rule_wins() {
    let broad = MappingConfig {
        id: "broad".to_string(),
        topic_pattern: "m/{x}".to_string(),
        codec: "utf8".to_string(),
        element_id_template: Some("broad.{x}".to_string()),
        ..Default::default()
    };
    let narrow = MappingConfig {
        id: "narrow".to_string(),
        topic_pattern: "m/one".to_string(),
        codec: "utf8".to_string(),
        element_id_template: Some("narrow.one".to_string()),
        ..Default::default()
    };
    let (store, pipeline) = pipeline_with(vec![broad, narrow]);

    pipeline.process("m/one", b"text");

    assert!(store.get_value("broad.one").is_some());
    assert!(store.get_value("narrow.one").is_none());
}
