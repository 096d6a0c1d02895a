//! Ingest orchestration: one entry point that runs a raw MQTT message
//! through match → extract → decode → map → decompose → store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, trace, warn};

use i3x_core::config::CodecOptions;
use i3x_core::relationship_types::HAS_COMPONENT;
use i3x_core::{ObjectInstance, ObjectValue};
use i3x_store::ObjectStore;

use crate::codec::CodecRegistry;
use crate::decompose::decompose;
use crate::engine::MappingEngine;
use crate::extract::extract;
use crate::mapper::map_message;

/// Monotonic pipeline counters.
#[derive(Default)]
struct PipelineStats {
    received: AtomicU64,
    matched: AtomicU64,
    decoded: AtomicU64,
    stored: AtomicU64,
    errors: AtomicU64,
    dropped_no_match: AtomicU64,
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatsSnapshot {
    pub received: u64,
    pub matched: u64,
    pub decoded: u64,
    pub stored: u64,
    pub errors: u64,
    pub dropped_no_match: u64,
}

/// The ingest pipeline: rules, codecs, and the store they feed.
pub struct IngestPipeline {
    engine: RwLock<MappingEngine>,
    codecs: CodecRegistry,
    store: Arc<ObjectStore>,
    stats: PipelineStats,
}

impl IngestPipeline {
    pub fn new(store: Arc<ObjectStore>) -> Self {
        Self {
            engine: RwLock::new(MappingEngine::new()),
            codecs: CodecRegistry::with_builtins(),
            store,
            stats: PipelineStats::default(),
        }
    }

    /// The rule set, for admin add/remove/list.
    pub fn engine(&self) -> &RwLock<MappingEngine> {
        &self.engine
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub fn store(&self) -> &Arc<ObjectStore> {
        &self.store
    }

    pub fn stats(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            received: self.stats.received.load(Ordering::Relaxed),
            matched: self.stats.matched.load(Ordering::Relaxed),
            decoded: self.stats.decoded.load(Ordering::Relaxed),
            stored: self.stats.stored.load(Ordering::Relaxed),
            errors: self.stats.errors.load(Ordering::Relaxed),
            dropped_no_match: self.stats.dropped_no_match.load(Ordering::Relaxed),
        }
    }

    /// Process one raw message. Never fails: unmatched topics and decode
    /// failures are counted and dropped.
    pub fn process(&self, topic: &str, payload: &[u8]) {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let Some((rule, captures)) = self.engine.read().match_first(topic) else {
            self.stats.dropped_no_match.fetch_add(1, Ordering::Relaxed);
            trace!(topic, "no mapping rule matched");
            return;
        };
        self.stats.matched.fetch_add(1, Ordering::Relaxed);

        let config = &rule.config;
        let bytes = extract(payload, config.extract.as_ref());

        // The extraction endian is advisory for the codec; explicit codec
        // options take precedence.
        let options = config
            .codec_options
            .or_else(|| {
                config
                    .extract
                    .and_then(|e| e.endian)
                    .map(|endian| CodecOptions { endian })
            })
            .unwrap_or_default();

        let Some(decoded) = self.codecs.decode(&config.codec, &bytes, &options) else {
            self.stats.errors.fetch_add(1, Ordering::Relaxed);
            warn!(topic, rule = %config.id, codec = %config.codec, "decode failed, message dropped");
            return;
        };
        self.stats.decoded.fetch_add(1, Ordering::Relaxed);

        let mapped = map_message(config, topic, &captures, &decoded, Utc::now());

        let decomposing = config
            .decompose
            .as_ref()
            .map(|d| d.enabled)
            .unwrap_or(false);

        let instance = ObjectInstance {
            element_id: mapped.element_id.clone(),
            display_name: mapped.display_name.clone(),
            type_id: mapped.type_id.clone(),
            namespace_uri: mapped.namespace_uri.clone(),
            is_composition: decomposing,
        };
        let mut value = ObjectValue::new(
            mapped.element_id.clone(),
            mapped.value.clone(),
            mapped.timestamp.clone(),
        );
        if let Some(quality) = &mapped.quality {
            value = value.with_quality(quality.clone());
        }
        self.store.upsert(value, Some(instance));
        self.stats.stored.fetch_add(1, Ordering::Relaxed);

        if let Some(decompose_config) = &config.decompose {
            let children = decompose(
                decompose_config,
                &mapped.element_id,
                &mapped.namespace_uri,
                &mapped.timestamp,
                mapped.quality.as_deref(),
                &decoded,
            );
            debug!(
                topic,
                element_id = %mapped.element_id,
                children = children.len(),
                "decomposed payload"
            );
            for child in children {
                let child_id = child.instance.element_id.clone();
                self.store.upsert(child.value, Some(child.instance));
                self.store
                    .add_relationship(&child.parent_component_id, &child_id, HAS_COMPONENT);
                self.stats.stored.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}
