//! Ingest pipeline for the i3X bridge.
//!
//! Raw MQTT messages flow through topic-pattern matching, bit/byte
//! extraction, codec decoding, template-driven schema mapping, and optional
//! recursive decomposition before landing in the object store.

pub mod codec;
pub mod decompose;
pub mod engine;
pub mod extract;
pub mod ingest;
pub mod mapper;
pub mod path;
pub mod topic;

pub use codec::{Codec, CodecRegistry};
pub use decompose::{decompose, DecomposedChild};
pub use engine::{CompiledRule, MappingEngine};
pub use extract::extract;
pub use ingest::{IngestPipeline, PipelineStatsSnapshot};
pub use mapper::{map_message, render_template, MappedPrimary};
pub use topic::TopicPattern;
