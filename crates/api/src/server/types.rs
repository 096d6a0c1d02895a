//! Server state shared across all handlers.

use std::sync::Arc;
use std::time::Instant;

use i3x_mqtt::MqttIngress;
use i3x_pipeline::IngestPipeline;
use i3x_store::ObjectStore;
use i3x_subscription::SubscriptionManager;

use crate::auth::AuthState;

/// Maximum request body size (2 MB).
pub const MAX_REQUEST_BODY_SIZE: usize = 2 * 1024 * 1024;

/// Everything a handler can reach.
#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<ObjectStore>,
    pub pipeline: Arc<IngestPipeline>,
    pub subscriptions: Arc<SubscriptionManager>,
    /// Absent in tests and in offline tooling.
    pub mqtt: Option<Arc<MqttIngress>>,
    pub auth: Arc<AuthState>,
    pub started_at: Instant,
}

impl ServerState {
    pub fn new(
        store: Arc<ObjectStore>,
        pipeline: Arc<IngestPipeline>,
        subscriptions: Arc<SubscriptionManager>,
        auth: AuthState,
    ) -> Self {
        Self {
            store,
            pipeline,
            subscriptions,
            mqtt: None,
            auth: Arc::new(auth),
            started_at: Instant::now(),
        }
    }

    pub fn with_mqtt(mut self, mqtt: Arc<MqttIngress>) -> Self {
        self.mqtt = Some(mqtt);
        self
    }
}
