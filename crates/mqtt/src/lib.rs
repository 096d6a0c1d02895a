//! MQTT ingress: a thin wrapper around rumqttc that feeds raw messages into
//! the ingest pipeline.
//!
//! Responsibilities beyond plain transport: automatic reconnect with a
//! configurable pause, re-subscription of the full topic set after every
//! reconnect, and connection-state reporting.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use i3x_core::config::MqttConfig;
use i3x_core::{Error, Result};
use i3x_pipeline::IngestPipeline;

/// Connection state as reported by the ingress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// The MQTT side of the bridge.
pub struct MqttIngress {
    client: AsyncClient,
    status: Arc<RwLock<ConnectionStatus>>,
    topics: Arc<Mutex<BTreeSet<String>>>,
    stopped: Arc<AtomicBool>,
    broker_url: String,
}

impl MqttIngress {
    /// Connect to the broker and start the event-loop task. Incoming
    /// publishes are handed to the pipeline as `(topic, payload)`.
    pub fn start(config: &MqttConfig, pipeline: Arc<IngestPipeline>) -> Result<Arc<Self>> {
        let (host, port) = parse_broker_url(&config.broker_url)?;
        if config.protocol_version == "5" {
            warn!("MQTT 5 requested; the transport speaks 3.1.1");
        }

        let client_id = config
            .client_id
            .clone()
            .unwrap_or_else(|| format!("i3x-bridge-{}", std::process::id()));
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(config.keepalive_secs.max(5)));
        options.set_max_packet_size(10 * 1024 * 1024, 10 * 1024 * 1024);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user, pass);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 100);
        let ingress = Arc::new(Self {
            client,
            status: Arc::new(RwLock::new(ConnectionStatus::Connecting)),
            topics: Arc::new(Mutex::new(BTreeSet::new())),
            stopped: Arc::new(AtomicBool::new(false)),
            broker_url: config.broker_url.clone(),
        });

        let status = ingress.status.clone();
        let topics = ingress.topics.clone();
        let stopped = ingress.stopped.clone();
        let resubscribe_client = ingress.client.clone();
        let reconnect_pause = Duration::from_millis(config.reconnect_period_ms.max(100));

        tokio::spawn(async move {
            loop {
                if stopped.load(Ordering::SeqCst) {
                    *status.write() = ConnectionStatus::Disconnected;
                    break;
                }
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        *status.write() = ConnectionStatus::Connected;
                        let snapshot: Vec<String> = topics.lock().iter().cloned().collect();
                        info!(topics = snapshot.len(), "MQTT connected, restoring subscriptions");
                        for topic in snapshot {
                            if let Err(e) = resubscribe_client
                                .subscribe(topic.clone(), QoS::AtLeastOnce)
                                .await
                            {
                                error!(topic = %topic, error = %e, "re-subscription failed");
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        debug!(topic = %publish.topic, bytes = publish.payload.len(), "message received");
                        pipeline.process(&publish.topic, &publish.payload);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        if stopped.load(Ordering::SeqCst) {
                            *status.write() = ConnectionStatus::Disconnected;
                            break;
                        }
                        *status.write() = ConnectionStatus::Reconnecting;
                        warn!(error = %e, "MQTT connection lost, retrying");
                        tokio::time::sleep(reconnect_pause).await;
                    }
                }
            }
            info!("MQTT event loop stopped");
        });

        Ok(ingress)
    }

    /// Subscribe a topic now and after every reconnect.
    pub async fn subscribe(&self, topic: &str) -> Result<()> {
        self.topics.lock().insert(topic.to_string());
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| Error::Mqtt(format!("subscribe '{}' failed: {}", topic, e)))
    }

    /// Remove a topic from the managed set and unsubscribe it.
    pub async fn unsubscribe(&self, topic: &str) -> Result<()> {
        self.topics.lock().remove(topic);
        self.client
            .unsubscribe(topic)
            .await
            .map_err(|e| Error::Mqtt(format!("unsubscribe '{}' failed: {}", topic, e)))
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    pub fn broker_url(&self) -> &str {
        &self.broker_url
    }

    /// Topics currently managed (and restored on reconnect).
    pub fn subscribed_topics(&self) -> Vec<String> {
        self.topics.lock().iter().cloned().collect()
    }

    /// Stop the event loop and disconnect.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let _ = self.client.disconnect().await;
    }
}

/// Accepts `mqtt://host[:port]`, `tcp://host[:port]`, or a bare
/// `host[:port]`. TLS schemes are refused rather than silently downgraded.
fn parse_broker_url(url: &str) -> Result<(String, u16)> {
    let rest = if let Some(rest) = url.strip_prefix("mqtt://") {
        rest
    } else if let Some(rest) = url.strip_prefix("tcp://") {
        rest
    } else if url.contains("://") {
        return Err(Error::Config(format!(
            "unsupported broker URL scheme in '{}'",
            url
        )));
    } else {
        url
    };
    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| Error::Config(format!("bad broker port in '{}'", url)))?;
            (host, port)
        }
        None => (rest, 1883),
    };
    if host.is_empty() {
        return Err(Error::Config(format!("empty broker host in '{}'", url)));
    }
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_broker_url() {
        assert_eq!(
            parse_broker_url("mqtt://broker.local:1884").unwrap(),
            ("broker.local".to_string(), 1884)
        );
        assert_eq!(
            parse_broker_url("tcp://10.0.0.2").unwrap(),
            ("10.0.0.2".to_string(), 1883)
        );
        assert_eq!(
            parse_broker_url("localhost:1883").unwrap(),
            ("localhost".to_string(), 1883)
        );
        assert!(parse_broker_url("mqtts://secure:8883").is_err());
        assert!(parse_broker_url("mqtt://:1883").is_err());
        assert!(parse_broker_url("mqtt://host:notaport").is_err());
    }
}
