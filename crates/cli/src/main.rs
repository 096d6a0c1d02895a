//! Command-line interface for the i3X bridge.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use i3x_api::{AuthState, ServerState};
use i3x_core::config::BridgeConfig;
use i3x_core::{Namespace, ObjectType};
use i3x_mqtt::MqttIngress;
use i3x_pipeline::IngestPipeline;
use i3x_store::ObjectStore;
use i3x_subscription::SubscriptionManager;

/// i3X bridge - read-only MQTT to information-model gateway.
#[derive(Parser, Debug)]
#[command(name = "i3x-bridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the bridge.
    Serve {
        /// Path to the configuration file (TOML or JSON).
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// Run without an MQTT connection (API only).
        #[arg(long)]
        no_mqtt: bool,
    },
    /// Validate a configuration file and exit.
    CheckConfig {
        /// Path to the configuration file.
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "i3x=debug" } else { "i3x=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Serve { config, no_mqtt } => serve(&config, no_mqtt).await,
        Command::CheckConfig { config } => {
            let loaded = BridgeConfig::load(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            loaded.validate()?;
            println!(
                "{}: ok ({} namespaces, {} object types, {} mappings)",
                config.display(),
                loaded.namespaces.len(),
                loaded.object_types.len(),
                loaded.mappings.len()
            );
            Ok(())
        }
    }
}

async fn serve(config_path: &PathBuf, no_mqtt: bool) -> Result<()> {
    let config = BridgeConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    config.validate()?;

    // Core: store, pipeline, subscriptions, and the fanout between them.
    let store = Arc::new(ObjectStore::new());
    let pipeline = Arc::new(IngestPipeline::new(store.clone()));
    let subscriptions = Arc::new(SubscriptionManager::new());

    let fanout = subscriptions.clone();
    store.add_change_listener(Box::new(move |element_id, value, _| {
        fanout.notify_change(element_id, value);
    }));

    seed_store(&store, &config);
    let mapping_topics = seed_mappings(&pipeline, &config)?;

    // Transport.
    let mqtt = if no_mqtt {
        warn!("running without MQTT; ingest is disabled");
        None
    } else {
        let ingress = MqttIngress::start(&config.mqtt, pipeline.clone())?;
        for topic in &mapping_topics {
            ingress
                .subscribe(topic)
                .await
                .with_context(|| format!("subscribing '{}'", topic))?;
        }
        info!(
            broker = %config.mqtt.broker_url,
            topics = mapping_topics.len(),
            "MQTT ingress started"
        );
        Some(ingress)
    };

    // HTTP.
    let auth = AuthState::new(config.auth.enabled, config.auth.api_keys.clone());
    let mut state = ServerState::new(store, pipeline, subscriptions, auth);
    if let Some(mqtt) = &mqtt {
        state = state.with_mqtt(mqtt.clone());
    }

    let bind: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| "invalid server.host/server.port")?;
    i3x_api::run(bind, state).await?;

    if let Some(mqtt) = mqtt {
        mqtt.stop().await;
    }
    info!("bridge stopped");
    Ok(())
}

/// Register the configured namespaces and object types.
fn seed_store(store: &ObjectStore, config: &BridgeConfig) {
    for ns in &config.namespaces {
        store.register_namespace(Namespace {
            uri: ns.uri.clone(),
            display_name: ns.display_name.clone(),
        });
    }
    for ty in &config.object_types {
        store.register_object_type(ObjectType {
            element_id: ty.element_id.clone(),
            display_name: ty.display_name.clone(),
            namespace_uri: ty.namespace_uri.clone(),
            schema: ty.schema.clone(),
        });
    }
    info!(
        namespaces = config.namespaces.len(),
        object_types = config.object_types.len(),
        "seeded store from configuration"
    );
}

/// Compile the configured mapping rules, returning the broker topics to
/// subscribe.
fn seed_mappings(pipeline: &IngestPipeline, config: &BridgeConfig) -> Result<Vec<String>> {
    let mut topics = Vec::new();
    let mut engine = pipeline.engine().write();
    for mapping in &config.mappings {
        let rule = engine
            .add_rule(mapping.clone())
            .with_context(|| format!("mapping rule '{}'", mapping.id))?;
        let topic = rule.pattern.mqtt_subscription_topic();
        if !topics.contains(&topic) {
            topics.push(topic);
        }
    }
    info!(rules = config.mappings.len(), "compiled mapping rules");
    Ok(topics)
}
