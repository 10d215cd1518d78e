mod command;
mod config;
mod connection;
mod device;
mod error;
mod report;
mod topics;
mod transport;

#[cfg(test)]
mod testing;

use anyhow::Context;
use bytes::Bytes;
use command::{PipelineExecutor, RequestDispatcher};
use config::BridgeConfig;
use connection::{ConnectionEvent, ConnectionManager};
use device::DeviceDirectory;
use report::MqttReporter;
use std::sync::Arc;
use topics::TopicLayout;
use transport::{BridgeTransport, MessagePublisher};
use ubisys_shared::AttributeRegistry;

use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = BridgeConfig::load().context("Failed to load configuration")?;
    let registry = Arc::new(AttributeRegistry::ubisys().context("Invalid attribute tables")?);
    let topics = config.topics();

    info!(
        "Ubisys bridge starting: broker {}:{}",
        config.mqtt.host, config.mqtt.port
    );
    info!("  Requests: {}", topics.request_filter());

    let subscriptions = vec![
        topics.request_filter(),
        topics.devices_topic(),
        topics.zcl_response_topic(),
    ];
    let mut conn = ConnectionManager::new(&config.mqtt, subscriptions);
    let publisher: Arc<dyn MessagePublisher> = Arc::new(conn.publisher());

    let transport = Arc::new(BridgeTransport::new(
        publisher.clone(),
        topics.zcl_request_topic(),
        config.response_timeout(),
    ));
    let directory = Arc::new(DeviceDirectory::new());
    let dispatcher = Arc::new(RequestDispatcher::new(
        registry,
        directory.clone(),
        PipelineExecutor::new(transport.clone()),
        Arc::new(MqttReporter::new(publisher, topics.clone())),
        topics.clone(),
    ));

    let router = Router {
        devices_topic: topics.devices_topic(),
        response_topic: topics.zcl_response_topic(),
        topics,
        directory,
        transport,
        dispatcher,
    };

    // Main event loop
    loop {
        match conn.recv().await {
            Some(ConnectionEvent::Connected) => {
                info!("Connected to broker");
            }
            Some(ConnectionEvent::Disconnected { reason }) => {
                warn!("Disconnected: {}", reason);
            }
            Some(ConnectionEvent::Received { topic, payload }) => {
                router.route(topic, payload).await;
            }
            None => {
                error!("Connection manager closed");
                break;
            }
        }
    }

    Ok(())
}

/// Routes incoming messages to the directory, the transport or a new request task
struct Router {
    topics: TopicLayout,
    devices_topic: String,
    response_topic: String,
    directory: Arc<DeviceDirectory>,
    transport: Arc<BridgeTransport>,
    dispatcher: Arc<RequestDispatcher>,
}

impl Router {
    async fn route(&self, topic: String, payload: Bytes) {
        if topic == self.devices_topic {
            if let Err(e) = self.directory.update_from_bridge(&payload).await {
                error!("Invalid device list: {}", e);
            }
        } else if topic == self.response_topic {
            self.transport.handle_response(&payload).await;
        } else if self.topics.is_request(&topic) {
            // Each request runs on its own task; the dispatcher serializes per device
            let dispatcher = self.dispatcher.clone();
            tokio::spawn(async move {
                let _ = dispatcher.handle(&topic, &payload).await;
            });
        } else {
            debug!("Ignoring message on {}", topic);
        }
    }
}
