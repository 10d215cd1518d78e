//! MQTT connection manager with automatic reconnection

use crate::config::MqttConfig;
use crate::transport::MessagePublisher;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Events emitted by the connection manager
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Connected to the broker and subscriptions requested
    Connected,
    /// Connection lost; the manager keeps retrying
    Disconnected { reason: String },
    /// Message received on a subscribed topic
    Received { topic: String, payload: Bytes },
}

/// Owns the broker connection and forwards incoming messages as events
pub struct ConnectionManager {
    client: AsyncClient,
    event_rx: mpsc::Receiver<ConnectionEvent>,
}

impl ConnectionManager {
    /// Create the client and start the connection loop
    pub fn new(config: &MqttConfig, subscriptions: Vec<String>) -> Self {
        let (client, eventloop) = AsyncClient::new(mqtt_options(config), 64);
        let (event_tx, event_rx) = mpsc::channel::<ConnectionEvent>(100);

        let backoff = Backoff::new(config.reconnect_delay(), config.max_reconnect_delay());
        let loop_client = client.clone();
        tokio::spawn(async move {
            connection_loop(eventloop, loop_client, subscriptions, backoff, event_tx).await;
        });

        Self { client, event_rx }
    }

    /// Receive the next connection event
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.event_rx.recv().await
    }

    /// Publisher sharing this connection
    pub fn publisher(&self) -> MqttPublisher {
        MqttPublisher {
            client: self.client.clone(),
        }
    }
}

fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(config.keep_alive());

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        options.set_credentials(username, password);
    }

    options
}

/// Exponential reconnect delay
#[derive(Debug, Clone, Copy)]
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; doubles the next one up to the maximum
    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = std::cmp::min(self.current * 2, self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Poll the event loop forever, resubscribing after every (re)connect
async fn connection_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    subscriptions: Vec<String>,
    mut backoff: Backoff,
    event_tx: mpsc::Sender<ConnectionEvent>,
) {
    loop {
        let event = match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                backoff.reset();
                for topic in &subscriptions {
                    if let Err(e) = client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                        warn!("[MQTT] Failed to subscribe to {}: {}", topic, e);
                    } else {
                        debug!("[MQTT] Subscribed to {}", topic);
                    }
                }
                ConnectionEvent::Connected
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => ConnectionEvent::Received {
                topic: publish.topic,
                payload: publish.payload,
            },
            Ok(_) => continue,
            Err(e) => {
                let delay = backoff.next_delay();
                info!("[MQTT] Reconnecting in {}ms", delay.as_millis());
                let _ = event_tx
                    .send(ConnectionEvent::Disconnected {
                        reason: e.to_string(),
                    })
                    .await;
                tokio::time::sleep(delay).await;
                continue;
            }
        };

        if event_tx.send(event).await.is_err() {
            debug!("[MQTT] Event receiver dropped, stopping connection loop");
            break;
        }
    }
}

/// Publishes through the shared MQTT client
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

#[async_trait]
impl MessagePublisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        self.client
            .publish_bytes(topic, QoS::AtLeastOnce, false, payload)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_up_to_max() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5));

        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));
        assert_eq!(backoff.next_delay(), Duration::from_secs(5));

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_mqtt_options_from_config() {
        let config = MqttConfig {
            client_id: "bridge-test".into(),
            keep_alive_secs: 45,
            ..Default::default()
        };

        let options = mqtt_options(&config);
        assert_eq!(options.client_id(), "bridge-test");
        assert_eq!(options.keep_alive(), Duration::from_secs(45));
        assert_eq!(options.broker_address(), ("localhost".to_string(), 1883));
    }
}
