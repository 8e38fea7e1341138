//! MQTT dashboard publisher
//!
//! Events go out at QoS 0 on a single topic. The rumqttc event loop runs on
//! a background task and reconnects on its own; while the broker is down,
//! publishes only fill the client's request queue and are dropped once it
//! is full. [`MqttEventPublisher::flush`] sends a disconnect behind the
//! queued events and waits, bounded, for the loop to get there.

use crate::config::DashboardSection;
use crate::events::{DashboardEvent, EventError, EventPublisher};
use async_trait::async_trait;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, Event, MqttOptions};
use rumqttc::{Outgoing, Transport as RumqttcTransport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use url::Url;

const REQUEST_QUEUE_CAPACITY: usize = 10;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Build client options from the dashboard section
///
/// Credentials are read from the environment variables named in the section.
pub fn configure_mqtt_options(config: &DashboardSection) -> Result<MqttOptions, EventError> {
    let url = Url::parse(&config.broker_url)
        .map_err(|_| EventError::InvalidBrokerUrl(config.broker_url.clone()))?;

    let host = url
        .host_str()
        .ok_or_else(|| EventError::InvalidBrokerUrl(config.broker_url.clone()))?;
    let port = url
        .port()
        .unwrap_or(if url.scheme() == "mqtts" { 8883 } else { 1883 });

    // Unique per process start so two routers never kick each other off
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let client_id = format!("{}-{timestamp}", config.source);
    let mut mqtt_options = MqttOptions::new(client_id, host, port);

    if url.scheme() == "mqtts" {
        mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    if let Some(username_env) = &config.username_env {
        if let Ok(username) = std::env::var(username_env) {
            let password = config
                .password_env
                .as_ref()
                .and_then(|env_name| std::env::var(env_name).ok())
                .unwrap_or_default();
            mqtt_options.set_credentials(username, password);
        }
    }

    mqtt_options.set_keep_alive(Duration::from_secs(60));
    Ok(mqtt_options)
}

pub struct MqttEventPublisher {
    client: AsyncClient,
    topic: String,
    closing: Arc<AtomicBool>,
    event_loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl MqttEventPublisher {
    /// Create the client and start its event loop; needs a running tokio runtime
    pub fn connect(config: &DashboardSection) -> Result<Self, EventError> {
        let options = configure_mqtt_options(config)?;
        let (host, port) = options.broker_address();
        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_QUEUE_CAPACITY);
        let closing = Arc::new(AtomicBool::new(false));
        let loop_closing = closing.clone();

        let handle = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        debug!("Dashboard publisher disconnected");
                        break;
                    }
                    Ok(event) => trace!(?event, "Dashboard MQTT event"),
                    Err(e) if loop_closing.load(Ordering::SeqCst) => {
                        warn!(error = %e, "Dashboard broker unreachable while closing, queued events dropped");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Dashboard broker connection error, retrying");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });

        info!(host = %host, port, topic = %config.topic, "Dashboard publisher started");
        Ok(Self {
            client,
            topic: config.topic.clone(),
            closing,
            event_loop_handle: Mutex::new(Some(handle)),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl EventPublisher for MqttEventPublisher {
    async fn publish(&self, event: &DashboardEvent) -> Result<(), EventError> {
        let payload = serde_json::to_vec(event)?;
        self.client
            .try_publish(self.topic.clone(), QoS::AtMostOnce, false, payload)
            .map_err(|e| EventError::PublishFailed(e.to_string()))?;
        debug!(event = %event.event, task_id = %event.task_id, "Dashboard event queued");
        Ok(())
    }

    /// Disconnect after the queued events and wait for the event loop to end
    ///
    /// Gives up after `timeout` and stops the loop; a second call is a no-op.
    async fn flush(&self, timeout: Duration) -> Result<(), EventError> {
        let handle = self
            .event_loop_handle
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        let Some(mut handle) = handle else {
            return Ok(());
        };

        self.closing.store(true, Ordering::SeqCst);
        let drained = tokio::time::timeout(timeout, async {
            if let Err(e) = self.client.disconnect().await {
                debug!(error = %e, "Dashboard event loop already stopped");
            }
            let _ = (&mut handle).await;
        })
        .await;

        match drained {
            Ok(()) => {
                debug!(topic = %self.topic, "Dashboard events flushed");
                Ok(())
            }
            Err(_) => {
                handle.abort();
                Err(EventError::FlushTimeout(timeout))
            }
        }
    }
}

impl Drop for MqttEventPublisher {
    fn drop(&mut self) {
        if let Ok(slot) = self.event_loop_handle.get_mut() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}
