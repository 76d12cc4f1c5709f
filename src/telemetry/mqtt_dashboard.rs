use super::{Dashboard, DashboardValue, MemoryDashboard, TelemetryConfig, TelemetryError};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
    Reconnecting,
}

/// Splits `host:port`, defaulting the port to 1883.
pub fn parse_server(server: &str) -> Result<(String, u16), TelemetryError> {
    let mut parts = server.splitn(2, ':');
    let host = parts.next().unwrap_or_default().trim();
    if host.is_empty() {
        return Err(TelemetryError::InvalidBroker(server.to_string()));
    }
    let port = match parts.next() {
        Some(p) => p
            .trim()
            .parse()
            .map_err(|_| TelemetryError::InvalidBroker(server.to_string()))?,
        None => 1883,
    };
    Ok((host.to_string(), port))
}

/// Outgoing side of the dashboard transport.
pub trait Publisher: Send + Sync {
    /// Queues a retained message without waiting on the network.
    fn publish_retained(&self, topic: String, payload: String) -> Result<(), TelemetryError>;
}

impl Publisher for AsyncClient {
    fn publish_retained(&self, topic: String, payload: String) -> Result<(), TelemetryError> {
        self.try_publish(topic, QoS::AtMostOnce, true, payload)
            .map_err(|e| TelemetryError::PublishError(e.to_string()))
    }
}

/// Dashboard that publishes changed values as retained MQTT messages.
///
/// Values are published as plain text under `<topic_prefix>/<key>`. A local
/// [`MemoryDashboard`] keeps the last value per key that reached the
/// request queue, so unchanged values are not republished every loop and
/// dropped ones are sent again on the next put.
pub struct MqttDashboard<P: Publisher = AsyncClient> {
    client: P,
    topic_prefix: String,
    cache: MemoryDashboard,
    _event_loop: Option<JoinHandle<()>>,
}

impl MqttDashboard<AsyncClient> {
    /// Connects to the broker and spawns the event loop task. Must be
    /// called from within a tokio runtime.
    pub fn connect(
        config: &TelemetryConfig,
        cancel: CancellationToken,
    ) -> Result<Self, TelemetryError> {
        let (host, port) = parse_server(&config.server)?;
        info!("Connecting dashboard to MQTT broker {}:{}", host, port);

        let mut options = MqttOptions::new(config.client_id.clone(), host, port);
        options.set_keep_alive(Duration::from_secs(5));
        if !config.user.is_empty() {
            options.set_credentials(config.user.clone(), config.pw.clone());
        }

        let (client, event_loop) = AsyncClient::new(options, 100);
        let handle = tokio::spawn(run_event_loop(event_loop, cancel));

        let mut dashboard = Self::with_publisher(client, &config.topic_prefix);
        dashboard._event_loop = Some(handle);
        Ok(dashboard)
    }
}

impl<P: Publisher> MqttDashboard<P> {
    pub fn with_publisher(client: P, topic_prefix: &str) -> Self {
        Self {
            client,
            topic_prefix: topic_prefix.trim_end_matches('/').to_string(),
            cache: MemoryDashboard::new(),
            _event_loop: None,
        }
    }

    pub fn topic(&self, key: &str) -> String {
        format!("{}/{}", self.topic_prefix, key)
    }
}

impl<P: Publisher> Dashboard for MqttDashboard<P> {
    fn put_value(&self, key: &str, value: DashboardValue) {
        if self.cache.get(key).as_ref() == Some(&value) {
            return;
        }
        match self.client.publish_retained(self.topic(key), value.to_string()) {
            Ok(()) => {
                self.cache.update(key, value);
            }
            // Left uncached so the next put retries it.
            Err(e) => debug!("Dropping dashboard value {}: {}", key, e),
        }
    }
}

async fn run_event_loop(mut event_loop: EventLoop, cancel: CancellationToken) {
    let mut state = ConnectionState::Disconnected;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Dashboard MQTT event loop stopped");
                break;
            }
            event = event_loop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Dashboard connected to MQTT broker");
                    state = ConnectionState::Connected;
                }
                Ok(_) => {}
                Err(e) => {
                    if state == ConnectionState::Connected {
                        warn!("Dashboard lost MQTT connection: {}", e);
                    } else {
                        error!("Dashboard MQTT connection failed: {}", e);
                    }
                    state = ConnectionState::Reconnecting;
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }
    }
}
