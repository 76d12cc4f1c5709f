use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Publish to an MQTT broker; otherwise values stay in memory.
    pub mqtt_enabled: bool,
    /// Broker as `host:port`. The port defaults to 1883.
    pub server: String,
    pub user: String,
    pub pw: String,
    pub client_id: String,
    pub topic_prefix: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            mqtt_enabled: false,
            server: "localhost:1883".to_string(),
            user: String::new(),
            pw: String::new(),
            client_id: "opendrive".to_string(),
            topic_prefix: "opendrive/dashboard".to_string(),
        }
    }
}
