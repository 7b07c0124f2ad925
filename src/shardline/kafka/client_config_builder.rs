use crate::shardline::config::KafkaConsumerConfig;
use rdkafka::config::{ClientConfig, RDKafkaLogLevel};
use std::collections::HashMap;
use std::time::Duration;

/// Builder for the librdkafka client configuration of a partition consumer
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::new(),
        }
    }

    /// Everything a partition consumer needs from its consumer config.
    ///
    /// Offsets are stored explicitly by the consumer loop and committed in
    /// the background, so `enable.auto.offset.store` is off.
    pub fn for_consumer(config: &KafkaConsumerConfig) -> Self {
        let mut builder = Self::new()
            .bootstrap_servers(&config.bootstrap_servers())
            .client_id(Some(&config.client_id))
            .group_id(&config.group_id)
            .custom_property("auto.offset.reset", config.auto_offset_reset.as_str())
            .custom_property("enable.auto.commit", "true")
            .custom_property("enable.auto.offset.store", "false");

        if let Some(timeout) = config.timeout() {
            builder = builder
                .request_timeout(timeout)
                .custom_property("socket.timeout.ms", &timeout.as_millis().to_string());
        }
        if let Some(timeout) = config.session_timeout() {
            builder = builder.session_timeout(timeout);
        }
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            if !username.is_empty() {
                builder = builder.sasl_plain(username, password);
            }
        }
        builder.custom_properties(&config.properties)
    }

    /// Set bootstrap servers (brokers)
    pub fn bootstrap_servers(mut self, brokers: &str) -> Self {
        self.config.set("bootstrap.servers", brokers);
        self
    }

    /// Set client ID if provided
    pub fn client_id(mut self, client_id: Option<&str>) -> Self {
        if let Some(id) = client_id {
            self.config.set("client.id", id);
        }
        self
    }

    pub fn group_id(mut self, group_id: &str) -> Self {
        self.config.set("group.id", group_id);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config
            .set("request.timeout.ms", timeout.as_millis().to_string());
        self
    }

    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.config
            .set("session.timeout.ms", timeout.as_millis().to_string());
        self
    }

    /// SASL/PLAIN credentials over plaintext
    pub fn sasl_plain(mut self, username: &str, password: &str) -> Self {
        self.config
            .set("security.protocol", "SASL_PLAINTEXT")
            .set("sasl.mechanisms", "PLAIN")
            .set("sasl.username", username)
            .set("sasl.password", password);
        self
    }

    /// Add custom configuration properties
    pub fn custom_properties(mut self, custom_config: &HashMap<String, String>) -> Self {
        for (key, value) in custom_config {
            self.config.set(key, value);
        }
        self
    }

    /// Add a single custom property
    pub fn custom_property(mut self, key: &str, value: &str) -> Self {
        self.config.set(key, value);
        self
    }

    /// Build the final ClientConfig
    pub fn build(mut self) -> ClientConfig {
        self.config.set_log_level(RDKafkaLogLevel::Info);
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
