//! Облачная сторона моста: исходящие события и входящие команды.
//!
//! Циклы моста видят только трейты [`EventSink`] и [`CommandSource`];
//! [`iothub`] реализует оба поверх одного MQTT-соединения с Azure IoT Hub.

use async_trait::async_trait;

pub mod connection_string;
pub mod iothub;
pub mod sas;
pub mod topic;

pub use connection_string::IotHubConnection;
pub use iothub::{IotHubDriver, IotHubReceiver, IotHubSender};
pub use topic::Properties;

/// Версия MQTT API IoT Hub.
pub const API_VERSION: &str = "2021-04-12";

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid IoT Hub connection string: {0}")]
    ConnectionString(String),

    #[error("could not create SAS token: {0}")]
    Token(String),

    #[error("failed to send event: {0}")]
    Send(String),

    #[error("failed to acknowledge message: {0}")]
    Ack(String),

    #[error("cloud connection closed")]
    Closed,
}

/// Сообщение cloud-to-device.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub body: Vec<u8>,
    /// Свойства приложения, заданные отправителем.
    pub properties: Properties,
    /// Системные свойства от брокера (`$.mid`, `iothub-ack`, ...).
    pub system_properties: Properties,
    pub(crate) publish: Option<rumqttc::Publish>,
}

impl InboundMessage {
    #[cfg(test)]
    pub fn new(body: impl Into<Vec<u8>>, properties: Properties) -> Self {
        Self {
            body: body.into(),
            properties,
            system_properties: Properties::new(),
            publish: None,
        }
    }

    #[cfg(test)]
    pub fn with_system_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.system_properties.insert(key.into(), value.into());
        self
    }

    pub fn message_id(&self) -> Option<&str> {
        self.system_properties.get("$.mid").map(String::as_str)
    }
}

/// Исходящие события device-to-cloud.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send_event(&self, payload: String) -> Result<(), TransportError>;
}

/// Входящие сообщения cloud-to-device.
#[async_trait]
pub trait CommandSource: Send {
    /// Открывает канал один раз, до первого приёма.
    async fn open(&mut self) -> Result<(), TransportError>;

    /// Следующее сообщение или `None`, если очередь пока пуста.
    async fn receive(&mut self) -> Result<Option<InboundMessage>, TransportError>;

    /// Подтверждает сообщение, чтобы хаб не доставил его повторно.
    async fn complete(&mut self, message: &InboundMessage) -> Result<(), TransportError>;
}
