use std::fmt;
use std::str::FromStr;

use super::TransportError;

/// Устройство из строки подключения IoT Hub.
#[derive(Clone, PartialEq, Eq)]
pub struct IotHubConnection {
    pub host_name: String,
    pub device_id: String,
    pub shared_access_key: String,
    pub gateway_host_name: Option<String>,
}

impl IotHubConnection {
    /// Разбирает `HostName=...;DeviceId=...;SharedAccessKey=...`.
    ///
    /// Порядок ключей любой, лишние ключи игнорируются.
    pub fn parse(s: &str) -> Result<Self, TransportError> {
        let mut host_name = None;
        let mut device_id = None;
        let mut shared_access_key = None;
        let mut gateway_host_name = None;

        for part in s.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                TransportError::ConnectionString(format!("'{}' is not a key=value pair", part))
            })?;

            let value = value.trim().to_string();
            match key.trim() {
                "HostName" => host_name = Some(value),
                "DeviceId" => device_id = Some(value),
                "SharedAccessKey" => shared_access_key = Some(value),
                "GatewayHostName" => gateway_host_name = Some(value),
                _ => {}
            }
        }

        let required = |value: Option<String>, name: &str| {
            value.filter(|v| !v.is_empty()).ok_or_else(|| {
                TransportError::ConnectionString(format!("missing {}", name))
            })
        };

        Ok(Self {
            host_name: required(host_name, "HostName")?,
            device_id: required(device_id, "DeviceId")?,
            shared_access_key: required(shared_access_key, "SharedAccessKey")?,
            gateway_host_name,
        })
    }

    /// Хост для MQTT-соединения.
    pub fn broker_host(&self) -> &str {
        self.gateway_host_name.as_deref().unwrap_or(&self.host_name)
    }

    /// URI ресурса, на который выписан SAS-токен.
    pub fn resource_uri(&self) -> String {
        format!("{}/devices/{}", self.host_name, self.device_id)
    }

    pub fn mqtt_username(&self) -> String {
        format!(
            "{}/{}/?api-version={}",
            self.host_name,
            self.device_id,
            super::API_VERSION
        )
    }
}

impl FromStr for IotHubConnection {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ключ не должен попасть в логи
impl fmt::Debug for IotHubConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IotHubConnection")
            .field("host_name", &self.host_name)
            .field("device_id", &self.device_id)
            .field("shared_access_key", &"<redacted>")
            .field("gateway_host_name", &self.gateway_host_name)
            .finish()
    }
}
