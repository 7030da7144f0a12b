use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

pub mod endpoint;
pub mod error;
pub mod settings;

pub use endpoint::Endpoint;
pub use error::{ConfigError, RUNTIME_FAILURE_EXIT_CODE};
pub use settings::{PollSettings, Setting, Settings};

use crate::cloud::IotHubConnection;
use crate::snmp::{QueryRequest, SnmpMethod};

/// Секция connection_strings конфигурационного файла
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionStrings {
    /// `ip=<IPv4>;port=<port>` SNMP-агента
    pub snmp: Option<String>,
    /// Строка подключения устройства IoT Hub
    pub iothub: Option<String>,
}

/// Секция app_settings конфигурационного файла
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Интервал опроса в мс; включает опрос по таймеру
    pub interval: Option<Setting>,
    pub method: Option<Setting>,
    pub community: Option<Setting>,
    pub oid: Option<Setting>,
    /// Таймаут SNMP-запроса в мс
    pub timeout: Option<Setting>,
    /// Пауза цикла команд при простое, мс
    pub receive_interval: Option<Setting>,
    pub ack_empty_results: Option<Setting>,
    pub strict_methods: Option<Setting>,
    /// Время жизни SAS-токена, сек
    pub token_ttl: Option<Setting>,
}

/// Конфигурационный файл как он лежит на диске
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub connection_strings: ConnectionStrings,
    pub app_settings: AppSettings,
}

impl AppConfig {
    /// Читает YAML-файл и применяет переопределения из окружения
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: AppConfig =
            serde_yml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Переопределяет значения из файла через `SNMP_CONNECTION`, `IOTHUB_CONNECTION_STRING`,
    /// `SNMP_COMMUNITY` и `SNMP_TIMEOUT`, если `lookup` их знает
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(snmp) = lookup("SNMP_CONNECTION") {
            self.connection_strings.snmp = Some(snmp);
        }
        if let Some(iothub) = lookup("IOTHUB_CONNECTION_STRING") {
            self.connection_strings.iothub = Some(iothub);
        }
        if let Some(community) = lookup("SNMP_COMMUNITY") {
            self.app_settings.community = Some(Setting::Text(community));
        }
        if let Some(timeout) = lookup("SNMP_TIMEOUT") {
            self.app_settings.timeout = Some(Setting::Text(timeout));
        }
    }

    /// Проверяет все настройки и собирает неизменяемую конфигурацию
    pub fn validate(&self) -> Result<BridgeConfig, ConfigError> {
        let endpoint = Endpoint::parse(self.connection_strings.snmp.as_deref().unwrap_or_default())?;

        let poll = match &self.app_settings.interval {
            Some(interval) => Some(self.poll_settings(interval)?),
            None => None,
        };

        let iothub = self
            .connection_strings
            .iothub
            .as_deref()
            .ok_or_else(|| ConfigError::IotHubConnectionString("missing".to_string()))
            .and_then(|s| {
                IotHubConnection::parse(s)
                    .map_err(|e| ConfigError::IotHubConnectionString(e.to_string()))
            })?;

        let defaults = Settings::default();
        let s = &self.app_settings;
        let settings = Settings {
            timeout: millis(s.timeout.as_ref(), "timeout")?.unwrap_or(defaults.timeout),
            receive_interval: millis(s.receive_interval.as_ref(), "receive_interval")?
                .unwrap_or(defaults.receive_interval),
            ack_empty_results: flag(s.ack_empty_results.as_ref(), "ack_empty_results")?
                .unwrap_or(defaults.ack_empty_results),
            strict_methods: flag(s.strict_methods.as_ref(), "strict_methods")?
                .unwrap_or(defaults.strict_methods),
            token_ttl: seconds(s.token_ttl.as_ref(), "token_ttl")?.unwrap_or(defaults.token_ttl),
        };

        Ok(BridgeConfig {
            endpoint,
            poll,
            iothub,
            settings,
        })
    }

    fn poll_settings(&self, interval: &Setting) -> Result<PollSettings, ConfigError> {
        let raw = interval.to_string();
        let interval = raw
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or(ConfigError::Interval(raw))?;

        let s = &self.app_settings;
        let method = s
            .method
            .as_ref()
            .map(Setting::to_string)
            .unwrap_or_else(|| settings::DEFAULT_METHOD.to_string());
        let community = s
            .community
            .as_ref()
            .map(Setting::to_string)
            .unwrap_or_else(|| settings::DEFAULT_COMMUNITY.to_string());
        let oid = s.oid.as_ref().ok_or(ConfigError::MissingOid)?.to_string();

        Ok(PollSettings {
            interval: Duration::from_millis(interval),
            request: QueryRequest::new(SnmpMethod::parse(&method), community, oid),
        })
    }
}

fn millis(value: Option<&Setting>, name: &'static str) -> Result<Option<Duration>, ConfigError> {
    number(value, name).map(|v| v.map(Duration::from_millis))
}

fn seconds(value: Option<&Setting>, name: &'static str) -> Result<Option<Duration>, ConfigError> {
    number(value, name).map(|v| v.map(Duration::from_secs))
}

fn number(value: Option<&Setting>, name: &'static str) -> Result<Option<u64>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };

    let raw = value.to_string();
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|v| *v > 0)
        .map(Some)
        .ok_or(ConfigError::InvalidSetting { name, value: raw })
}

fn flag(value: Option<&Setting>, name: &'static str) -> Result<Option<bool>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };

    match value.to_string().trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(Some(true)),
        "false" | "no" | "0" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidSetting {
            name,
            value: value.to_string(),
        }),
    }
}

/// Проверенная конфигурация, не меняется до конца работы процесса
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub endpoint: Endpoint,
    pub poll: Option<PollSettings>,
    pub iothub: IotHubConnection,
    pub settings: Settings,
}

impl BridgeConfig {
    pub fn log_summary(&self) {
        info!(endpoint = %self.endpoint, "SNMP agent");
        match &self.poll {
            Some(poll) => info!(
                interval = ?poll.interval,
                method = %poll.request.method,
                community = %poll.request.community,
                oid = %poll.request.oid,
                "scheduled polling enabled"
            ),
            None => info!("scheduled polling disabled (no interval configured)"),
        }
        info!(
            host = %self.iothub.host_name,
            device = %self.iothub.device_id,
            "IoT Hub device"
        );
        info!(
            timeout = ?self.settings.timeout,
            receive_interval = ?self.settings.receive_interval,
            ack_empty_results = self.settings.ack_empty_results,
            strict_methods = self.settings.strict_methods,
            "settings"
        );
    }
}
