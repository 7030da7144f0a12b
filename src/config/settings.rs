use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::snmp::QueryRequest;

pub const DEFAULT_METHOD: &str = "get";
pub const DEFAULT_COMMUNITY: &str = "public";

/// Значение из секции `app_settings`.
///
/// Читается как текст, поэтому `interval: 5000` и `interval: "5000"` равнозначны.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Setting {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Bool(b) => write!(f, "{}", b),
            Setting::Integer(i) => write!(f, "{}", i),
            Setting::Float(x) => write!(f, "{}", x),
            Setting::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Setting {
    fn from(s: &str) -> Self {
        Setting::Text(s.to_string())
    }
}

/// Общие настройки обоих циклов
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Предел времени на один SNMP-запрос
    pub timeout: Duration,
    /// Пауза перед повторным опросом источника команд, если очередь пуста
    pub receive_interval: Duration,
    /// Подтверждать команды с пустым результатом
    pub ack_empty_results: bool,
    /// Неизвестный метод считать ошибкой
    pub strict_methods: bool,
    /// Время жизни SAS-токенов IoT Hub
    pub token_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(60_000),
            receive_interval: Duration::from_millis(10),
            ack_empty_results: false,
            strict_methods: false,
            token_ttl: Duration::from_secs(3600),
        }
    }
}

/// Опрос по таймеру; есть только если задан интервал.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub request: QueryRequest,
}
