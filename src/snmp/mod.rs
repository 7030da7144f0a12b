use std::fmt;

use async_trait::async_trait;

pub mod error;
pub mod oid;
pub mod v1;
pub mod value;

pub use error::QueryError;
pub use oid::parse_oid;
pub use v1::SnmpExecutor;
pub use value::{ResultEntry, SnmpValue};

/// Режим запроса из конфигурации или входящей команды.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpMethod {
    /// Одиночный GET.
    Get,
    /// Обход поддерева через GETNEXT.
    Walk,
    /// Всё остальное, как есть, для логов.
    Unsupported(String),
}

impl SnmpMethod {
    /// `get` / `walk` с учётом регистра.
    pub fn parse(name: &str) -> Self {
        match name {
            "get" => SnmpMethod::Get,
            "walk" => SnmpMethod::Walk,
            other => SnmpMethod::Unsupported(other.to_string()),
        }
    }
}

impl fmt::Display for SnmpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnmpMethod::Get => f.write_str("get"),
            SnmpMethod::Walk => f.write_str("walk"),
            SnmpMethod::Unsupported(name) => f.write_str(name),
        }
    }
}

/// Один запрос к настроенному агенту.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub method: SnmpMethod,
    pub community: String,
    pub oid: String,
}

impl QueryRequest {
    pub fn new(method: SnmpMethod, community: impl Into<String>, oid: impl Into<String>) -> Self {
        Self {
            method,
            community: community.into(),
            oid: oid.into(),
        }
    }
}

/// Выполняет запросы к SNMP-агенту.
///
/// Результаты в порядке ответа агента. Реализация вызывается одновременно
/// из цикла опроса и цикла команд.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, request: &QueryRequest) -> Result<Vec<ResultEntry>, QueryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_are_case_sensitive() {
        assert_eq!(SnmpMethod::parse("get"), SnmpMethod::Get);
        assert_eq!(SnmpMethod::parse("walk"), SnmpMethod::Walk);
        assert_eq!(
            SnmpMethod::parse("GET"),
            SnmpMethod::Unsupported("GET".to_string())
        );
        assert_eq!(SnmpMethod::parse(""), SnmpMethod::Unsupported(String::new()));
    }

    #[test]
    fn method_displays_wire_name() {
        assert_eq!(SnmpMethod::Walk.to_string(), "walk");
        assert_eq!(SnmpMethod::Unsupported("set".into()).to_string(), "set");
    }
}
