use serde::Serialize;
use tracing::{debug, trace};

use crate::snmp::ResultEntry;

/// Ошибки сборки тела события из результатов.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("no results to encode")]
    Empty,

    #[error("JSON serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Один varbind в исходящем событии.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableJson {
    #[serde(rename = "Data")]
    pub data: String,
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "TypeCode")]
    pub type_code: String,
    #[serde(rename = "TypeCodeId")]
    pub type_code_id: u8,
}

impl From<&ResultEntry> for VariableJson {
    fn from(entry: &ResultEntry) -> Self {
        Self {
            data: entry.value.to_string(),
            id: entry.id.clone(),
            type_code: entry.value.type_name().to_string(),
            type_code_id: entry.value.type_code(),
        }
    }
}

// один результат уходит объектом, несколько массивом
#[derive(Serialize)]
#[serde(untagged)]
enum EventBody {
    Single(VariableJson),
    Many(Vec<VariableJson>),
}

/// JSON форматтер исходящих событий
pub struct JsonFormatter;

impl JsonFormatter {
    /// Сериализует результаты в тело события.
    pub fn to_event_json(results: &[ResultEntry]) -> Result<String, EncodeError> {
        let mut variables: Vec<VariableJson> = results.iter().map(VariableJson::from).collect();

        for variable in &variables {
            trace!(id = %variable.id, data = %variable.data, "result");
        }

        let body = match variables.len() {
            0 => return Err(EncodeError::Empty),
            1 => EventBody::Single(variables.remove(0)),
            _ => EventBody::Many(variables),
        };

        let message = serde_json::to_string(&body)?;
        debug!(%message, "encoded event");

        Ok(message)
    }
}
