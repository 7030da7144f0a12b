//! Два цикла, которые переносят результаты SNMP в облако.
//!
//! [`poll::start_poll`] опрашивает агента по таймеру настроенным запросом,
//! [`intake::CommandIntake`] отвечает на C2D-команды. Между собой они не
//! общаются, общий у них только [`EventSink`].

use tracing::debug;

use crate::cloud::{EventSink, TransportError};
use crate::formatter::{EncodeError, JsonFormatter};
use crate::snmp::{QueryError, QueryExecutor, QueryRequest};

pub mod intake;
pub mod poll;

#[cfg(test)]
pub(crate) mod testing;

pub use intake::{CommandIntake, IntakeOptions};
pub use poll::start_poll;

/// Ошибки одной итерации цикла.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Send(#[from] TransportError),
}

/// Итог одного запроса.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forwarded {
    Sent { entries: usize },
    /// Запрос ничего не вернул, события нет
    Empty,
}

/// Запрос, кодирование и отправка.
pub async fn forward(
    executor: &dyn QueryExecutor,
    sink: &dyn EventSink,
    request: &QueryRequest,
) -> Result<Forwarded, BridgeError> {
    let results = executor.execute(request).await?;
    if results.is_empty() {
        return Ok(Forwarded::Empty);
    }

    let message = JsonFormatter::to_event_json(&results)?;
    sink.send_event(message).await?;

    debug!(entries = results.len(), "event sent");
    Ok(Forwarded::Sent {
        entries: results.len(),
    })
}
