use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use super::{forward, Forwarded};
use crate::cloud::{CommandSource, EventSink, InboundMessage, TransportError};
use crate::snmp::{QueryExecutor, QueryRequest, SnmpMethod};

/// Тело C2D-команды.
///
/// Отсутствующие поля становятся пустыми строками; что с ними делать, решает исполнитель.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SnmpCommand {
    #[serde(rename = "Method", default)]
    pub method: Option<String>,
    #[serde(rename = "OID", default)]
    pub oid: Option<String>,
    #[serde(rename = "Community", default)]
    pub community: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("command body is not a valid JSON object: {0}")]
pub struct CommandError(#[from] serde_json::Error);

impl SnmpCommand {
    pub fn parse(body: &[u8]) -> Result<Self, CommandError> {
        let body = body.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(body);
        Ok(serde_json::from_slice(body)?)
    }

    pub fn into_request(self) -> QueryRequest {
        QueryRequest::new(
            SnmpMethod::parse(self.method.as_deref().unwrap_or_default()),
            self.community.unwrap_or_default(),
            self.oid.unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeOptions {
    /// Пауза, если очередь пуста или источник вернул временную ошибку
    pub receive_interval: Duration,
    pub ack_empty_results: bool,
}

/// Чем закончилась обработка одного сообщения.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    /// Нет свойств приложения, это не команда
    Ignored,
    /// Тело не разобралось; не подтверждается
    Rejected,
    /// Ошибка запроса, кодирования, отправки или подтверждения; не подтверждается
    Failed,
    /// Запрос ничего не вернул
    Empty { acked: bool },
    Completed,
}

/// Отвечает на C2D-команды по одной, в порядке поступления.
pub struct CommandIntake<S> {
    executor: Arc<dyn QueryExecutor>,
    sink: Arc<dyn EventSink>,
    source: S,
    options: IntakeOptions,
}

impl<S: CommandSource> CommandIntake<S> {
    pub fn new(
        executor: Arc<dyn QueryExecutor>,
        sink: Arc<dyn EventSink>,
        source: S,
        options: IntakeOptions,
    ) -> Self {
        Self {
            executor,
            sink,
            source,
            options,
        }
    }

    /// Открывает источник и обрабатывает сообщения до отмены.
    ///
    /// Ошибка только если источник закрыт насовсем.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), TransportError> {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            opened = self.source.open() => opened?,
        }
        info!("command intake started");

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.source.receive() => received,
            };

            match received {
                Ok(Some(message)) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.handle(message) => {}
                    }
                }
                Ok(None) => {
                    if self.pause(&cancel).await {
                        break;
                    }
                }
                Err(TransportError::Closed) => {
                    warn!("command source closed");
                    return Err(TransportError::Closed);
                }
                Err(e) => {
                    warn!(error = %e, "receive failed");
                    if self.pause(&cancel).await {
                        break;
                    }
                }
            }
        }

        info!("command intake stopped");
        Ok(())
    }

    // true, если отменили во время ожидания
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(self.options.receive_interval) => false,
        }
    }

    #[instrument(name = "command", skip_all, fields(message_id = message.message_id().unwrap_or("-")))]
    pub async fn handle(&mut self, message: InboundMessage) -> Handled {
        if message.properties.is_empty() {
            trace!("message has no properties, ignoring");
            return Handled::Ignored;
        }

        debug!(body = %String::from_utf8_lossy(&message.body), "command received");

        let request = match SnmpCommand::parse(&message.body) {
            Ok(command) => command.into_request(),
            Err(e) => {
                warn!(error = %e, "could not read command");
                return Handled::Rejected;
            }
        };

        match forward(self.executor.as_ref(), self.sink.as_ref(), &request).await {
            Ok(Forwarded::Sent { entries }) => {
                debug!(entries, "command answered");
                self.complete(&message, Handled::Completed).await
            }
            Ok(Forwarded::Empty) => {
                info!("No results");
                if self.options.ack_empty_results {
                    self.complete(&message, Handled::Empty { acked: true }).await
                } else {
                    Handled::Empty { acked: false }
                }
            }
            Err(e) => {
                warn!(error = %e, method = %request.method, oid = %request.oid, "command failed");
                Handled::Failed
            }
        }
    }

    async fn complete(&mut self, message: &InboundMessage, done: Handled) -> Handled {
        match self.source.complete(message).await {
            Ok(()) => done,
            Err(e) => {
                warn!(error = %e, "could not complete message");
                Handled::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testing::{command, plain, Call, FakeExecutor, FakeSink, FakeSource, Journal};
    use crate::snmp::{QueryError, ResultEntry, SnmpValue};

    const OID: &str = "1.3.6.1.4.1.21796.4.9.1.1.2.1";

    fn options() -> IntakeOptions {
        IntakeOptions {
            receive_interval: Duration::from_millis(10),
            ack_empty_results: false,
        }
    }

    fn get_body() -> String {
        format!(r#"{{"Method":"get","OID":"{}","Community":"public"}}"#, OID)
    }

    fn reading() -> Vec<ResultEntry> {
        vec![ResultEntry::new(OID, SnmpValue::Integer(215))]
    }

    fn build(
        journal: &Journal,
        executor: FakeExecutor,
        sink: FakeSink,
        options: IntakeOptions,
    ) -> CommandIntake<FakeSource> {
        CommandIntake::new(
            Arc::new(executor),
            Arc::new(sink),
            FakeSource::new(journal, Vec::new()),
            options,
        )
    }

    #[test]
    fn command_fields_map_to_request() {
        let command = SnmpCommand::parse(get_body().as_bytes()).unwrap();
        assert_eq!(
            command.into_request(),
            QueryRequest::new(SnmpMethod::Get, "public", OID)
        );
    }

    #[test]
    fn missing_and_null_fields_become_empty() {
        let command = SnmpCommand::parse(br#"{"Method":"walk","OID":null}"#).unwrap();
        let request = command.into_request();
        assert_eq!(request.method, SnmpMethod::Walk);
        assert_eq!(request.oid, "");
        assert_eq!(request.community, "");

        let request = SnmpCommand::parse(b"{}").unwrap().into_request();
        assert_eq!(request.method, SnmpMethod::Unsupported(String::new()));
    }

    #[test]
    fn byte_order_mark_is_tolerated() {
        let mut body = b"\xEF\xBB\xBF".to_vec();
        body.extend_from_slice(get_body().as_bytes());
        assert!(SnmpCommand::parse(&body).is_ok());
    }

    #[test]
    fn malformed_bodies_are_errors() {
        assert!(SnmpCommand::parse(b"not json").is_err());
        assert!(SnmpCommand::parse(b"[1,2]").is_err());
        assert!(SnmpCommand::parse(&[0xff, 0xfe]).is_err());
    }

    #[tokio::test]
    async fn get_command_executes_sends_then_acks() {
        let journal = Journal::default();
        let executor = FakeExecutor::new(&journal).respond(Ok(reading()));
        let mut intake = build(&journal, executor, FakeSink::new(&journal), options());

        let handled = intake.handle(command("m-1", &get_body())).await;

        assert_eq!(handled, Handled::Completed);
        let calls = journal.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls[0],
            Call::Execute(QueryRequest::new(SnmpMethod::Get, "public", OID))
        );
        assert!(matches!(&calls[1], Call::Send(body) if body.contains(OID)));
        assert_eq!(calls[2], Call::Complete(Some("m-1".to_string())));
    }

    #[tokio::test]
    async fn message_without_properties_is_ignored() {
        let journal = Journal::default();
        let executor = FakeExecutor::new(&journal).respond(Ok(reading()));
        let mut intake = build(&journal, executor, FakeSink::new(&journal), options());

        let handled = intake.handle(plain("m-1", &get_body())).await;

        assert_eq!(handled, Handled::Ignored);
        assert!(journal.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_not_acked() {
        let journal = Journal::default();
        let mut intake = build(
            &journal,
            FakeExecutor::new(&journal),
            FakeSink::new(&journal),
            options(),
        );

        let handled = intake.handle(command("m-1", "{\"Method\":")).await;

        assert_eq!(handled, Handled::Rejected);
        assert!(journal.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_result_is_left_pending_unless_configured() {
        let journal = Journal::default();
        let mut intake = build(
            &journal,
            FakeExecutor::new(&journal),
            FakeSink::new(&journal),
            options(),
        );

        let handled = intake.handle(command("m-1", &get_body())).await;

        assert_eq!(handled, Handled::Empty { acked: false });
        assert_eq!(journal.executed().len(), 1);
        assert!(journal.sent().is_empty());
        assert!(journal.completed().is_empty());

        let journal = Journal::default();
        let mut intake = build(
            &journal,
            FakeExecutor::new(&journal),
            FakeSink::new(&journal),
            IntakeOptions {
                ack_empty_results: true,
                ..options()
            },
        );

        let handled = intake.handle(command("m-2", &get_body())).await;

        assert_eq!(handled, Handled::Empty { acked: true });
        assert!(journal.sent().is_empty());
        assert_eq!(journal.completed(), vec![Some("m-2".to_string())]);
    }

    #[tokio::test]
    async fn failed_send_or_query_is_not_acked() {
        let journal = Journal::default();
        let executor = FakeExecutor::new(&journal).respond(Ok(reading()));
        let mut intake = build(&journal, executor, FakeSink::new(&journal).failing(), options());

        assert_eq!(intake.handle(command("m-1", &get_body())).await, Handled::Failed);
        assert!(journal.completed().is_empty());

        let journal = Journal::default();
        let executor = FakeExecutor::new(&journal).respond(Err(QueryError::InvalidOid {
            oid: "abc".into(),
            reason: "not a number".into(),
        }));
        let mut intake = build(&journal, executor, FakeSink::new(&journal), options());

        assert_eq!(intake.handle(command("m-2", &get_body())).await, Handled::Failed);
        assert!(journal.completed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_survives_bad_messages_and_keeps_order() {
        let journal = Journal::default();
        let executor = FakeExecutor::new(&journal)
            .respond(Ok(reading()))
            .respond(Ok(reading()));
        let source = FakeSource::new(
            &journal,
            [
                command("m-1", &get_body()),
                command("m-2", "garbage"),
                plain("m-3", &get_body()),
                command("m-4", &get_body()),
            ],
        );
        let intake = CommandIntake::new(
            Arc::new(executor),
            Arc::new(FakeSink::new(&journal)),
            source,
            options(),
        );

        let cancel = CancellationToken::new();
        let task = tokio::spawn(intake.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        assert!(task.await.unwrap().is_ok());

        assert_eq!(journal.executed().len(), 2);
        assert_eq!(journal.sent().len(), 2);
        assert_eq!(
            journal.completed(),
            vec![Some("m-1".to_string()), Some("m-4".to_string())]
        );
    }
}
