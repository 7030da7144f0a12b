//! Подделки SNMP-агента и облака в памяти для тестов циклов.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::cloud::{CommandSource, EventSink, InboundMessage, Properties, TransportError};
use crate::snmp::{QueryError, QueryExecutor, QueryRequest, ResultEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Execute(QueryRequest),
    Send(String),
    Complete(Option<String>),
}

/// Общий упорядоченный журнал всех побочных эффектов.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    pub fn record(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn executed(&self) -> Vec<QueryRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Execute(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn sent(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn completed(&self) -> Vec<Option<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Complete(id) => Some(id),
                _ => None,
            })
            .collect()
    }
}

/// Отвечает заготовками из очереди; когда они кончились, пустым результатом.
pub struct FakeExecutor {
    journal: Journal,
    responses: Mutex<VecDeque<Result<Vec<ResultEntry>, QueryError>>>,
    delay: Duration,
}

impl FakeExecutor {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            responses: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn respond(self, response: Result<Vec<ResultEntry>, QueryError>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn taking(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl QueryExecutor for FakeExecutor {
    async fn execute(&self, request: &QueryRequest) -> Result<Vec<ResultEntry>, QueryError> {
        self.journal.record(Call::Execute(request.clone()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub struct FakeSink {
    journal: Journal,
    fail: bool,
}

impl FakeSink {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            fail: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

#[async_trait]
impl EventSink for FakeSink {
    async fn send_event(&self, payload: String) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::Send("link down".to_string()));
        }
        self.journal.record(Call::Send(payload));
        Ok(())
    }
}

/// Отдаёт сообщения из очереди, потом сообщает, что ничего нет.
pub struct FakeSource {
    journal: Journal,
    pending: VecDeque<InboundMessage>,
    pub opened: bool,
}

impl FakeSource {
    pub fn new(journal: &Journal, messages: impl IntoIterator<Item = InboundMessage>) -> Self {
        Self {
            journal: journal.clone(),
            pending: messages.into_iter().collect(),
            opened: false,
        }
    }
}

#[async_trait]
impl CommandSource for FakeSource {
    async fn open(&mut self) -> Result<(), TransportError> {
        self.opened = true;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<InboundMessage>, TransportError> {
        Ok(self.pending.pop_front())
    }

    async fn complete(&mut self, message: &InboundMessage) -> Result<(), TransportError> {
        self.journal
            .record(Call::Complete(message.message_id().map(str::to_string)));
        Ok(())
    }
}

/// C2D-сообщение с одним свойством приложения.
pub fn command(id: &str, body: &str) -> InboundMessage {
    let properties = Properties::from([("command".to_string(), "snmp".to_string())]);
    InboundMessage::new(body, properties).with_system_property("$.mid", id)
}

/// Сообщение без свойств приложения.
pub fn plain(id: &str, body: &str) -> InboundMessage {
    InboundMessage::new(body, Properties::new()).with_system_property("$.mid", id)
}
