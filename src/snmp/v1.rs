use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use snmp2::{AsyncSession, Oid};
use tokio::time::timeout;
use tracing::{instrument, trace, warn};

use super::{QueryError, QueryExecutor, QueryRequest, ResultEntry, SnmpMethod, SnmpValue, parse_oid};

/// SNMPv1 `noSuchName`, им же агенты сообщают о конце MIB при обходе.
const ERROR_STATUS_NO_SUCH_NAME: u32 = 2;

/// SNMPv1 сессия к одному агенту с одним community.
pub struct SnmpClientV1 {
    // Буферы сессии большие, держим их в куче
    session: Box<AsyncSession>,
}

impl SnmpClientV1 {
    pub async fn new(target: SocketAddr, community: &[u8], request_id: i32) -> Result<Self, QueryError> {
        let session = AsyncSession::new_v1(target, community, request_id)
            .await
            .map_err(|source| QueryError::Session {
                target: target.to_string(),
                source,
            })?;

        Ok(Self {
            session: Box::new(session),
        })
    }

    /// GET одного OID. Исключения и `noSuchName` дают `None`.
    pub async fn get(&mut self, oid: &Oid<'_>) -> Result<Option<ResultEntry>, QueryError> {
        let resp = self
            .session
            .get(oid)
            .await
            .map_err(|e| request_failed("GET", oid, e))?;

        match resp.error_status {
            0 => {}
            ERROR_STATUS_NO_SUCH_NAME => return Ok(None),
            status => return Err(request_failed("GET", oid, format!("error status {}", status))),
        }

        let entry = resp
            .varbinds
            .into_iter()
            .next()
            .and_then(|(id, value)| SnmpValue::from_snmp(&value).map(|v| ResultEntry::new(id.to_string(), v)));

        Ok(entry.filter(|e| !e.value.is_exception()))
    }

    /// Обход поддерева `root` через GETNEXT, в порядке ответов агента.
    pub async fn walk(&mut self, root: &Oid<'_>) -> Result<Vec<ResultEntry>, QueryError> {
        let mut results = Vec::new();
        let mut current = root.to_owned();

        loop {
            let (next_oid, value) = {
                let resp = self
                    .session
                    .getnext(&current)
                    .await
                    .map_err(|e| request_failed("GETNEXT", &current, e))?;

                match resp.error_status {
                    0 => {}
                    ERROR_STATUS_NO_SUCH_NAME => break,
                    status => {
                        return Err(request_failed(
                            "GETNEXT",
                            &current,
                            format!("error status {}", status),
                        ));
                    }
                }

                match resp.varbinds.into_iter().next() {
                    Some((oid, value)) => (oid.to_owned(), SnmpValue::from_snmp(&value)),
                    None => break,
                }
            };

            // Вышли из поддерева или агент не продвигается вперёд
            if !next_oid.starts_with(root) || !follows(&next_oid, &current) {
                break;
            }

            match value {
                Some(value) if value.is_exception() => break,
                Some(value) => {
                    trace!(oid = %next_oid, %value, "walk step");
                    results.push(ResultEntry::new(next_oid.to_string(), value));
                }
                None => warn!(oid = %next_oid, "skipping value of unsupported type"),
            }

            current = next_oid;
        }

        Ok(results)
    }
}

/// `next` строго больше `current` при сравнении по дугам.
fn follows(next: &Oid<'_>, current: &Oid<'_>) -> bool {
    match (next.iter(), current.iter()) {
        (Some(next), Some(current)) => next.gt(current),
        // Дуги не влезают в u64, остаётся только проверка на повтор
        _ => next != current,
    }
}

fn request_failed(operation: &'static str, oid: &Oid<'_>, reason: impl Display) -> QueryError {
    QueryError::Request {
        operation,
        oid: oid.to_string(),
        reason: reason.to_string(),
    }
}

/// Выполняет запросы к настроенному агенту по SNMPv1.
///
/// На каждый вызов открывается новая сессия: community приходит вместе с запросом.
pub struct SnmpExecutor {
    target: SocketAddr,
    timeout: Duration,
    strict_methods: bool,
    next_request_id: AtomicI32,
}

impl SnmpExecutor {
    pub fn new(target: SocketAddr, timeout: Duration) -> Self {
        Self {
            target,
            timeout,
            strict_methods: false,
            next_request_id: AtomicI32::new(1),
        }
    }

    /// Отклонять неизвестные методы вместо пустого ответа.
    pub fn with_strict_methods(mut self, strict: bool) -> Self {
        self.strict_methods = strict;
        self
    }

    fn request_id(&self) -> i32 {
        // Разносим id сессий, чтобы поздний ответ на просроченный запрос не приняли за свой
        self.next_request_id.fetch_add(1000, Ordering::Relaxed)
    }

    async fn run(&self, request: &QueryRequest, oid: &Oid<'_>) -> Result<Vec<ResultEntry>, QueryError> {
        let mut client =
            SnmpClientV1::new(self.target, request.community.as_bytes(), self.request_id()).await?;

        match request.method {
            SnmpMethod::Walk => client.walk(oid).await,
            _ => Ok(client.get(oid).await?.into_iter().collect()),
        }
    }
}

#[async_trait]
impl QueryExecutor for SnmpExecutor {
    #[instrument(name = "snmp", skip_all, fields(target = %self.target, method = %request.method, oid = %request.oid))]
    async fn execute(&self, request: &QueryRequest) -> Result<Vec<ResultEntry>, QueryError> {
        let operation = match &request.method {
            SnmpMethod::Get => "GET",
            SnmpMethod::Walk => "WALK",
            SnmpMethod::Unsupported(name) => {
                if self.strict_methods {
                    return Err(QueryError::UnsupportedMethod(name.clone()));
                }
                warn!("unsupported SNMP method, answering with no results");
                return Ok(Vec::new());
            }
        };

        let oid = parse_oid(&request.oid)?;

        // Future с сессией внутри слишком велик для стека
        match timeout(self.timeout, Box::pin(self.run(request, &oid))).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::Timeout {
                operation,
                oid: request.oid.clone(),
                timeout: self.timeout,
            }),
        }
    }
}
