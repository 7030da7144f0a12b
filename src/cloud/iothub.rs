use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, Publish, QoS, TlsConfiguration,
    Transport,
};
use rustls::{ClientConfig, RootCertStore};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use super::sas::generate_sas_token;
use super::topic::{devicebound_filter, devicebound_prefix, events_topic, parse_property_bag};
use super::{CommandSource, EventSink, InboundMessage, IotHubConnection, TransportError};

const MQTT_TLS_PORT: u16 = 8883;
const KEEP_ALIVE: Duration = Duration::from_secs(60);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const REQUEST_CAPACITY: usize = 32;

/// Параметры подключения к IoT Hub.
#[derive(Debug, Clone)]
pub struct IotHubOptions {
    /// Время жизни SAS-токена; при каждом переподключении выпускается новый.
    pub token_ttl: Duration,
    /// Сколько `send_event` ждёт PUBACK от хаба.
    pub send_timeout: Duration,
}

impl Default for IotHubOptions {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(3600),
            send_timeout: Duration::from_secs(60),
        }
    }
}

type Waiters = Arc<Mutex<VecDeque<oneshot::Sender<()>>>>;

fn lock(waiters: &Waiters) -> std::sync::MutexGuard<'_, VecDeque<oneshot::Sender<()>>> {
    waiters.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Сопоставляет исходящие публикации с PUBACK от хаба.
///
/// rumqttc отправляет запросы в порядке очереди, поэтому n-й новый pkid
/// принадлежит n-му ожидающему. pkid, который уже в полёте, это повтор
/// после переподключения, ожидающего он не забирает.
struct PublishAcks {
    queued: Waiters,
    inflight: HashMap<u16, oneshot::Sender<()>>,
}

impl PublishAcks {
    fn new(queued: Waiters) -> Self {
        Self {
            queued,
            inflight: HashMap::new(),
        }
    }

    fn published(&mut self, pkid: u16) {
        if self.inflight.contains_key(&pkid) {
            trace!(pkid, "retransmitted publish");
            return;
        }
        match lock(&self.queued).pop_front() {
            Some(waiter) => {
                self.inflight.insert(pkid, waiter);
            }
            None => debug!(pkid, "publish without a waiting sender"),
        }
    }

    fn acked(&mut self, pkid: u16) {
        if let Some(waiter) = self.inflight.remove(&pkid) {
            // отправитель мог уже сдаться по таймауту
            let _ = waiter.send(());
        }
    }
}

/// Отправляющая половина: события device-to-cloud.
#[derive(Clone)]
pub struct IotHubSender {
    client: AsyncClient,
    topic: String,
    waiters: Waiters,
    // порядок ожидающих = порядок запросов
    order: Arc<tokio::sync::Mutex<()>>,
    send_timeout: Duration,
}

/// Принимающая половина: C2D-сообщения, которые доставляет драйвер.
pub struct IotHubReceiver {
    client: AsyncClient,
    inbound: mpsc::UnboundedReceiver<Publish>,
    connected: watch::Receiver<bool>,
    prefix: String,
}

/// Владеет циклом событий MQTT. Без него ни одна половина не работает.
pub struct IotHubDriver {
    eventloop: EventLoop,
    client: AsyncClient,
    // IoT Hub держит не больше 50 неподтверждённых C2D на устройство
    inbound: mpsc::UnboundedSender<Publish>,
    connected: watch::Sender<bool>,
    acks: PublishAcks,
    connection: IotHubConnection,
    options: IotHubOptions,
}

/// Создаёт единственное соединение устройства и делит его на две половины и драйвер.
///
/// IoT Hub допускает одно соединение на устройство, оба направления идут через него.
pub fn connect(
    connection: &IotHubConnection,
    options: IotHubOptions,
) -> Result<(IotHubSender, IotHubReceiver, IotHubDriver), TransportError> {
    let token = fresh_token(connection, &options)?;

    let mut mqtt_options = MqttOptions::new(
        connection.device_id.clone(),
        connection.broker_host(),
        MQTT_TLS_PORT,
    );
    mqtt_options
        .set_keep_alive(KEEP_ALIVE)
        .set_credentials(connection.mqtt_username(), token)
        .set_clean_session(false)
        .set_manual_acks(true)
        .set_transport(tls_transport());

    let (client, eventloop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (connected_tx, connected_rx) = watch::channel(false);
    let waiters = Waiters::default();

    let sender = IotHubSender {
        client: client.clone(),
        topic: events_topic(&connection.device_id),
        waiters: waiters.clone(),
        order: Arc::new(tokio::sync::Mutex::new(())),
        send_timeout: options.send_timeout,
    };
    let receiver = IotHubReceiver {
        client: client.clone(),
        inbound: inbound_rx,
        connected: connected_rx,
        prefix: devicebound_prefix(&connection.device_id),
    };
    let driver = IotHubDriver {
        eventloop,
        client,
        inbound: inbound_tx,
        connected: connected_tx,
        acks: PublishAcks::new(waiters),
        connection: connection.clone(),
        options,
    };

    Ok((sender, receiver, driver))
}

fn tls_transport() -> Transport {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    Transport::tls_with_config(TlsConfiguration::Rustls(Arc::new(config)))
}

fn fresh_token(connection: &IotHubConnection, options: &IotHubOptions) -> Result<String, TransportError> {
    let ttl = i64::try_from(options.token_ttl.as_secs()).unwrap_or(i64::MAX / 2);
    let expiry = chrono::Utc::now().timestamp().saturating_add(ttl);
    generate_sas_token(&connection.resource_uri(), &connection.shared_access_key, expiry)
}

impl IotHubDriver {
    /// Крутит цикл событий MQTT до отмены, переподключаясь при ошибках.
    #[instrument(name = "iothub", skip_all, fields(device = %self.connection.device_id))]
    pub async fn run(mut self, cancel: CancellationToken) {
        let filter = devicebound_filter(&self.connection.device_id);

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = self.eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!(code = ?ack.code, "connected to IoT Hub");
                    self.connected.send_replace(true);
                    // Запрос встаёт в очередь, цикл не блокируется
                    if let Err(e) = self.client.try_subscribe(filter.as_str(), QoS::AtLeastOnce) {
                        warn!(error = %e, "could not subscribe to cloud-to-device messages");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    trace!(topic = %publish.topic, "inbound publish");
                    self.deliver(publish);
                }
                Ok(Event::Outgoing(Outgoing::Publish(pkid))) => self.acks.published(pkid),
                Ok(Event::Incoming(Packet::PubAck(ack))) => self.acks.acked(ack.pkid),
                Ok(event) => trace!(?event, "mqtt event"),
                Err(e) => {
                    self.connected.send_replace(false);
                    warn!(error = %e, "IoT Hub connection lost, reconnecting in {:?}", RECONNECT_DELAY);

                    // TODO: экспоненциальная задержка при повторных ошибках подключения
                    match fresh_token(&self.connection, &self.options) {
                        Ok(token) => {
                            self.eventloop
                                .mqtt_options
                                .set_credentials(self.connection.mqtt_username(), token);
                        }
                        Err(e) => warn!(error = %e, "could not refresh SAS token"),
                    }

                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }

        self.connected.send_replace(false);
        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "disconnect request not queued");
        }
        info!("IoT Hub driver stopped");
    }

    // Не ждёт получателя: цикл событий должен продолжать крутиться
    fn deliver(&self, publish: Publish) {
        if self.inbound.send(publish).is_err() {
            debug!("command receiver dropped, discarding inbound message");
        }
    }
}

#[async_trait]
impl EventSink for IotHubSender {
    /// Завершается, только когда IoT Hub подтвердил событие.
    async fn send_event(&self, payload: String) -> Result<(), TransportError> {
        let (waiter, acked) = oneshot::channel();

        {
            let _order = self.order.lock().await;
            lock(&self.waiters).push_back(waiter);

            if let Err(e) = self
                .client
                .publish(self.topic.as_str(), QoS::AtLeastOnce, false, payload.into_bytes())
                .await
            {
                lock(&self.waiters).pop_back();
                return Err(TransportError::Send(e.to_string()));
            }
        }

        match timeout(self.send_timeout, acked).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(TransportError::Send(
                "connection closed before IoT Hub acknowledged the event".to_string(),
            )),
            Err(_) => Err(TransportError::Send(format!(
                "no acknowledgement from IoT Hub within {:?}",
                self.send_timeout
            ))),
        }
    }
}

#[async_trait]
impl CommandSource for IotHubReceiver {
    async fn open(&mut self) -> Result<(), TransportError> {
        self.connected
            .wait_for(|connected| *connected)
            .await
            .map(|_| ())
            .map_err(|_| TransportError::Closed)
    }

    async fn receive(&mut self) -> Result<Option<InboundMessage>, TransportError> {
        loop {
            let publish = self.inbound.recv().await.ok_or(TransportError::Closed)?;

            match to_inbound_message(&self.prefix, publish) {
                Some(message) => return Ok(Some(message)),
                None => continue,
            }
        }
    }

    async fn complete(&mut self, message: &InboundMessage) -> Result<(), TransportError> {
        let publish = message
            .publish
            .as_ref()
            .ok_or_else(|| TransportError::Ack("message has no delivery receipt".to_string()))?;

        self.client
            .ack(publish)
            .await
            .map_err(|e| TransportError::Ack(e.to_string()))
    }
}

fn to_inbound_message(prefix: &str, publish: Publish) -> Option<InboundMessage> {
    let Some(bag) = publish.topic.strip_prefix(prefix) else {
        debug!(topic = %publish.topic, "ignoring publish outside the cloud-to-device topic");
        return None;
    };

    let (properties, system_properties) = parse_property_bag(bag);
    Some(InboundMessage {
        body: publish.payload.to_vec(),
        properties,
        system_properties,
        publish: Some(publish),
    })
}
