use std::{sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::timeout,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};
use url::Url;

use super::{
    correlator::{Correlator, Routed},
    Publisher,
};
use crate::{
    error::{ClientError, ClientResult},
    identity::ClientId,
    protocol::{ClientEnvelope, Publication, RequestType, ServerEnvelope},
    topic::path::{normalize_namespace, resolve},
};

/// Параметры подключения клиента.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Базовый адрес сервера, например `ws://127.0.0.1:9000/`
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Сколько ждать ответа `auth` после установки соединения
    pub auth_timeout: Duration,
    /// Пространство имён для относительных топиков
    pub namespace: String,
}

/// Состояние соединения клиента.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Authenticated,
    Rejected,
}

struct Inner {
    correlator: Mutex<Correlator>,
    outbound: mpsc::UnboundedSender<Message>,
    state: watch::Sender<ConnectionState>,
    namespace: Mutex<String>,
    id: Mutex<Option<ClientId>>,
}

/// Сетевой клиент брокера.
///
/// Клонируется дёшево; все клоны разделяют одно соединение.
#[derive(Clone)]
pub struct RachClient {
    inner: Arc<Inner>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            auth_timeout: Duration::from_secs(5),
            namespace: "/".to_string(),
        }
    }

    pub fn credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// URL рукопожатия: `…?type=terminal&username=…&password=…`.
    pub fn handshake_url(&self) -> ClientResult<Url> {
        let mut url =
            Url::parse(&self.url).map_err(|e| ClientError::InvalidUrl(format!("{}: {e}", self.url)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("type", "terminal");
            if let Some(username) = &self.username {
                query.append_pair("username", username);
            }
            if let Some(password) = &self.password {
                query.append_pair("password", password);
            }
        }
        Ok(url)
    }
}

impl RachClient {
    /// Подключается и ждёт ответа `auth`.
    ///
    /// При отказе соединение сворачивается и возвращается
    /// [`ClientError::AuthenticationFailed`].
    pub async fn connect(config: ClientConfig) -> ClientResult<Self> {
        let url = config.handshake_url()?;
        let (state, _) = watch::channel(ConnectionState::Connecting);

        debug!(url = %config.url, "connecting");
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::ConnectionFailed(config.url.clone(), e.to_string()))?;
        state.send_replace(ConnectionState::Open);

        let (mut ws_tx, mut ws_rx) = ws.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

        let client = Self {
            inner: Arc::new(Inner {
                correlator: Mutex::new(Correlator::new()),
                outbound,
                state,
                namespace: Mutex::new(normalize_namespace(&config.namespace)),
                id: Mutex::new(None),
            }),
        };

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = ws_tx.send(message).await {
                    debug!(error = %e, "client write failed");
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = ws_tx.close().await;
        });

        let (auth_tx, auth_rx) = oneshot::channel();
        let reader = client.clone();
        tokio::spawn(async move {
            let mut auth_tx = Some(auth_tx);
            while let Some(frame) = ws_rx.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                reader.handle_frame(&text, &mut auth_tx);
            }
            reader.on_closed();
        });

        let verdict = timeout(config.auth_timeout, auth_rx)
            .await
            .map_err(|_| ClientError::AuthTimeout)?
            .map_err(|_| ClientError::ConnectionClosed)?;

        match verdict {
            Some(id) => {
                info!(client = %id, "authenticated");
                *client.inner.id.lock() = Some(id);
                client.inner.state.send_replace(ConnectionState::Authenticated);
                Ok(client)
            }
            None => {
                warn!(url = %config.url, "authentication rejected");
                client.inner.state.send_replace(ConnectionState::Rejected);
                client.teardown();
                Err(ClientError::AuthenticationFailed)
            }
        }
    }

    pub fn id(&self) -> Option<ClientId> {
        self.inner.id.lock().clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Подписка на изменения состояния соединения.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Пространство имён для относительных топиков; всегда оканчивается `/`.
    pub fn set_namespace(
        &self,
        namespace: &str,
    ) {
        *self.inner.namespace.lock() = normalize_namespace(namespace);
    }

    pub fn namespace(&self) -> String {
        self.inner.namespace.lock().clone()
    }

    /// Абсолютный канонический топик с учётом пространства имён.
    pub fn resolve_topic(
        &self,
        topic: &str,
    ) -> String {
        resolve(&self.inner.namespace.lock(), topic)
    }

    /// Подписывается на топик. Колбэк получает публикации этого топика и
    /// всех его потомков. Повторная подписка ничего не меняет.
    pub async fn subscribe<F>(
        &self,
        topic: &str,
        callback: F,
    ) -> ClientResult<()>
    where
        F: Fn(Publication) + Send + Sync + 'static,
    {
        let topic = self.resolve_topic(topic);
        if !self
            .inner
            .correlator
            .lock()
            .track_subscription(&topic, Arc::new(callback))
        {
            return Ok(());
        }
        let result = self.request(RequestType::AddSub, &topic).await;
        if result.is_err() {
            self.inner.correlator.lock().untrack_subscription(&topic);
        }
        result.map(drop)
    }

    pub async fn unsubscribe(
        &self,
        topic: &str,
    ) -> ClientResult<()> {
        let topic = self.resolve_topic(topic);
        if !self.inner.correlator.lock().is_subscribed(&topic) {
            debug!(%topic, "unsubscribe from untracked topic");
            return Ok(());
        }
        // колбэк снимает корреляция при подтверждении `rmSub`
        self.request(RequestType::RmSub, &topic).await.map(drop)
    }

    /// Заявляет право публикации и возвращает handle издателя.
    pub async fn add_publisher(
        &self,
        topic: &str,
    ) -> ClientResult<Publisher> {
        let topic = self.resolve_topic(topic);
        self.request(RequestType::AddPub, &topic).await?;
        Ok(Publisher::new(self.clone(), topic))
    }

    pub async fn remove_publisher(
        &self,
        topic: &str,
    ) -> ClientResult<()> {
        let topic = self.resolve_topic(topic);
        if !self.inner.correlator.lock().untrack_publication(&topic) {
            debug!(%topic, "remove_publisher for untracked topic");
            return Ok(());
        }
        self.request(RequestType::RmPub, &topic).await.map(drop)
    }

    /// Публикует без ожидания ответа. Топик должен быть заявлен через
    /// [`add_publisher`](Self::add_publisher).
    pub fn publish(
        &self,
        topic: &str,
        data: Value,
    ) -> ClientResult<()> {
        let topic = self.resolve_topic(topic);
        let matcher = {
            let mut correlator = self.inner.correlator.lock();
            if !correlator.is_publisher(&topic) {
                return Err(ClientError::NotPublisher(topic));
            }
            correlator.next_matcher()
        };
        self.send(&ClientEnvelope::new(
            matcher,
            RequestType::Pub,
            json!({ "topic": topic, "data": data }),
        ))
    }

    /// Вызывает сервис и возвращает его `result`.
    pub async fn call(
        &self,
        service: &str,
        args: Vec<Value>,
    ) -> ClientResult<Value> {
        let topic = self.resolve_topic(service);
        let data = json!({ "topic": topic, "args": args });
        self.send_request(RequestType::Service, data, None).await
    }

    /// Снимает все подписки и публикации без ожидания ответов и закрывает
    /// соединение.
    pub fn stop(&self) {
        self.teardown();
        self.inner
            .state
            .send_replace(ConnectionState::Disconnected);
    }

    async fn request(
        &self,
        kind: RequestType,
        topic: &str,
    ) -> ClientResult<Value> {
        self.send_request(kind, json!({ "topic": topic }), Some(topic.to_string()))
            .await
    }

    async fn send_request(
        &self,
        kind: RequestType,
        data: Value,
        topic: Option<String>,
    ) -> ClientResult<Value> {
        if self.state() != ConnectionState::Authenticated {
            return Err(ClientError::ConnectionClosed);
        }

        let (matcher, rx) = {
            let mut correlator = self.inner.correlator.lock();
            let matcher = correlator.next_matcher();
            let rx = correlator.register(matcher.clone(), kind, topic);
            (matcher, rx)
        };

        if let Err(e) = self.send(&ClientEnvelope::new(matcher.clone(), kind, data)) {
            self.inner.correlator.lock().cancel(&matcher);
            return Err(e);
        }
        rx.await.map_err(|_| ClientError::ConnectionClosed)?
    }

    fn send(
        &self,
        envelope: &ClientEnvelope,
    ) -> ClientResult<()> {
        let frame = envelope.to_json()?;
        trace!(%frame, "send");
        self.inner
            .outbound
            .send(Message::Text(frame))
            .map_err(|_| ClientError::ConnectionClosed)
    }

    /// `rmSub`/`rmPub` для всего отслеживаемого и закрытие сокета.
    fn teardown(&self) {
        let (subs, pubs) = self.inner.correlator.lock().drain_tracked();
        let requests = subs
            .iter()
            .map(|t| (RequestType::RmSub, t))
            .chain(pubs.iter().map(|t| (RequestType::RmPub, t)));

        for (kind, topic) in requests {
            let matcher = self.inner.correlator.lock().next_matcher();
            if self
                .send(&ClientEnvelope::topic(matcher, kind, topic))
                .is_err()
            {
                break;
            }
        }
        let _ = self.inner.outbound.send(Message::Close(None));
    }

    fn handle_frame(
        &self,
        text: &str,
        auth_tx: &mut Option<oneshot::Sender<Option<ClientId>>>,
    ) {
        let envelope: ServerEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "unparsable server frame");
                return;
            }
        };

        let routed = self.inner.correlator.lock().route(envelope);
        match routed {
            Routed::Auth(id) => match auth_tx.take() {
                Some(tx) => {
                    let _ = tx.send(id);
                }
                None => debug!("duplicate auth reply ignored"),
            },
            Routed::Deliver(callback, publication) => callback(publication),
            Routed::Resolved | Routed::Unmatched => {}
        }
    }

    fn on_closed(&self) {
        self.inner
            .correlator
            .lock()
            .fail_all(ClientError::ConnectionClosed);
        self.inner.state.send_if_modified(|state| {
            if *state == ConnectionState::Rejected {
                return false;
            }
            *state = ConnectionState::Disconnected;
            true
        });
        debug!("connection closed");
    }
}
