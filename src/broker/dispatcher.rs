use std::sync::Arc;

use parking_lot::Mutex;
use rach_error::{AuthError, DispatchError, ErrorExt, LogLevel};
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use super::{
    ClientHandle, ClientRegistry, ClientSink, ClientSnapshot, LocalClient, LocalLoopback,
    RegistryStats,
};
use crate::{
    auth::{AuthPredicate, Credentials},
    identity::ClientId,
    protocol::{parse_request, Inbound, Request, ServerEnvelope},
    service::{ServiceContext, ServiceRegistry},
    topic::{TopicTree, TreeStats},
};

/// Адрес, под которым в реестре числится локальная петля.
const LOCAL_PEER: &str = "in-process";

/// Состояние, защищённое единственной блокировкой диспетчера.
#[derive(Default)]
pub struct BrokerState {
    pub tree: TopicTree,
    pub clients: ClientRegistry,
}

/// Сводка для диагностики.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerStats {
    pub tree: TreeStats,
    pub clients: RegistryStats,
}

struct Shared {
    state: Mutex<BrokerState>,
    services: ServiceRegistry,
    auth: Option<Arc<dyn AuthPredicate>>,
    loopback: Arc<LocalLoopback>,
}

/// Протокольный автомат брокера.
///
/// Разбирает входящие конверты, маршрутизирует их в дерево топиков или
/// реестр сервисов и рассылает ответы. Клонируется дёшево: все клоны
/// разделяют одно состояние.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Shared>,
}

#[derive(Default)]
pub struct DispatcherBuilder {
    services: ServiceRegistry,
    auth: Option<Arc<dyn AuthPredicate>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl DispatcherBuilder {
    pub fn services(
        mut self,
        services: ServiceRegistry,
    ) -> Self {
        self.services = services;
        self
    }

    pub fn auth<P: AuthPredicate>(
        mut self,
        predicate: P,
    ) -> Self {
        self.auth = Some(Arc::new(predicate));
        self
    }

    pub fn auth_arc(
        mut self,
        predicate: Arc<dyn AuthPredicate>,
    ) -> Self {
        self.auth = Some(predicate);
        self
    }

    pub fn build(self) -> Dispatcher {
        let loopback = Arc::new(LocalLoopback::new());
        let mut state = BrokerState::default();
        state
            .clients
            .register(ClientId::local(), loopback.clone(), LOCAL_PEER);

        if self.auth.is_none() {
            warn!("no authentication predicate configured, every connection will be refused");
        }

        Dispatcher {
            inner: Arc::new(Shared {
                state: Mutex::new(state),
                services: self.services,
                auth: self.auth,
                loopback,
            }),
        }
    }
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Аутентифицирует новое соединение и регистрирует его приёмник.
    ///
    /// Клиент получает `auth` в любом случае; при отказе приёмник не
    /// регистрируется и транспорт должен закрыть соединение.
    pub fn on_connect(
        &self,
        credentials: &Credentials,
        sink: Arc<dyn ClientSink>,
    ) -> Result<ClientId, AuthError> {
        let peer = credentials.peer().to_string();

        let verdict = match &self.inner.auth {
            None => Err(AuthError::PredicateMissing),
            Some(predicate) if predicate.authenticate(credentials) => Ok(()),
            Some(_) => Err(AuthError::Rejected { peer: peer.clone() }),
        };

        if let Err(err) = verdict {
            warn!(%peer, error = %err, "connection refused");
            if let Err(e) = sink.send(&ServerEnvelope::auth_rejected()) {
                debug!(%peer, error = %e, "failed to deliver auth rejection");
            }
            return Err(err);
        }

        let id = ClientId::generate();
        let handle = self
            .inner
            .state
            .lock()
            .clients
            .register(id.clone(), sink, peer.as_str());
        self.deliver(&handle, &ServerEnvelope::auth_accepted(id.as_str()));
        info!(client = %id, %peer, "client connected");
        Ok(id)
    }

    /// Обрабатывает одно входящее сообщение клиента `id`.
    ///
    /// Сообщения одного соединения обрабатываются строго последовательно:
    /// транспорт не вызывает `on_message` повторно, пока не завершится
    /// предыдущий вызов.
    pub async fn on_message(
        &self,
        id: &ClientId,
        raw: &str,
    ) {
        let Some(handle) = self.handle_of(id) else {
            debug!(client = %id, "message from unregistered client dropped");
            return;
        };
        handle.info.record_received();
        trace!(client = %id, raw, "inbound message");

        let reply = match parse_request(raw) {
            Ok(inbound) => self.dispatch(id, inbound).await,
            Err(rejection) => {
                log_error(id, &rejection.error);
                Some(ServerEnvelope::error(rejection.matcher, &rejection.error))
            }
        };

        if let Some(reply) = reply {
            self.deliver(&handle, &reply);
        }
    }

    /// Маршрутизирует проверенный запрос и возвращает ответ вызывающему.
    ///
    /// `pub` ответа не имеет (`None`). Используется и сетевыми, и локальным
    /// клиентом.
    pub async fn dispatch(
        &self,
        caller: &ClientId,
        inbound: Inbound,
    ) -> Option<ServerEnvelope> {
        let Inbound { matcher, request } = inbound;
        debug!(client = %caller, %matcher, kind = %request.kind(), topic = request.topic(), "routing request");

        match request {
            Request::Service { topic, args } => {
                Some(self.call_service(caller, matcher, topic, args).await)
            }
            Request::AddSub { topic } => {
                if !self.inner.state.lock().tree.subscribe(caller, &topic) {
                    trace!(client = %caller, %topic, "already subscribed");
                }
                Some(ServerEnvelope::ack(matcher, "Added subscription"))
            }
            Request::RmSub { topic } => {
                self.inner.state.lock().tree.unsubscribe(caller, &topic);
                Some(ServerEnvelope::ack(matcher, "Removed subscription"))
            }
            Request::AddPub { topic } => {
                self.inner.state.lock().tree.grant_publish(caller, &topic);
                Some(ServerEnvelope::ack(matcher, "Added publication"))
            }
            Request::RmPub { topic } => {
                self.inner.state.lock().tree.revoke_publish(caller, &topic);
                Some(ServerEnvelope::ack(matcher, "Removed publication"))
            }
            Request::Pub { topic, data } => {
                self.publish(caller, &topic, data);
                None
            }
        }
    }

    /// Снимает клиента: сначала чистит дерево, затем реестр.
    pub fn on_disconnect(
        &self,
        id: &ClientId,
    ) {
        if id.is_local() {
            return;
        }
        let (purged, removed) = {
            let mut state = self.inner.state.lock();
            let purged = state.tree.purge(id);
            (purged, state.clients.unregister(id))
        };

        match removed {
            Some(handle) => info!(
                client = %id,
                peer = %handle.info.peer,
                purged,
                received = handle.info.received(),
                sent = handle.info.sent(),
                "client disconnected"
            ),
            None => debug!(client = %id, "disconnect of unknown client"),
        }
    }

    /// Клиент процесса-хоста, работающий через ту же маршрутизацию.
    pub fn local(&self) -> LocalClient {
        LocalClient::new(self.clone(), self.inner.loopback.clone())
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.inner.services
    }

    pub fn client_count(&self) -> usize {
        self.inner.state.lock().clients.len()
    }

    pub fn is_connected(
        &self,
        id: &ClientId,
    ) -> bool {
        self.inner.state.lock().clients.contains(id)
    }

    pub fn stats(&self) -> BrokerStats {
        let state = self.inner.state.lock();
        BrokerStats {
            tree: state.tree.stats(),
            clients: state.clients.stats(),
        }
    }

    pub fn snapshots(&self) -> Vec<ClientSnapshot> {
        self.inner.state.lock().clients.snapshots()
    }

    /// Выполняет `f` под блокировкой состояния.
    pub fn with_state<R>(
        &self,
        f: impl FnOnce(&BrokerState) -> R,
    ) -> R {
        f(&self.inner.state.lock())
    }

    fn handle_of(
        &self,
        id: &ClientId,
    ) -> Option<ClientHandle> {
        self.inner.state.lock().clients.get(id).cloned()
    }

    async fn call_service(
        &self,
        caller: &ClientId,
        matcher: String,
        topic: String,
        args: Vec<Value>,
    ) -> ServerEnvelope {
        let Some(service) = self.inner.services.get(&topic) else {
            let err = DispatchError::ServiceUnavailable { topic };
            log_error(caller, &err);
            return ServerEnvelope::error(Some(matcher), &err);
        };

        let ctx = ServiceContext::new(caller.clone(), topic.as_str(), self.clone());

        match self.inner.services.invoke(service, ctx, args).await {
            Ok(result) => ServerEnvelope::service_result(matcher, result),
            Err(err) => {
                log_error(caller, &err);
                ServerEnvelope::error(Some(matcher), &err)
            }
        }
    }

    /// Рассылка по всем предкам `topic` включительно.
    ///
    /// Получатели собираются под блокировкой, отправка идёт после её
    /// снятия.
    pub(crate) fn publish(
        &self,
        publisher: &ClientId,
        topic: &str,
        data: Value,
    ) {
        let recipients = {
            let state = self.inner.state.lock();
            let mut out: Vec<(ClientHandle, String)> = Vec::new();
            state.tree.publish(topic, |path, id| match state.clients.get(id) {
                Some(handle) => out.push((handle.clone(), path.to_string())),
                None => trace!(client = %id, path, "subscriber without live handle skipped"),
            });
            out
        };

        debug!(client = %publisher, %topic, recipients = recipients.len(), "publish fan-out");

        for (handle, path) in recipients {
            let envelope = ServerEnvelope::publication(data.clone(), topic, &path);
            self.deliver(&handle, &envelope);
        }
    }

    /// Отправка без ожидания: ошибка только логируется.
    fn deliver(
        &self,
        handle: &ClientHandle,
        envelope: &ServerEnvelope,
    ) {
        match handle.sink.send(envelope) {
            Ok(()) => handle.info.record_sent(),
            Err(err) => {
                handle.info.record_send_failure();
                debug!(client = %handle.id, error = %err, "send failed, dropped");
            }
        }
    }
}

/// Логирует ошибку с уровнем, заданным её статус-кодом.
fn log_error(
    client: &ClientId,
    err: &dyn ErrorExt,
) {
    let code = err.status_code();
    let message = err.log_message();
    match code.log_level() {
        LogLevel::Trace => trace!(%client, %code, %message, "request failed"),
        LogLevel::Debug => debug!(%client, %code, %message, "request failed"),
        LogLevel::Info => info!(%client, %code, %message, "request failed"),
        LogLevel::Warn => warn!(%client, %code, %message, "request failed"),
        LogLevel::Error => error!(%client, %code, %message, "request failed"),
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
