use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use dashmap::{mapref::entry::Entry, DashMap, DashSet};
use rach_error::SendError;
use serde_json::Value;
use tracing::{debug, trace};

use super::{ClientSink, Dispatcher};
use crate::{
    error::{ClientError, ClientResult},
    identity::ClientId,
    protocol::{Inbound, Publication, ReplyType, Request, ServerEnvelope},
    topic::normalize,
};

pub type LocalCallback = Arc<dyn Fn(Publication) + Send + Sync>;

/// Приёмник локальной петли: раздаёт `pub`-конверты по таблице
/// топик → колбэк.
#[derive(Default)]
pub struct LocalLoopback {
    subscriptions: DashMap<String, LocalCallback>,
}

/// Клиент процесса-хоста с идентификатором `local`.
///
/// Запросы проходят через [`Dispatcher::dispatch`], как и сетевые.
#[derive(Clone)]
pub struct LocalClient {
    id: ClientId,
    dispatcher: Dispatcher,
    loopback: Arc<LocalLoopback>,
    publications: Arc<DashSet<String>>,
    counter: Arc<AtomicU64>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl LocalLoopback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Вставляет колбэк, если топик ещё не отслеживается.
    fn track(
        &self,
        topic: String,
        callback: LocalCallback,
    ) -> bool {
        match self.subscriptions.entry(topic) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(callback);
                true
            }
        }
    }

    fn untrack(
        &self,
        topic: &str,
    ) -> bool {
        self.subscriptions.remove(topic).is_some()
    }

    pub fn is_tracked(
        &self,
        topic: &str,
    ) -> bool {
        self.subscriptions.contains_key(topic)
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl LocalClient {
    pub(crate) fn new(
        dispatcher: Dispatcher,
        loopback: Arc<LocalLoopback>,
    ) -> Self {
        Self {
            id: ClientId::local(),
            dispatcher,
            loopback,
            publications: Arc::new(DashSet::new()),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Подписка с колбэком. Повторная подписка на тот же топик ничего не
    /// меняет: остаётся первый колбэк.
    pub async fn subscribe<F>(
        &self,
        topic: &str,
        callback: F,
    ) -> ClientResult<()>
    where
        F: Fn(Publication) + Send + Sync + 'static,
    {
        let topic = normalize(topic);
        if !self.loopback.track(topic.clone(), Arc::new(callback)) {
            debug!(%topic, "local subscription already tracked");
            return Ok(());
        }
        let result = self.request(Request::AddSub { topic: topic.clone() }).await;
        if result.is_err() {
            self.loopback.untrack(&topic);
        }
        result.map(drop)
    }

    pub async fn unsubscribe(
        &self,
        topic: &str,
    ) -> ClientResult<()> {
        let topic = normalize(topic);
        if !self.loopback.is_tracked(&topic) {
            debug!(%topic, "local subscription not tracked");
            return Ok(());
        }
        self.request(Request::RmSub {
            topic: topic.clone(),
        })
        .await?;
        self.loopback.untrack(&topic);
        Ok(())
    }

    pub async fn add_publisher(
        &self,
        topic: &str,
    ) -> ClientResult<()> {
        let topic = normalize(topic);
        self.request(Request::AddPub {
            topic: topic.clone(),
        })
        .await?;
        self.publications.insert(topic);
        Ok(())
    }

    pub async fn remove_publisher(
        &self,
        topic: &str,
    ) -> ClientResult<()> {
        let topic = normalize(topic);
        if self.publications.remove(&topic).is_none() {
            debug!(%topic, "local publication not tracked");
            return Ok(());
        }
        self.request(Request::RmPub { topic }).await.map(drop)
    }

    /// Публикует в топик, предварительно заявленный через
    /// [`add_publisher`](Self::add_publisher).
    pub async fn publish(
        &self,
        topic: &str,
        data: Value,
    ) -> ClientResult<()> {
        let topic = normalize(topic);
        if !self.publications.contains(&topic) {
            return Err(ClientError::NotPublisher(topic));
        }
        self.request(Request::Pub { topic, data }).await.map(drop)
    }

    pub async fn call(
        &self,
        service: &str,
        args: Vec<Value>,
    ) -> ClientResult<Value> {
        let reply = self
            .request(Request::Service {
                topic: normalize(service),
                args,
            })
            .await?;
        reply
            .and_then(|env| env.data)
            .and_then(|mut data| data.get_mut("result").map(Value::take))
            .ok_or(ClientError::UnexpectedResponse)
    }

    /// Отправляет запрос в диспетчер и переводит `err` в ошибку.
    async fn request(
        &self,
        request: Request,
    ) -> ClientResult<Option<ServerEnvelope>> {
        let matcher = (self.counter.fetch_add(1, Ordering::Relaxed) + 1).to_string();
        let reply = self
            .dispatcher
            .dispatch(&self.id, Inbound { matcher, request })
            .await;

        match reply {
            Some(env) if env.kind == ReplyType::Err => Err(ClientError::ServerError(
                env.verbose.unwrap_or_default(),
            )),
            other => Ok(other),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl ClientSink for LocalLoopback {
    fn send(
        &self,
        envelope: &ServerEnvelope,
    ) -> Result<(), SendError> {
        let Some(publication) = envelope.as_publication() else {
            trace!(kind = ?envelope.kind, "loopback ignores non-pub envelope");
            return Ok(());
        };

        // Колбэк вызывается без удержания блокировки шарда.
        let callback = self
            .subscriptions
            .get(&publication.topic)
            .map(|entry| entry.value().clone());
        match callback {
            Some(callback) => callback(publication),
            None => trace!(topic = %publication.topic, "no local callback for topic"),
        }
        Ok(())
    }
}

impl fmt::Debug for LocalLoopback {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("LocalLoopback")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
