use std::{
    any::Any, collections::HashMap, fmt, future::Future, panic::AssertUnwindSafe, sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use futures_util::FutureExt;
use rach_error::ServiceError;
use serde_json::Value;
use tracing::error;

use crate::{
    broker::{ClientSnapshot, Dispatcher, LocalClient},
    identity::ClientId,
    topic::normalize,
};

/// Удалённая процедура.
///
/// Число и типы позиционных аргументов задаёт конкретный сервис.
/// Каждый вызов даёт ровно один результат. Паника обработчика
/// превращается в [`ServiceError::Failed`].
#[async_trait]
pub trait Service: Send + Sync + 'static {
    async fn call(
        &self,
        ctx: ServiceContext,
        args: Vec<Value>,
    ) -> Result<Value, ServiceError>;
}

/// Контекст одного вызова: кто вызвал, какой топик и диспетчер, через
/// который сервис может публиковать и смотреть на клиентов.
#[derive(Clone)]
pub struct ServiceContext {
    pub caller: ClientId,
    pub topic: String,
    dispatcher: Dispatcher,
}

/// Неизменяемое отображение топик → сервис, собранное один раз при
/// создании брокера.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: Arc<HashMap<String, Arc<dyn Service>>>,
    timeout: Option<Duration>,
}

#[derive(Default)]
pub struct ServiceRegistryBuilder {
    services: HashMap<String, Arc<dyn Service>>,
    timeout: Option<Duration>,
}

/// Адаптер асинхронного замыкания к [`Service`].
struct FnService<F>(F);

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ServiceContext {
    pub fn new(
        caller: ClientId,
        topic: impl Into<String>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            caller,
            topic: topic.into(),
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Клиент процесса-хоста для запросов из обработчика.
    pub fn local(&self) -> LocalClient {
        self.dispatcher.local()
    }

    pub fn clients(&self) -> Vec<ClientSnapshot> {
        self.dispatcher.snapshots()
    }

    /// Рассылает `data` подписчикам `topic` и его предков от имени
    /// локальной петли.
    pub fn publish(
        &self,
        topic: &str,
        data: Value,
    ) {
        self.dispatcher.publish(&ClientId::local(), &normalize(topic), data);
    }
}

impl ServiceRegistry {
    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::default()
    }

    /// Точный поиск по канонической форме топика.
    pub fn get(
        &self,
        topic: &str,
    ) -> Option<Arc<dyn Service>> {
        self.services.get(&normalize(topic)).cloned()
    }

    pub fn contains(
        &self,
        topic: &str,
    ) -> bool {
        self.services.contains_key(&normalize(topic))
    }

    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<_> = self.services.keys().cloned().collect();
        topics.sort();
        topics
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Вызывает сервис с учётом настроенного таймаута.
    ///
    /// Без таймаута зависший обработчик задерживает только своё соединение.
    pub async fn invoke(
        &self,
        service: Arc<dyn Service>,
        ctx: ServiceContext,
        args: Vec<Value>,
    ) -> Result<Value, ServiceError> {
        let topic = ctx.topic.clone();
        let guarded = async move {
            AssertUnwindSafe(service.call(ctx, args))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    let reason = panic_message(payload.as_ref());
                    error!(%topic, reason, "service handler panicked");
                    Err(ServiceError::failed("handler panicked"))
                })
        };

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, guarded)
                .await
                .unwrap_or(Err(ServiceError::Timeout)),
            None => guarded.await,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

impl ServiceRegistryBuilder {
    /// Регистрирует сервис. Повторная регистрация того же топика заменяет
    /// предыдущий.
    pub fn register<S: Service>(
        mut self,
        topic: &str,
        service: S,
    ) -> Self {
        self.services.insert(normalize(topic), Arc::new(service));
        self
    }

    /// Регистрирует асинхронное замыкание как сервис.
    pub fn register_fn<F, Fut>(
        self,
        topic: &str,
        f: F,
    ) -> Self
    where
        F: Fn(ServiceContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ServiceError>> + Send + 'static,
    {
        self.register(topic, FnService(f))
    }

    pub fn timeout(
        mut self,
        timeout: Option<Duration>,
    ) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> ServiceRegistry {
        ServiceRegistry {
            services: Arc::new(self.services),
            timeout: self.timeout,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

#[async_trait]
impl<F, Fut> Service for FnService<F>
where
    F: Fn(ServiceContext, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ServiceError>> + Send + 'static,
{
    async fn call(
        &self,
        ctx: ServiceContext,
        args: Vec<Value>,
    ) -> Result<Value, ServiceError> {
        (self.0)(ctx, args).await
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("topics", &self.topics())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl fmt::Debug for ServiceContext {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ServiceContext")
            .field("caller", &self.caller)
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
