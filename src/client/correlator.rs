use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::Arc,
};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::{
    error::{ClientError, ClientResult},
    identity::ClientId,
    protocol::{Publication, ReplyType, RequestType, ServerEnvelope},
};

/// Колбэк подписки клиента.
pub type SubscriptionCallback = Arc<dyn Fn(Publication) + Send + Sync>;

/// Ожидающий ответа запрос.
struct Pending {
    kind: RequestType,
    topic: Option<String>,
    reply: oneshot::Sender<ClientResult<Value>>,
}

/// Куда направить входящий конверт после разбора.
pub enum Routed {
    /// Ответ на рукопожатие
    Auth(Option<ClientId>),
    /// Публикация и колбэк её топика; колбэк вызывается вне блокировки
    Deliver(SubscriptionCallback, Publication),
    /// Ожидающий запрос завершён
    Resolved,
    /// Конверт не относится ни к одному ожидающему запросу или подписке
    Unmatched,
}

/// Клиентская сторона корреляции запросов и ответов.
///
/// Держит счётчик `matcher`, таблицу ожидающих запросов и таблицу
/// подписок (одна запись на топик). Не выполняет ввод-вывод: соединение
/// кладёт сюда запросы перед отправкой и передаёт входящие конверты в
/// [`route`](Self::route).
#[derive(Default)]
pub struct Correlator {
    counter: u64,
    pending: HashMap<String, Pending>,
    subscriptions: HashMap<String, SubscriptionCallback>,
    publications: HashSet<String>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Следующий `matcher`: десятичная строка монотонного счётчика.
    pub fn next_matcher(&mut self) -> String {
        self.counter += 1;
        self.counter.to_string()
    }

    /// Регистрирует запрос до его отправки.
    ///
    /// `topic` нужен для побочных эффектов ответа: успешный `addPub`
    /// заносит топик в таблицу публикаций, отказ на `addSub` убирает
    /// подписку.
    pub fn register(
        &mut self,
        matcher: String,
        kind: RequestType,
        topic: Option<String>,
    ) -> oneshot::Receiver<ClientResult<Value>> {
        let (reply, rx) = oneshot::channel();
        self.pending.insert(matcher, Pending { kind, topic, reply });
        rx
    }

    /// Забывает запрос, который так и не был отправлен.
    pub fn cancel(
        &mut self,
        matcher: &str,
    ) -> bool {
        self.pending.remove(matcher).is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Заносит колбэк подписки. Если топик уже отслеживается, запись не
    /// меняется и возвращается `false`.
    pub fn track_subscription(
        &mut self,
        topic: &str,
        callback: SubscriptionCallback,
    ) -> bool {
        if self.subscriptions.contains_key(topic) {
            debug!(%topic, "subscription already tracked, keeping original callback");
            return false;
        }
        self.subscriptions.insert(topic.to_string(), callback);
        true
    }

    pub fn untrack_subscription(
        &mut self,
        topic: &str,
    ) -> bool {
        self.subscriptions.remove(topic).is_some()
    }

    pub fn is_subscribed(
        &self,
        topic: &str,
    ) -> bool {
        self.subscriptions.contains_key(topic)
    }

    pub fn is_publisher(
        &self,
        topic: &str,
    ) -> bool {
        self.publications.contains(topic)
    }

    pub fn untrack_publication(
        &mut self,
        topic: &str,
    ) -> bool {
        self.publications.remove(topic)
    }

    /// Забирает все отслеживаемые подписки и публикации для сворачивания
    /// соединения.
    pub fn drain_tracked(&mut self) -> (Vec<String>, Vec<String>) {
        let mut subs: Vec<String> = self.subscriptions.drain().map(|(t, _)| t).collect();
        let mut pubs: Vec<String> = self.publications.drain().collect();
        subs.sort();
        pubs.sort();
        (subs, pubs)
    }

    /// Завершает все ожидающие запросы ошибкой (соединение потеряно).
    pub fn fail_all(
        &mut self,
        error: ClientError,
    ) {
        for (_, pending) in self.pending.drain() {
            let _ = pending.reply.send(Err(error.clone()));
        }
    }

    /// Разбирает входящий конверт.
    pub fn route(
        &mut self,
        envelope: ServerEnvelope,
    ) -> Routed {
        match envelope.kind {
            ReplyType::Auth => {
                let accepted = envelope
                    .data_field("success")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let id = envelope
                    .data_field("id")
                    .and_then(Value::as_str)
                    .filter(|_| accepted)
                    .map(ClientId::from);
                Routed::Auth(id)
            }
            ReplyType::Pub => self.route_publication(&envelope),
            ReplyType::Ack | ReplyType::Service => {
                let Some(pending) = self.take_pending(&envelope) else {
                    return Routed::Unmatched;
                };
                self.apply_success(&pending);
                let result = match envelope.kind {
                    ReplyType::Service => envelope
                        .data
                        .and_then(|mut data| data.get_mut("result").map(Value::take))
                        .ok_or(ClientError::UnexpectedResponse),
                    _ => Ok(Value::Null),
                };
                let _ = pending.reply.send(result);
                Routed::Resolved
            }
            ReplyType::Err => {
                let verbose = envelope.verbose.clone().unwrap_or_default();
                let Some(pending) = self.take_pending(&envelope) else {
                    warn!(%verbose, "server error without a pending request");
                    return Routed::Unmatched;
                };
                self.apply_failure(&pending);
                let _ = pending.reply.send(Err(ClientError::ServerError(verbose)));
                Routed::Resolved
            }
        }
    }

    fn take_pending(
        &mut self,
        envelope: &ServerEnvelope,
    ) -> Option<Pending> {
        let matcher = envelope.matcher.as_deref()?;
        let pending = self.pending.remove(matcher);
        if pending.is_none() {
            trace!(%matcher, "reply for unknown matcher");
        }
        pending
    }

    fn route_publication(
        &self,
        envelope: &ServerEnvelope,
    ) -> Routed {
        let Some(publication) = envelope.as_publication() else {
            debug!("malformed publication");
            return Routed::Unmatched;
        };
        match self.subscriptions.get(&publication.topic) {
            Some(callback) => Routed::Deliver(callback.clone(), publication),
            None => {
                trace!(topic = %publication.topic, "publication for untracked topic");
                Routed::Unmatched
            }
        }
    }

    fn apply_success(
        &mut self,
        pending: &Pending,
    ) {
        match (pending.kind, &pending.topic) {
            (RequestType::AddPub, Some(topic)) => {
                self.publications.insert(topic.clone());
            }
            // колбэк снимается только после подтверждения сервером
            (RequestType::RmSub, Some(topic)) => {
                self.subscriptions.remove(topic);
            }
            _ => {}
        }
    }

    fn apply_failure(
        &mut self,
        pending: &Pending,
    ) {
        if let (RequestType::AddSub, Some(topic)) = (pending.kind, &pending.topic) {
            self.subscriptions.remove(topic);
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl fmt::Debug for Correlator {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Correlator")
            .field("counter", &self.counter)
            .field("pending", &self.pending.len())
            .field("subscriptions", &self.subscriptions.len())
            .field("publications", &self.publications)
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use rach_error::DispatchError;
    use serde_json::json;

    use super::*;

    fn noop() -> SubscriptionCallback {
        Arc::new(|_| {})
    }

    #[test]
    fn test_matchers_are_monotonic() {
        let mut c = Correlator::new();
        assert_eq!(c.next_matcher(), "1");
        assert_eq!(c.next_matcher(), "2");
        assert_eq!(c.next_matcher(), "3");
    }

    /// Тест проверяет, что `service` разрешает ожидание значением `result`.
    #[test]
    fn test_service_reply_resolves_result() {
        let mut c = Correlator::new();
        let m = c.next_matcher();
        let mut rx = c.register(m.clone(), RequestType::Service, None);

        let routed = c.route(ServerEnvelope::service_result(m, json!([1, 2])));
        assert!(matches!(routed, Routed::Resolved));
        assert_eq!(rx.try_recv().unwrap(), Ok(json!([1, 2])));
        assert_eq!(c.pending_len(), 0);
    }

    #[test]
    fn test_ack_on_add_pub_grants_topic() {
        let mut c = Correlator::new();
        let mut rx = c.register("1".into(), RequestType::AddPub, Some("/t".into()));
        c.route(ServerEnvelope::ack("1", "Added publication"));
        assert_eq!(rx.try_recv().unwrap(), Ok(Value::Null));
        assert!(c.is_publisher("/t"));
    }

    #[test]
    fn test_err_resolves_and_drops_subscription() {
        let mut c = Correlator::new();
        assert!(c.track_subscription("/t", noop()));
        let mut rx = c.register("7".into(), RequestType::AddSub, Some("/t".into()));

        let err = DispatchError::TopicMissing {
            request: "addSub".into(),
        };
        c.route(ServerEnvelope::error(Some("7".into()), &err));
        assert_eq!(
            rx.try_recv().unwrap(),
            Err(ClientError::ServerError("Topic missing for addSub".into()))
        );
        assert!(!c.is_subscribed("/t"));
    }

    /// Тест проверяет, что отказ на `rmSub` сохраняет колбэк, а
    /// подтверждение снимает его.
    #[test]
    fn test_rm_sub_untracks_only_on_ack() {
        let mut c = Correlator::new();
        assert!(c.track_subscription("/t", noop()));

        let mut rx = c.register("1".into(), RequestType::RmSub, Some("/t".into()));
        let err = DispatchError::TopicMissing {
            request: "rmSub".into(),
        };
        c.route(ServerEnvelope::error(Some("1".into()), &err));
        assert!(rx.try_recv().unwrap().is_err());
        assert!(c.is_subscribed("/t"));

        let mut rx = c.register("2".into(), RequestType::RmSub, Some("/t".into()));
        c.route(ServerEnvelope::ack("2", "Removed subscription"));
        assert_eq!(rx.try_recv().unwrap(), Ok(Value::Null));
        assert!(!c.is_subscribed("/t"));
    }

    #[test]
    fn test_unknown_matcher_is_unmatched() {
        let mut c = Correlator::new();
        let routed = c.route(ServerEnvelope::ack("99", "Added subscription"));
        assert!(matches!(routed, Routed::Unmatched));
    }

    /// Тест проверяет маршрутизацию публикации по точному `data.topic`.
    #[test]
    fn test_publication_routed_by_exact_topic() {
        let mut c = Correlator::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        c.track_subscription("/a", Arc::new(move |p| sink.lock().unwrap().push(p)));

        match c.route(ServerEnvelope::publication(json!(5), "/a/b", "/a")) {
            Routed::Deliver(cb, p) => cb(p),
            _ => panic!("expected delivery"),
        }
        assert_eq!(seen.lock().unwrap()[0].source_topic, "/a/b");

        let routed = c.route(ServerEnvelope::publication(json!(5), "/a/b", "/a/b"));
        assert!(matches!(routed, Routed::Unmatched));
    }

    #[test]
    fn test_resubscribe_keeps_first() {
        let mut c = Correlator::new();
        assert!(c.track_subscription("/a", noop()));
        assert!(!c.track_subscription("/a", noop()));
    }

    #[test]
    fn test_auth_routing() {
        let mut c = Correlator::new();
        match c.route(ServerEnvelope::auth_accepted("abc")) {
            Routed::Auth(Some(id)) => assert_eq!(id.as_str(), "abc"),
            _ => panic!("expected accepted auth"),
        }
        assert!(matches!(
            c.route(ServerEnvelope::auth_rejected()),
            Routed::Auth(None)
        ));
    }

    #[test]
    fn test_fail_all_and_drain() {
        let mut c = Correlator::new();
        let mut rx = c.register("1".into(), RequestType::RmSub, None);
        c.track_subscription("/b", noop());
        c.track_subscription("/a", noop());
        c.route(ServerEnvelope::ack("x", "ignored"));
        let mut grant = c.register("2".into(), RequestType::AddPub, Some("/p".into()));
        c.route(ServerEnvelope::ack("2", "Added publication"));
        let _ = grant.try_recv();

        c.fail_all(ClientError::ConnectionClosed);
        assert_eq!(rx.try_recv().unwrap(), Err(ClientError::ConnectionClosed));

        let (subs, pubs) = c.drain_tracked();
        assert_eq!(subs, vec!["/a", "/b"]);
        assert_eq!(pubs, vec!["/p"]);
        assert!(!c.is_publisher("/p"));
    }
}
