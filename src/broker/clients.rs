use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ClientSink;
use crate::identity::ClientId;

/// Метаданные и счётчики клиента.
///
/// Счётчики атомарны: их обновляют уже после снятия блокировки
/// диспетчера.
#[derive(Debug)]
pub struct ClientInfo {
    pub peer: String,
    pub connected_at: Instant,
    pub connected_at_utc: DateTime<Utc>,
    received: AtomicU64,
    sent: AtomicU64,
    send_failures: AtomicU64,
}

/// Запись реестра: куда слать и что известно о клиенте.
#[derive(Clone)]
pub struct ClientHandle {
    pub id: ClientId,
    pub sink: Arc<dyn ClientSink>,
    pub info: Arc<ClientInfo>,
}

/// Снимок клиента для сервиса `/rach/clients`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSnapshot {
    pub id: String,
    pub peer: String,
    pub connected_at: String,
    pub uptime_secs: u64,
    pub messages_received: u64,
    pub messages_sent: u64,
    pub send_failures: u64,
}

/// Агрегированная статистика по всем клиентам.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub active_clients: usize,
    pub total_received: u64,
    pub total_sent: u64,
    pub total_send_failures: u64,
}

/// Реестр клиентов: идентификатор → приёмник.
///
/// Собственной синхронизации не имеет: живёт вместе с деревом топиков под
/// одной блокировкой диспетчера.
#[derive(Default)]
pub struct ClientRegistry {
    clients: HashMap<ClientId, ClientHandle>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ClientInfo {
    pub fn new(peer: impl Into<String>) -> Self {
        Self {
            peer: peer.into(),
            connected_at: Instant::now(),
            connected_at_utc: Utc::now(),
            received: AtomicU64::new(0),
            sent: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.connected_at.elapsed()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }
}

impl ClientHandle {
    pub fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            id: self.id.to_string(),
            peer: self.info.peer.clone(),
            connected_at: self.info.connected_at_utc.to_rfc3339(),
            uptime_secs: self.info.uptime().as_secs(),
            messages_received: self.info.received(),
            messages_sent: self.info.sent(),
            send_failures: self.info.send_failures(),
        }
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Регистрирует клиента. Повторная регистрация того же id заменяет
    /// приёмник.
    pub fn register(
        &mut self,
        id: ClientId,
        sink: Arc<dyn ClientSink>,
        peer: impl Into<String>,
    ) -> ClientHandle {
        let handle = ClientHandle {
            id: id.clone(),
            sink,
            info: Arc::new(ClientInfo::new(peer)),
        };
        self.clients.insert(id, handle.clone());
        handle
    }

    /// Удаляет клиента. Отсутствующий id спокойно игнорируется.
    pub fn unregister(
        &mut self,
        id: &ClientId,
    ) -> Option<ClientHandle> {
        self.clients.remove(id)
    }

    pub fn get(
        &self,
        id: &ClientId,
    ) -> Option<&ClientHandle> {
        self.clients.get(id)
    }

    pub fn contains(
        &self,
        id: &ClientId,
    ) -> bool {
        self.clients.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Снимки всех клиентов, упорядоченные по времени подключения.
    pub fn snapshots(&self) -> Vec<ClientSnapshot> {
        let mut handles: Vec<_> = self.clients.values().collect();
        handles.sort_by_key(|h| h.info.connected_at);
        handles.into_iter().map(ClientHandle::snapshot).collect()
    }

    pub fn stats(&self) -> RegistryStats {
        self.clients
            .values()
            .fold(RegistryStats::default(), |mut acc, h| {
                acc.active_clients += 1;
                acc.total_received += h.info.received();
                acc.total_sent += h.info.sent();
                acc.total_send_failures += h.info.send_failures();
                acc
            })
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
