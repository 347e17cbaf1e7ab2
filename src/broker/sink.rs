use rach_error::SendError;
use tokio::sync::mpsc;

use crate::protocol::ServerEnvelope;

/// Способность доставить конверт конкретному клиенту.
///
/// Отправка не блокирует: сетевая реализация кладёт сериализованный
/// конверт в неограниченный канал, локальная вызывает колбэк подписки.
pub trait ClientSink: Send + Sync + 'static {
    fn send(
        &self,
        envelope: &ServerEnvelope,
    ) -> Result<(), SendError>;
}

/// Сетевой приёмник: неограниченный канал к задаче-писателю соединения.
///
/// Задача-писатель завершается, когда последний `ChannelSink` удалён.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    client: String,
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new(
        client: impl Into<String>,
        tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            client: client.into(),
            tx,
        }
    }

    /// Приёмник вместе с концом канала, из которого читает писатель.
    pub fn pair(client: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(client, tx), rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl ClientSink for ChannelSink {
    fn send(
        &self,
        envelope: &ServerEnvelope,
    ) -> Result<(), SendError> {
        let frame = envelope.to_json()?;
        self.tx.send(frame).map_err(|_| SendError::Closed {
            client: self.client.clone(),
        })
    }
}
