//! Ошибки клиентской библиотеки Rach.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

/// Ошибки клиента (сетевого [`RachClient`](crate::client::RachClient) и
/// локального [`LocalClient`](crate::broker::LocalClient)).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Не удалось установить WebSocket-соединение
    #[error("Failed to connect to {0}: {1}")]
    ConnectionFailed(String, String),
    /// Сервер не прислал `auth` вовремя
    #[error("Timed out waiting for authentication")]
    AuthTimeout,
    /// Сервер отклонил учётные данные
    #[error("Authentication rejected by server")]
    AuthenticationFailed,
    /// Соединение закрыто до получения ответа
    #[error("Connection closed")]
    ConnectionClosed,
    /// Сервер ответил `err`; внутри поле `verbose`
    #[error("Server error: {0}")]
    ServerError(String),
    /// Ответ не соответствует запросу
    #[error("Unexpected response from server")]
    UnexpectedResponse,
    /// Публикация в топик без предварительного `add_publisher`
    #[error("Not a publisher of {0}")]
    NotPublisher(String),
    /// Некорректный URL сервера
    #[error("Invalid server url: {0}")]
    InvalidUrl(String),
    /// Ошибка сериализации конверта
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<rach_error::SendError> for ClientError {
    fn from(err: rach_error::SendError) -> Self {
        match err {
            rach_error::SendError::Closed { .. } => Self::ConnectionClosed,
            rach_error::SendError::Serialize { reason } => Self::Protocol(reason),
        }
    }
}
