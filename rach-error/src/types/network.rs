use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибка отправки конверта получателю.
///
/// Диспетчер только логирует такие ошибки и продолжает работу.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Канал получателя закрыт (соединение уже завершилось)
    Closed { client: String },
    /// Конверт не удалось сериализовать
    Serialize { reason: String },
}

impl std::fmt::Display for SendError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Closed { client } => write!(f, "Send channel closed for client {client}"),
            Self::Serialize { reason } => write!(f, "Envelope serialization failed: {reason}"),
        }
    }
}

impl std::error::Error for SendError {}

impl ErrorExt for SendError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Closed { .. } => StatusCode::ConnectionClosed,
            Self::Serialize { .. } => StatusCode::SerializationFailed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "send".to_string()),
            ("status_code", self.status_code().to_string()),
        ];
        if let Self::Closed { client } = self {
            tags.push(("client", client.clone()));
        }
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed() {
        let err = SendError::Closed {
            client: "abc".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::ConnectionClosed);
        assert!(err.metrics_tags().contains(&("client", "abc".to_string())));
    }

    #[test]
    fn test_serialize() {
        let err = SendError::Serialize {
            reason: "key must be a string".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::SerializationFailed);
        assert!(err.to_string().contains("key must be a string"));
    }
}
