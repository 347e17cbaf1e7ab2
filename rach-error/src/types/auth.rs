use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Отказ в подключении на этапе рукопожатия. Всегда терминальна для
/// соединения.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Предикат вернул `false`
    #[error("Authentication rejected for {peer}")]
    Rejected { peer: String },
    /// Предикат не настроен, все подключения отклоняются
    #[error("No authentication predicate configured")]
    PredicateMissing,
    /// Не удалось подготовить хеш пароля при загрузке пользователей
    #[error("Password hashing failed: {reason}")]
    PasswordHashFailed { reason: String },
}

impl ErrorExt for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Rejected { .. } => StatusCode::AuthFailed,
            Self::PredicateMissing => StatusCode::Unauthorized,
            Self::PasswordHashFailed { .. } => StatusCode::Internal,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::Rejected { .. } | Self::PredicateMissing => "Authentication failed".to_string(),
            Self::PasswordHashFailed { .. } => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет, что клиент не узнаёт причину отказа.
    #[test]
    fn test_client_message_is_uniform() {
        let rejected = AuthError::Rejected {
            peer: "10.0.0.1:5000".to_string(),
        };
        assert_eq!(rejected.client_message(), "Authentication failed");
        assert_eq!(
            AuthError::PredicateMissing.client_message(),
            "Authentication failed"
        );
        assert!(rejected.to_string().contains("10.0.0.1"));
    }

    #[test]
    fn test_auth_errors_are_terminal() {
        assert!(AuthError::PredicateMissing.status_code().is_terminal());
        assert!(AuthError::Rejected {
            peer: String::new()
        }
        .status_code()
        .is_terminal());
    }
}
