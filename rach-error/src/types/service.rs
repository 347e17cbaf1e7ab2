use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибка обработчика удалённой процедуры.
///
/// Текст `Display` совпадает с полем `verbose` ответа `err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Обработчик завершился неудачей
    Failed { message: String },
    /// Аргументы не соответствуют контракту сервиса
    InvalidArgs { reason: String },
    /// Истёк `services.timeout_ms`
    Timeout,
}

impl ServiceError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn invalid_args(reason: impl Into<String>) -> Self {
        Self::InvalidArgs {
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Failed { message } => write!(f, "Service error: {message}"),
            Self::InvalidArgs { reason } => {
                write!(f, "Service error: invalid arguments: {reason}")
            }
            Self::Timeout => write!(f, "Service error: timed out"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl ErrorExt for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Failed { .. } => StatusCode::ServiceFailed,
            Self::InvalidArgs { .. } => StatusCode::InvalidArgs,
            Self::Timeout => StatusCode::ServiceTimeout,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("error_type", "service".to_string()),
            ("status_code", self.status_code().to_string()),
        ]
    }
}
