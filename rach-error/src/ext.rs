use std::{any::Any, error::Error};

use crate::StatusCode;

/// Расширение для ошибок брокера (object-safe).
///
/// Диспетчер принимает ошибки как `&dyn ErrorExt`, поэтому любая из них
/// может быть превращена в конверт `err`:
/// - `status_code` задаёт категорию и уровень логирования,
/// - `client_message` становится полем `verbose`,
/// - `log_message` уходит только в логи.
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// Категория ошибки.
    ///
    /// По умолчанию возвращает [`StatusCode::Internal`].
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    /// Возвращает ошибку как [`Any`](std::any::Any) для downcast.
    fn as_any(&self) -> &dyn Any;

    /// Текст, отправляемый клиенту в поле `verbose`.
    ///
    /// Для внутренних ошибок детали скрываются за строкой
    /// `"Internal server error"`.
    fn client_message(&self) -> String {
        match self.status_code() {
            StatusCode::Unknown | StatusCode::Internal | StatusCode::Unexpected => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Детализированное сообщение для логов.
    fn log_message(&self) -> String {
        format!("{self:?}")
    }

    /// Пары ключ–значение для структурированных событий `tracing`.
    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("error_type", self.type_name()),
            ("status_code", self.status_code().to_string()),
        ]
    }

    /// Короткое имя типа ошибки.
    fn type_name(&self) -> String {
        std::any::type_name::<Self>()
            .rsplit("::")
            .next()
            .unwrap_or("Unknown")
            .to_string()
    }
}
