use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde_repr")]
use serde_repr::{Deserialize_repr, Serialize_repr};
#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса для категоризации ошибок брокера.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 3xxx: Аутентификация
/// - 6xxx: Сеть / доставка
/// - 8xxx: Протокол (разбор и валидация конвертов)
/// - 9xxx: Сервисы (удалённые процедуры)
///
/// # Реализация:
/// - `num_enum::TryFromPrimitive` даёт `TryFrom<u32>`.
/// - опционально: `strum` для `AsRefStr`/`EnumIter` (feature = "strum").
/// - опционально: `serde_repr` для сериализации числом (feature =
///   "serde_repr").
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[cfg_attr(feature = "serde_repr", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,

    // === 3xxx: Аутентификация ===
    AuthFailed = 3000,
    Unauthorized = 3009,

    // === 6xxx: Сеть/доставка ===
    Io = 6000,
    ConnectionClosed = 6001,
    Timeout = 6002,
    SerializationFailed = 6003,

    // === 8xxx: Протокол ===
    InvalidFrame = 8000,
    InvalidRequestType = 8001,
    MissingField = 8002,
    InvalidField = 8003,

    // === 9xxx: Сервисы ===
    ServiceUnavailable = 9000,
    ServiceFailed = 9001,
    ServiceTimeout = 9002,
    PublishFailed = 9003,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Вернёт `true`, если переданный `code` означает успешный результат.
    pub fn is_success(code: u32) -> bool {
        Self::Success as u32 == code
    }

    /// Ошибка на стороне клиента: неверный конверт, неизвестный тип
    /// запроса или отказ в аутентификации.
    pub fn is_client_error(&self) -> bool {
        let c = self.code();
        if (3000..=3999).contains(&c) || (8000..=8999).contains(&c) {
            return true;
        }
        matches!(self, Self::InvalidArgs)
    }

    /// Ошибка сервера: внутренняя или сетевая.
    pub fn is_server_error(&self) -> bool {
        let c = self.code();
        matches!(c, 1000..=1999 | 6000..=6999) && !matches!(self, Self::InvalidArgs)
    }

    /// Ошибка протокола или парсинга (диапазон 8xxx).
    pub fn is_protocol_error(&self) -> bool {
        (8000..=8999).contains(&self.code())
    }

    /// Ошибка, возникшая при вызове сервиса (диапазон 9xxx).
    pub fn is_service_error(&self) -> bool {
        (9000..=9999).contains(&self.code())
    }

    /// Завершает ли ошибка соединение целиком.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AuthFailed | Self::Unauthorized | Self::ConnectionClosed
        )
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::InvalidFrame
            | Self::InvalidRequestType
            | Self::MissingField
            | Self::InvalidField
            | Self::ServiceUnavailable
            | Self::PublishFailed
            | Self::InvalidArgs => LogLevel::Debug,
            Self::ServiceFailed | Self::AuthFailed | Self::Unauthorized => LogLevel::Info,
            Self::ServiceTimeout | Self::Timeout | Self::ConnectionClosed => LogLevel::Warn,
            Self::Internal | Self::Unexpected => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет разделение клиентских и серверных ошибок.
    #[test]
    fn test_client_vs_server() {
        assert!(StatusCode::InvalidArgs.is_client_error());
        assert!(StatusCode::AuthFailed.is_client_error());
        assert!(StatusCode::MissingField.is_client_error());
        assert!(StatusCode::Internal.is_server_error());
        assert!(StatusCode::ConnectionClosed.is_server_error());
        assert!(!StatusCode::InvalidArgs.is_server_error());
    }

    /// Тест проверяет конвертацию через `TryFrom<u32>` и `from_u32`.
    #[test]
    fn test_from_try_from_u32() {
        let n = StatusCode::ServiceUnavailable.code();
        assert_eq!(
            StatusCode::try_from(n).unwrap(),
            StatusCode::ServiceUnavailable
        );
        assert!(StatusCode::from_u32(99999).is_none());
    }

    #[test]
    fn test_code_and_into() {
        let c = StatusCode::InvalidFrame;
        assert_eq!(c.code(), 8000);
        let n: u32 = c.into();
        assert_eq!(n, 8000);
        assert!(StatusCode::is_success(StatusCode::Success.code()));
        assert!(!StatusCode::is_success(StatusCode::InvalidFrame.code()));
    }

    /// Тест проверяет диапазоны протокольных и сервисных ошибок.
    #[test]
    fn test_ranges() {
        assert!(StatusCode::InvalidRequestType.is_protocol_error());
        assert!(!StatusCode::ServiceFailed.is_protocol_error());
        assert!(StatusCode::ServiceFailed.is_service_error());
        assert!(StatusCode::PublishFailed.is_service_error());
    }

    /// Тест проверяет, что только ошибки аутентификации и закрытия
    /// соединения считаются терминальными.
    #[test]
    fn test_is_terminal() {
        assert!(StatusCode::AuthFailed.is_terminal());
        assert!(StatusCode::Unauthorized.is_terminal());
        assert!(!StatusCode::ServiceFailed.is_terminal());
        assert!(!StatusCode::InvalidFrame.is_terminal());
    }

    #[test]
    fn test_log_level_mappings() {
        assert_eq!(StatusCode::Success.log_level(), LogLevel::Trace);
        assert_eq!(StatusCode::InvalidFrame.log_level(), LogLevel::Debug);
        assert_eq!(StatusCode::ServiceTimeout.log_level(), LogLevel::Warn);
        assert_eq!(StatusCode::Internal.log_level(), LogLevel::Error);
    }

    /// Тест проверяет формат `Display`: имя варианта и числовой код.
    #[test]
    fn test_display_contains_name_and_code() {
        let s = format!("{}", StatusCode::MissingField);
        assert!(s.contains("8002"), "Display must contain code, got: {s}");
        assert!(
            s.contains("MissingField"),
            "Display must contain variant name, got: {s}"
        );
    }
}
