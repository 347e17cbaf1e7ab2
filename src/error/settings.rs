use thiserror::Error;

/// Ошибки загрузки и проверки настроек.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Ошибка слоя `config` (файл, окружение, десериализация)
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    /// Адрес прослушивания не разбирается как `SocketAddr`
    #[error("Invalid listen address '{0}'")]
    InvalidListenAddr(String),
    /// Значение вне допустимого диапазона
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}
