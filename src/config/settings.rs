use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use config::{Config, Environment, File};
use rach_error::AuthError;
use serde::{Deserialize, Serialize};

use crate::{
    auth::{AllowAll, AuthPredicate, PasswordAuthenticator},
    error::SettingsError,
    logging::LoggingConfig,
};

/// Префикс переменных окружения: `RACH_SERVER__LISTEN_ADDR=...`.
pub const ENV_PREFIX: &str = "RACH";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub services: ServiceSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSettings {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Верхняя граница одновременных соединений
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Ожидаемая глубина очереди записи; при превышении пишется warn
    #[serde(default = "default_write_channel_hint")]
    pub write_channel_hint: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthSettings {
    /// Пускать всех без проверки
    #[serde(default)]
    pub allow_anonymous: bool,
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

/// Пользователь: пароль в открытом виде или готовый argon2-хеш.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Таймаут вызова сервиса; не задан, ждём сколько угодно
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Settings {
    /// Загружает настройки: значения по умолчанию, затем TOML-файл (если
    /// указан), затем переменные окружения `RACH_*`.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Settings::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.listen_addr()?;
        if self.server.max_connections == 0 {
            return Err(SettingsError::InvalidValue {
                field: "server.max_connections",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.server.write_channel_hint == 0 {
            return Err(SettingsError::InvalidValue {
                field: "server.write_channel_hint",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.services.timeout_ms == Some(0) {
            return Err(SettingsError::InvalidValue {
                field: "services.timeout_ms",
                reason: "must be greater than zero or unset".to_string(),
            });
        }
        self.logging
            .validate()
            .map_err(|reason| SettingsError::InvalidValue {
                field: "logging.level",
                reason,
            })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, SettingsError> {
        self.server
            .listen_addr
            .parse()
            .map_err(|_| SettingsError::InvalidListenAddr(self.server.listen_addr.clone()))
    }

    pub fn service_timeout(&self) -> Option<Duration> {
        self.services.timeout_ms.map(Duration::from_millis)
    }

    /// Предикат допуска по секции `[auth]`.
    ///
    /// `None`, если анонимный доступ запрещён и пользователей нет: тогда
    /// диспетчер отклоняет все соединения.
    pub fn build_auth(&self) -> Result<Option<Arc<dyn AuthPredicate>>, AuthError> {
        if self.auth.allow_anonymous {
            return Ok(Some(Arc::new(AllowAll)));
        }
        if self.auth.users.is_empty() {
            return Ok(None);
        }
        let authenticator = PasswordAuthenticator::from_users(&self.auth.users)?;
        Ok(Some(Arc::new(authenticator)))
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_connections: default_max_connections(),
            write_channel_hint: default_write_channel_hint(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:9000".to_string()
}

fn default_max_connections() -> usize {
    1024
}

fn default_write_channel_hint() -> usize {
    256
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
