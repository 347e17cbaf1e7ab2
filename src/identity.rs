use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Зарезервированный идентификатор процесса-хоста (локальная петля).
///
/// Генератор выдаёт только UUID v4, поэтому это значение никогда не
/// совпадёт с идентификатором сетевого клиента.
pub const LOCAL_ID: &str = "local";

/// Непрозрачный идентификатор клиента.
///
/// Дешёво клонируется (`Arc<str>`), сравнивается и упорядочивается как
/// строка.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Arc<str>);

impl ClientId {
    /// Свежий идентификатор для аутентифицированного соединения.
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    /// Идентификатор локальной петли.
    pub fn local() -> Self {
        Self(Arc::from(LOCAL_ID))
    }

    pub fn is_local(&self) -> bool {
        &*self.0 == LOCAL_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for ClientId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
