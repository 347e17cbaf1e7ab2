use std::{fmt, str::FromStr};

use rach_error::{ErrorExt, SendError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Тип запроса клиента (поле `type` входящего конверта).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
pub enum RequestType {
    #[serde(rename = "service")]
    Service,
    #[serde(rename = "addSub")]
    AddSub,
    #[serde(rename = "rmSub")]
    RmSub,
    #[serde(rename = "addPub")]
    AddPub,
    #[serde(rename = "rmPub")]
    RmPub,
    #[serde(rename = "pub")]
    Pub,
}

/// Тип ответа сервера (поле `type` исходящего конверта).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyType {
    Auth,
    Ack,
    Err,
    Service,
    Pub,
}

/// Конверт клиент → сервер.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEnvelope {
    pub matcher: String,
    #[serde(rename = "type")]
    pub kind: RequestType,
    pub data: Value,
}

/// Конверт сервер → клиент.
///
/// Отсутствующие поля не сериализуются: публикации идут без `matcher`,
/// подтверждения без `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
    #[serde(rename = "type")]
    pub kind: ReplyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose: Option<String>,
}

/// Содержимое `pub`-конверта, доставленного подписчику.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    /// Топик подписки (предок `source_topic` или он сам)
    pub topic: String,
    /// Топик, в который опубликовано сообщение
    pub source_topic: String,
    #[serde(default)]
    pub data: Value,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl RequestType {
    pub const ALL: [RequestType; 6] = [
        Self::Service,
        Self::AddSub,
        Self::RmSub,
        Self::AddPub,
        Self::RmPub,
        Self::Pub,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::AddSub => "addSub",
            Self::RmSub => "rmSub",
            Self::AddPub => "addPub",
            Self::RmPub => "rmPub",
            Self::Pub => "pub",
        }
    }

    /// Ожидает ли запрос ответа по `matcher`.
    pub const fn expects_reply(self) -> bool {
        !matches!(self, Self::Pub)
    }
}

impl ClientEnvelope {
    pub fn new(
        matcher: impl Into<String>,
        kind: RequestType,
        data: Value,
    ) -> Self {
        Self {
            matcher: matcher.into(),
            kind,
            data,
        }
    }

    /// Запрос с единственным полем `data.topic`.
    pub fn topic(
        matcher: impl Into<String>,
        kind: RequestType,
        topic: &str,
    ) -> Self {
        Self::new(matcher, kind, json!({ "topic": topic }))
    }

    pub fn to_json(&self) -> Result<String, SendError> {
        serde_json::to_string(self).map_err(|e| SendError::Serialize {
            reason: e.to_string(),
        })
    }
}

impl ServerEnvelope {
    fn bare(kind: ReplyType) -> Self {
        Self {
            matcher: None,
            kind,
            data: None,
            verbose: None,
        }
    }

    /// `{type:"auth", data:{success:true, id}}`
    pub fn auth_accepted(id: &str) -> Self {
        Self {
            data: Some(json!({ "success": true, "id": id })),
            ..Self::bare(ReplyType::Auth)
        }
    }

    /// `{type:"auth", data:{success:false}}`
    pub fn auth_rejected() -> Self {
        Self {
            data: Some(json!({ "success": false })),
            ..Self::bare(ReplyType::Auth)
        }
    }

    pub fn ack(
        matcher: impl Into<String>,
        verbose: impl Into<String>,
    ) -> Self {
        Self {
            matcher: Some(matcher.into()),
            verbose: Some(verbose.into()),
            ..Self::bare(ReplyType::Ack)
        }
    }

    /// Конверт ошибки. `verbose` берётся из [`ErrorExt::client_message`].
    pub fn error(
        matcher: Option<String>,
        err: &dyn ErrorExt,
    ) -> Self {
        Self {
            matcher,
            verbose: Some(err.client_message()),
            ..Self::bare(ReplyType::Err)
        }
    }

    /// `{matcher, type:"service", data:{result}}`
    pub fn service_result(
        matcher: impl Into<String>,
        result: Value,
    ) -> Self {
        let mut data = Map::new();
        data.insert("result".to_string(), result);
        Self {
            matcher: Some(matcher.into()),
            data: Some(Value::Object(data)),
            ..Self::bare(ReplyType::Service)
        }
    }

    /// Доставка публикации подписчику узла `topic`.
    pub fn publication(
        data: Value,
        source_topic: &str,
        topic: &str,
    ) -> Self {
        Self {
            data: Some(json!({
                "data": data,
                "source_topic": source_topic,
                "topic": topic,
            })),
            ..Self::bare(ReplyType::Pub)
        }
    }

    pub fn to_json(&self) -> Result<String, SendError> {
        serde_json::to_string(self).map_err(|e| SendError::Serialize {
            reason: e.to_string(),
        })
    }

    /// Разбирает `data` публикации. `None` для прочих типов и для
    /// конверта без `topic`.
    pub fn as_publication(&self) -> Option<Publication> {
        if self.kind != ReplyType::Pub {
            return None;
        }
        let data = self.data.as_ref()?;
        serde_json::from_value(data.clone()).ok()
    }

    /// Поле `data.<key>`, если есть.
    pub fn data_field(
        &self,
        key: &str,
    ) -> Option<&Value> {
        self.data.as_ref().and_then(|d| d.get(key))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl fmt::Display for RequestType {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|t| t.as_str() == s).ok_or(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use rach_error::DispatchError;

    use super::*;

    #[test]
    fn test_request_type_names() {
        for t in RequestType::ALL {
            assert_eq!(t.as_str().parse::<RequestType>(), Ok(t));
            assert_eq!(
                serde_json::to_value(t).unwrap(),
                Value::String(t.as_str().to_string())
            );
        }
        assert!("subscribe".parse::<RequestType>().is_err());
        assert!(!RequestType::Pub.expects_reply());
    }

    /// Тест проверяет, что у публикации нет `matcher` и `verbose` на проводе.
    #[test]
    fn test_publication_wire_shape() {
        let env = ServerEnvelope::publication(json!({"v": 1}), "/a/b", "/a");
        let wire: Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(
            wire,
            json!({
                "type": "pub",
                "data": {"data": {"v": 1}, "source_topic": "/a/b", "topic": "/a"}
            })
        );
    }

    #[test]
    fn test_as_publication() {
        let env = ServerEnvelope::publication(json!({"v": 1}), "/a/b", "/a");
        let publication = env.as_publication().unwrap();
        assert_eq!(publication.topic, "/a");
        assert_eq!(publication.source_topic, "/a/b");
        assert_eq!(publication.data, json!({"v": 1}));

        assert!(ServerEnvelope::ack("1", "ok").as_publication().is_none());
        let broken = ServerEnvelope {
            data: Some(json!({"data": 1})),
            ..ServerEnvelope::publication(Value::Null, "/", "/")
        };
        assert!(broken.as_publication().is_none());
    }

    #[test]
    fn test_ack_wire_shape() {
        let wire = serde_json::to_value(ServerEnvelope::ack("7", "Added subscription")).unwrap();
        assert_eq!(
            wire,
            json!({"matcher": "7", "type": "ack", "verbose": "Added subscription"})
        );
    }

    #[test]
    fn test_error_uses_client_message() {
        let err = DispatchError::Parse {
            reason: "eof".to_string(),
        };
        let env = ServerEnvelope::error(None, &err);
        let wire = serde_json::to_value(&env).unwrap();
        assert_eq!(wire, json!({"type": "err", "verbose": "Malformed message"}));
    }

    #[test]
    fn test_auth_envelopes() {
        let ok = ServerEnvelope::auth_accepted("abc");
        assert_eq!(ok.data_field("success"), Some(&Value::Bool(true)));
        assert_eq!(ok.data_field("id"), Some(&json!("abc")));
        let no = ServerEnvelope::auth_rejected();
        assert_eq!(no.data, Some(json!({"success": false})));
    }

    /// Тест проверяет, что клиент разбирает ответ сервера с пропущенными
    /// полями.
    #[test]
    fn test_server_envelope_deserialize_sparse() {
        let env: ServerEnvelope =
            serde_json::from_str(r#"{"type":"service","matcher":"3","data":{"result":42}}"#)
                .unwrap();
        assert_eq!(env.kind, ReplyType::Service);
        assert_eq!(env.matcher.as_deref(), Some("3"));
        assert_eq!(env.data_field("result"), Some(&json!(42)));
        assert!(env.verbose.is_none());
    }

    #[test]
    fn test_client_envelope_topic() {
        let env = ClientEnvelope::topic("1", RequestType::AddSub, "/x");
        let wire = serde_json::to_value(&env).unwrap();
        assert_eq!(
            wire,
            json!({"matcher": "1", "type": "addSub", "data": {"topic": "/x"}})
        );
    }
}
