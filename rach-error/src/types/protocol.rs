use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки разбора, валидации и маршрутизации входящего конверта.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Сообщение не является JSON-объектом
    Parse { reason: String },
    /// В конверте отсутствует обязательное поле (`matcher`, `type`, `data`)
    MissingField { field: &'static str },
    /// Неизвестное значение поля `type`
    InvalidRequestType { kind: String },
    /// Сервис с таким топиком не зарегистрирован
    ServiceUnavailable { topic: String },
    /// В запросе `service` нет `topic` или `args`
    ServiceTopicMissing,
    /// В запросе подписки/публикации нет `topic`
    TopicMissing { request: String },
    /// В запросе `pub` нет `topic` или `data`
    PublishFailed,
}

impl std::fmt::Display for DispatchError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Parse { reason } => write!(f, "Malformed message: {reason}"),
            Self::MissingField { field } => write!(f, "Missing field: {field}"),
            Self::InvalidRequestType { kind } => write!(f, "Invalid request type: {kind}"),
            Self::ServiceUnavailable { topic } => write!(f, "Service unavailable: {topic}"),
            Self::ServiceTopicMissing => write!(f, "Service topic missing"),
            Self::TopicMissing { request } => write!(f, "Topic missing for {request}"),
            Self::PublishFailed => write!(f, "Publish failed"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl ErrorExt for DispatchError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Parse { .. } => StatusCode::InvalidFrame,
            Self::MissingField { .. } => StatusCode::MissingField,
            Self::InvalidRequestType { .. } => StatusCode::InvalidRequestType,
            Self::ServiceUnavailable { .. } => StatusCode::ServiceUnavailable,
            Self::ServiceTopicMissing | Self::TopicMissing { .. } => StatusCode::InvalidField,
            Self::PublishFailed => StatusCode::PublishFailed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::Parse { .. } => "Malformed message".to_string(),
            Self::InvalidRequestType { .. } => "Invalid request type".to_string(),
            Self::ServiceUnavailable { .. } => "Service unavailable".to_string(),
            _ => self.to_string(),
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "dispatch".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::ServiceUnavailable { topic } => tags.push(("topic", topic.clone())),
            Self::InvalidRequestType { kind } => tags.push(("request_type", kind.clone())),
            Self::TopicMissing { request } => tags.push(("request_type", request.clone())),
            Self::MissingField { field } => tags.push(("field", field.to_string())),
            _ => {}
        }

        tags
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет, что клиент не видит текст ошибки парсера JSON.
    #[test]
    fn test_parse_error_hides_reason() {
        let err = DispatchError::Parse {
            reason: "expected value at line 1 column 1".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::InvalidFrame);
        assert_eq!(err.client_message(), "Malformed message");
        assert!(err.to_string().contains("line 1"));
    }

    /// Тест проверяет тексты ответов маршрутизации.
    #[test]
    fn test_route_messages() {
        let unavailable = DispatchError::ServiceUnavailable {
            topic: "/nope".to_string(),
        };
        assert_eq!(unavailable.client_message(), "Service unavailable");
        assert_eq!(
            DispatchError::InvalidRequestType {
                kind: "bogus".to_string()
            }
            .client_message(),
            "Invalid request type"
        );
        assert_eq!(
            DispatchError::ServiceTopicMissing.client_message(),
            "Service topic missing"
        );
        assert_eq!(DispatchError::PublishFailed.client_message(), "Publish failed");
    }

    #[test]
    fn test_missing_field_names_field() {
        let err = DispatchError::MissingField { field: "matcher" };
        assert_eq!(err.client_message(), "Missing field: matcher");
        assert!(err.status_code().is_protocol_error());
        assert!(err
            .metrics_tags()
            .contains(&("field", "matcher".to_string())));
    }

    #[test]
    fn test_topic_missing_names_request() {
        let err = DispatchError::TopicMissing {
            request: "addSub".to_string(),
        };
        assert_eq!(err.client_message(), "Topic missing for addSub");
    }
}
