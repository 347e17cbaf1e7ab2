use rach_error::DispatchError;
use serde_json::{Map, Value};

use super::RequestType;
use crate::topic::normalize;

/// Разобранный и проверенный запрос клиента.
///
/// Все топики уже в канонической форме.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Service { topic: String, args: Vec<Value> },
    AddSub { topic: String },
    RmSub { topic: String },
    AddPub { topic: String },
    RmPub { topic: String },
    Pub { topic: String, data: Value },
}

/// Запрос вместе с токеном корреляции.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub matcher: String,
    pub request: Request,
}

/// Отказ на одном из этапов разбора.
///
/// `matcher` присутствует, только если его удалось извлечь из конверта.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub matcher: Option<String>,
    pub error: DispatchError,
}

impl Request {
    pub fn kind(&self) -> RequestType {
        match self {
            Self::Service { .. } => RequestType::Service,
            Self::AddSub { .. } => RequestType::AddSub,
            Self::RmSub { .. } => RequestType::RmSub,
            Self::AddPub { .. } => RequestType::AddPub,
            Self::RmPub { .. } => RequestType::RmPub,
            Self::Pub { .. } => RequestType::Pub,
        }
    }

    pub fn topic(&self) -> &str {
        match self {
            Self::Service { topic, .. }
            | Self::AddSub { topic }
            | Self::RmSub { topic }
            | Self::AddPub { topic }
            | Self::RmPub { topic }
            | Self::Pub { topic, .. } => topic,
        }
    }
}

impl Rejection {
    fn untargeted(error: DispatchError) -> Self {
        Self {
            matcher: None,
            error,
        }
    }

    fn targeted(
        matcher: &str,
        error: DispatchError,
    ) -> Self {
        Self {
            matcher: Some(matcher.to_string()),
            error,
        }
    }
}

/// Точка входа: сырой текст → проверенный запрос.
///
/// Этапы строго последовательны: разбор JSON, проверка обязательных полей
/// конверта (`matcher`, `type`, `data`), затем проверка полей конкретного
/// типа запроса.
pub fn parse_request(raw: &str) -> Result<Inbound, Rejection> {
    let value: Value = serde_json::from_str(raw).map_err(|e| {
        Rejection::untargeted(DispatchError::Parse {
            reason: e.to_string(),
        })
    })?;

    let Value::Object(envelope) = value else {
        return Err(Rejection::untargeted(DispatchError::Parse {
            reason: "envelope is not an object".to_string(),
        }));
    };

    // Нестроковый matcher считается отсутствующим.
    let Some(matcher) = envelope.get("matcher").and_then(Value::as_str) else {
        return Err(Rejection::untargeted(DispatchError::MissingField {
            field: "matcher",
        }));
    };

    let Some(kind) = envelope.get("type") else {
        return Err(Rejection::targeted(
            matcher,
            DispatchError::MissingField { field: "type" },
        ));
    };

    let Some(Value::Object(data)) = envelope.get("data") else {
        return Err(Rejection::targeted(
            matcher,
            DispatchError::MissingField { field: "data" },
        ));
    };

    let kind = kind
        .as_str()
        .and_then(|s| s.parse::<RequestType>().ok())
        .ok_or_else(|| {
            Rejection::targeted(
                matcher,
                DispatchError::InvalidRequestType {
                    kind: kind
                        .as_str()
                        .map_or_else(|| kind.to_string(), str::to_string),
                },
            )
        })?;

    let request = parse_data(kind, data).map_err(|e| Rejection::targeted(matcher, e))?;

    Ok(Inbound {
        matcher: matcher.to_string(),
        request,
    })
}

/// Проверка полей `data` для известного типа запроса.
fn parse_data(
    kind: RequestType,
    data: &Map<String, Value>,
) -> Result<Request, DispatchError> {
    let topic = data.get("topic").and_then(Value::as_str).map(normalize);

    match kind {
        RequestType::Service => {
            let (Some(topic), Some(Value::Array(args))) = (topic, data.get("args")) else {
                return Err(DispatchError::ServiceTopicMissing);
            };
            Ok(Request::Service {
                topic,
                args: args.clone(),
            })
        }
        RequestType::Pub => {
            let (Some(topic), Some(payload)) = (topic, data.get("data")) else {
                return Err(DispatchError::PublishFailed);
            };
            Ok(Request::Pub {
                topic,
                data: payload.clone(),
            })
        }
        RequestType::AddSub | RequestType::RmSub | RequestType::AddPub | RequestType::RmPub => {
            let topic = topic.ok_or_else(|| DispatchError::TopicMissing {
                request: kind.to_string(),
            })?;
            Ok(match kind {
                RequestType::AddSub => Request::AddSub { topic },
                RequestType::RmSub => Request::RmSub { topic },
                RequestType::AddPub => Request::AddPub { topic },
                _ => Request::RmPub { topic },
            })
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
