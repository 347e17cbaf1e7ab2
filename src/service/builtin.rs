use async_trait::async_trait;
use rach_error::ServiceError;
use serde_json::Value;

use super::{Service, ServiceContext, ServiceRegistryBuilder};

pub const PING_TOPIC: &str = "/rach/ping";
pub const ECHO_TOPIC: &str = "/rach/echo";
pub const CLIENTS_TOPIC: &str = "/rach/clients";

/// `/rach/ping` → `"pong"`.
pub struct Ping;

/// `/rach/echo` → массив аргументов без изменений.
pub struct Echo;

/// `/rach/clients` → снимки подключённых клиентов.
pub struct Clients;

#[async_trait]
impl Service for Ping {
    async fn call(
        &self,
        _ctx: ServiceContext,
        _args: Vec<Value>,
    ) -> Result<Value, ServiceError> {
        Ok(Value::String("pong".to_string()))
    }
}

#[async_trait]
impl Service for Echo {
    async fn call(
        &self,
        _ctx: ServiceContext,
        args: Vec<Value>,
    ) -> Result<Value, ServiceError> {
        Ok(Value::Array(args))
    }
}

#[async_trait]
impl Service for Clients {
    async fn call(
        &self,
        ctx: ServiceContext,
        _args: Vec<Value>,
    ) -> Result<Value, ServiceError> {
        serde_json::to_value(ctx.clients()).map_err(|e| ServiceError::failed(e.to_string()))
    }
}

impl ServiceRegistryBuilder {
    /// Добавляет встроенные сервисы `/rach/*`.
    pub fn with_builtins(self) -> Self {
        self.register(PING_TOPIC, Ping)
            .register(ECHO_TOPIC, Echo)
            .register(CLIENTS_TOPIC, Clients)
    }
}
