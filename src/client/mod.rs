//! Клиентская библиотека брокера.
//!
//! - `connection`: [`RachClient`] поверх WebSocket.
//! - `correlator`: сопоставление ответов запросам и таблица подписок.
//! - `publisher`: handle права публикации.

pub mod connection;
pub mod correlator;
pub mod publisher;

pub use connection::{ClientConfig, ConnectionState, RachClient};
pub use correlator::{Correlator, Routed, SubscriptionCallback};
pub use publisher::Publisher;
