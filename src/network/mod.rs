//! Сетевой слой брокера: WebSocket-сервер поверх TCP.
//!
//! - `server`: цикл приёма с лимитом соединений и остановкой по сигналу.
//! - `connection`: рукопожатие, задача-писатель и цикл чтения.
//! - `handshake`: разбор query-параметров в [`Credentials`](crate::auth::Credentials).
//! - `banner`: стартовый баннер бинарника `rach`.

pub mod banner;
pub mod connection;
pub mod handshake;
pub mod server;

pub use connection::{handle_connection, ConnectionOptions};
pub use handshake::credentials_from_query;
pub use server::{run_server, serve, shutdown_requested, ServerLimits};
