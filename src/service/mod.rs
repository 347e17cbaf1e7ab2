//! Реестр удалённых процедур.
//!
//! - `registry`: трейт [`Service`], неизменяемый [`ServiceRegistry`] и его
//!   builder.
//! - `builtin`: встроенные сервисы `/rach/ping`, `/rach/echo`,
//!   `/rach/clients`.

pub mod builtin;
pub mod registry;

pub use builtin::{CLIENTS_TOPIC, ECHO_TOPIC, PING_TOPIC};
pub use registry::*;
