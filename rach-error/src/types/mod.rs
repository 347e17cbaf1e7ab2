pub mod auth;
pub mod network;
pub mod protocol;
pub mod service;

// Публичный экспорт всех типов ошибок из вложенных модулей, чтобы упростить
// доступ к ним из внешнего кода.
pub use auth::*;
pub use network::*;
pub use protocol::*;
pub use service::*;
