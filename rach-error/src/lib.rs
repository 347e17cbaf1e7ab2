//! Единая система ошибок брокера Rach.
//!
//! - `status_code`: числовые коды статуса и их категории.
//! - `ext`: object-safe трейт [`ErrorExt`], через который любая ошибка
//!   превращается в текст `verbose` для конверта `err`.
//! - `types`: конкретные ошибки разбора, маршрутизации, сервисов,
//!   аутентификации и доставки.

pub mod ext;
pub mod status_code;
pub mod types;

// Publicly re-export all error types and functions from the submodules to
// simplify access from external code.
pub use ext::*;
pub use status_code::*;
pub use types::*;
