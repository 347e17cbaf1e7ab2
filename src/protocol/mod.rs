//! Формат сообщений брокера.
//!
//! - `envelope`: JSON-конверты в обе стороны и их конструкторы.
//! - `parser`: разбор и проверка входящего конверта в [`Request`].

pub mod envelope;
pub mod parser;

pub use envelope::*;
pub use parser::*;
