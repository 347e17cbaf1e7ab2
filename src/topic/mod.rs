//! Иерархическое дерево топиков.
//!
//! - `path`: каноническая форма топиков и разрешение относительно
//!   пространства имён.
//! - `tree`: индекс подписчиков и издателей с обходом предков при
//!   публикации.

pub mod path;
pub mod tree;

pub use path::{normalize, resolve, ROOT};
pub use tree::*;
