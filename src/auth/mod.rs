pub mod password;
pub mod predicate;

pub use password::*;
pub use predicate::*;
