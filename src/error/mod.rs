pub mod client;
pub mod settings;

pub use client::{ClientError, ClientResult};
pub use settings::SettingsError;
