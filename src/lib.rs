/// Handshake credentials and authentication predicates.
pub mod auth;
/// Dispatcher, client registry and the in-process loopback.
pub mod broker;
/// WebSocket client library and request correlation.
pub mod client;
/// Layered settings loading.
pub mod config;
/// Client and settings error types.
pub mod error;
/// Connection identities.
pub mod identity;
/// Structured logging setup (console and rolling file sinks).
pub mod logging;
/// WebSocket server, handshake and startup banner.
pub mod network;
/// Wire envelopes and request parsing.
pub mod protocol;
/// Named RPC services and the built-in `/rach/*` set.
pub mod service;
/// Hierarchical topic tree and topic normalization.
pub mod topic;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

pub use auth::{
    hash_password, verify_password, AllowAll, AuthPredicate, Credentials, PasswordAuthenticator,
};
pub use broker::{ChannelSink, ClientSink, Dispatcher, DispatcherBuilder, LocalClient};
pub use client::{ClientConfig, ConnectionState, Publisher, RachClient};
pub use config::{Settings, UserConfig};
pub use error::{ClientError, ClientResult, SettingsError};
pub use identity::ClientId;
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
pub use network::{run_server, serve};
pub use protocol::{ClientEnvelope, Publication, Request, RequestType, ServerEnvelope};
pub use rach_error::{ErrorExt, StatusCode};
pub use service::{Service, ServiceContext, ServiceRegistry};
pub use topic::{normalize, TopicTree};
