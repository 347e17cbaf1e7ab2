//! Ядро брокера.
//!
//! - `dispatcher`: разбор, маршрутизация и рассылка; владеет деревом
//!   топиков и реестром клиентов под одной блокировкой.
//! - `clients`: реестр идентификатор → приёмник со счётчиками.
//! - `sink`: трейт доставки [`ClientSink`] и сетевой [`ChannelSink`].
//! - `loopback`: локальная петля процесса-хоста и [`LocalClient`].

pub mod clients;
pub mod dispatcher;
pub mod loopback;
pub mod sink;

pub use clients::*;
pub use dispatcher::*;
pub use loopback::*;
pub use sink::*;
