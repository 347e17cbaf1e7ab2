use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::{
    net::TcpListener,
    sync::{watch, Semaphore},
    task::JoinSet,
    time::timeout,
};
use tracing::{debug, error, info, warn};

use super::connection::{handle_connection, ConnectionOptions};
use crate::{broker::Dispatcher, config::Settings};

/// Сколько ждать закрытия соединений после сигнала остановки.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Ограничения цикла приёма соединений.
#[derive(Debug, Clone, Copy)]
pub struct ServerLimits {
    pub max_connections: usize,
    pub connection: ConnectionOptions,
}

impl ServerLimits {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_connections: settings.server.max_connections,
            connection: ConnectionOptions {
                write_channel_hint: settings.server.write_channel_hint,
            },
        }
    }
}

/// Ждёт `true` в канале остановки.
///
/// Значение уже выставлено до вызова: возврат сразу. Закрытый
/// отправитель означает, что остановку больше никто не запросит.
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Слушает адрес из настроек и обслуживает соединения, пока в
/// `shutdown` не появится `true`.
pub async fn run_server(
    settings: &Settings,
    dispatcher: Dispatcher,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let addr = settings.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    serve(
        listener,
        dispatcher,
        ServerLimits::from_settings(settings),
        shutdown,
    )
    .await
}

/// Цикл приёма поверх уже открытого слушателя.
///
/// Соединения сверх `max_connections` закрываются сразу после accept.
pub async fn serve(
    listener: TcpListener,
    dispatcher: Dispatcher,
    limits: ServerLimits,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let local: SocketAddr = listener.local_addr()?;
    let permits = Arc::new(Semaphore::new(limits.max_connections));
    let mut connections = JoinSet::new();

    info!(addr = %local, max_connections = limits.max_connections, "listening");

    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = shutdown_requested(&mut shutdown) => break,
        };

        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                error!(error = %e, "accept failed");
                continue;
            }
        };

        let Ok(permit) = permits.clone().try_acquire_owned() else {
            warn!(%peer, limit = limits.max_connections, "connection limit reached, refusing");
            drop(stream);
            continue;
        };

        debug!(%peer, "accepted tcp connection");
        let dispatcher = dispatcher.clone();
        let shutdown = shutdown.clone();
        connections.spawn(async move {
            if let Err(e) =
                handle_connection(stream, peer, dispatcher, limits.connection, shutdown).await
            {
                debug!(%peer, error = %e, "connection ended with error");
            }
            drop(permit);
        });

        // подбираем завершённые задачи, чтобы JoinSet не рос
        while connections.try_join_next().is_some() {}
    }

    // соединения видят тот же флаг и завершаются сами
    info!(active = connections.len(), "shutting down listener");
    let drained = timeout(DRAIN_TIMEOUT, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!(remaining = connections.len(), "drain timeout, aborting connections");
        connections.abort_all();
    }
    Ok(())
}
