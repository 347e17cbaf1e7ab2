use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::watch};
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        Message,
    },
};
use tracing::{debug, info, trace, warn};

use super::{handshake::credentials_from_query, server::shutdown_requested};
use crate::{
    broker::{ChannelSink, ClientSink, Dispatcher},
    identity::ClientId,
};

/// Параметры обработки одного соединения.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionOptions {
    /// Глубина очереди записи, после которой пишется предупреждение
    pub write_channel_hint: usize,
}

/// Снимает клиента с учёта при любом выходе из цикла чтения, включая
/// панику и отмену задачи.
struct DisconnectGuard {
    dispatcher: Dispatcher,
    id: ClientId,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        self.dispatcher.on_disconnect(&self.id);
    }
}

/// Обслуживает одно WebSocket-соединение от рукопожатия до закрытия.
///
/// Задача-писатель вычитывает сериализованные конверты из канала
/// приёмника; цикл чтения передаёт кадры в диспетчер. Закрытие сокета,
/// ошибка чтения или сигнал остановки завершают соединение и снимают
/// клиента с учёта.
pub async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Dispatcher,
    options: ConnectionOptions,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut query = None;
    let ws = accept_hdr_async(stream, |req: &Request, resp: Response| {
        query = req.uri().query().map(str::to_string);
        Ok::<Response, ErrorResponse>(resp)
    })
    .await
    .with_context(|| format!("WebSocket handshake with {peer} failed"))?;

    let credentials = credentials_from_query(query.as_deref(), peer);
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (sink, mut rx) = ChannelSink::pair(peer.to_string());

    let hint = options.write_channel_hint;
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let backlog = rx.len();
            if backlog > hint {
                warn!(%peer, backlog, "write queue above hint");
            }
            if let Err(e) = ws_tx.send(Message::Text(frame)).await {
                debug!(%peer, error = %e, "write failed, stopping writer");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let sink: Arc<dyn ClientSink> = Arc::new(sink);
    let accepted = dispatcher.on_connect(&credentials, sink);

    let id = match accepted {
        Ok(id) => id,
        Err(_) => {
            // приёмник не зарегистрирован: писатель отправит отказ и закроет сокет
            let _ = writer.await;
            return Ok(());
        }
    };

    let guard = DisconnectGuard {
        dispatcher: dispatcher.clone(),
        id: id.clone(),
    };

    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            _ = shutdown_requested(&mut shutdown) => {
                debug!(client = %id, "shutdown signal, closing connection");
                break;
            }
        };

        match frame {
            Some(Ok(Message::Text(text))) => dispatcher.on_message(&id, &text).await,
            Some(Ok(Message::Binary(bytes))) => {
                let text = String::from_utf8_lossy(&bytes);
                dispatcher.on_message(&id, &text).await;
            }
            Some(Ok(Message::Close(reason))) => {
                debug!(client = %id, ?reason, "close frame received");
                break;
            }
            Some(Ok(other)) => trace!(client = %id, kind = ?other, "control frame"),
            Some(Err(e)) => {
                debug!(client = %id, error = %e, "read error");
                break;
            }
            None => break,
        }
    }

    drop(guard);
    if writer.await.is_err() {
        warn!(client = %id, "writer task panicked");
    }
    info!(client = %id, %peer, "connection closed");
    Ok(())
}
