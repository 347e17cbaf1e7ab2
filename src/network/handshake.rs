use std::net::SocketAddr;

use url::form_urlencoded;

use crate::auth::Credentials;

/// Собирает параметры рукопожатия из query-строки URI запроса.
///
/// Повторяющийся ключ: побеждает последнее значение. `ip` всегда равен
/// IP-адресу пира, без порта.
pub fn credentials_from_query(
    query: Option<&str>,
    peer: SocketAddr,
) -> Credentials {
    let pairs = query
        .map(|q| {
            form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    Credentials::from_pairs(pairs, peer.ip().to_string())
}
