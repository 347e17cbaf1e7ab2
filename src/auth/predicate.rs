use std::collections::HashMap;

/// Параметры рукопожатия: query-параметры URL плюс адрес пира в `ip`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    params: HashMap<String, String>,
}

/// Решение о допуске соединения.
///
/// Вызывается один раз на соединение, до выдачи идентификатора.
pub trait AuthPredicate: Send + Sync + 'static {
    fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> bool;
}

/// Пропускает всех (`auth.allow_anonymous = true`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Credentials {
    /// Параметры и адрес пира. Значение `ip` из query перезаписывается
    /// реальным адресом.
    pub fn from_pairs<I>(
        pairs: I,
        peer: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params: HashMap<String, String> = pairs.into_iter().collect();
        params.insert("ip".to_string(), peer.into());
        Self { params }
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn peer(&self) -> &str {
        self.get("ip").unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<F> AuthPredicate for F
where
    F: Fn(&Credentials) -> bool + Send + Sync + 'static,
{
    fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> bool {
        self(credentials)
    }
}

impl AuthPredicate for AllowAll {
    fn authenticate(
        &self,
        _credentials: &Credentials,
    ) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_overrides_query_ip() {
        let creds = Credentials::from_pairs(
            vec![("ip".to_string(), "spoofed".to_string())],
            "10.1.1.1:80",
        );
        assert_eq!(creds.peer(), "10.1.1.1:80");
    }

    #[test]
    fn test_closure_predicate() {
        let only_terminals = |c: &Credentials| c.get("type") == Some("terminal");
        let ok = Credentials::from_pairs(vec![("type".into(), "terminal".into())], "x");
        let no = Credentials::from_pairs(Vec::new(), "x");
        assert!(only_terminals.authenticate(&ok));
        assert!(!only_terminals.authenticate(&no));
        assert!(AllowAll.authenticate(&no));
    }
}
