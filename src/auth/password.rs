use std::collections::HashMap;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rach_error::AuthError;
use tracing::debug;

use super::{AuthPredicate, Credentials};
use crate::config::UserConfig;

const PHC_PREFIX: &str = "$argon2";

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let params = Params::new(15_000, 2, 1, None).map_err(|e| AuthError::PasswordHashFailed {
        reason: e.to_string(),
    })?;
    let salt = SaltString::generate(&mut OsRng);

    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHashFailed {
            reason: e.to_string(),
        })
}

/// Проверяет пароль против PHC-строки. Битый хеш даёт `false`.
pub fn verify_password(
    hash: &str,
    password: &str,
) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Проверка `username`/`password` из параметров рукопожатия.
///
/// Открытые пароли из настроек хешируются при загрузке; готовые
/// PHC-строки (`$argon2…`) принимаются как есть.
#[derive(Debug, Clone, Default)]
pub struct PasswordAuthenticator {
    users: HashMap<String, String>,
}

impl PasswordAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_users(users: &[UserConfig]) -> Result<Self, AuthError> {
        let mut auth = Self::new();
        for user in users {
            auth.add_user(&user.username, &user.password)?;
        }
        Ok(auth)
    }

    pub fn add_user(
        &mut self,
        username: &str,
        password_or_hash: &str,
    ) -> Result<(), AuthError> {
        let hash = if password_or_hash.starts_with(PHC_PREFIX) {
            password_or_hash.to_string()
        } else {
            hash_password(password_or_hash)?
        };
        self.users.insert(username.to_string(), hash);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl AuthPredicate for PasswordAuthenticator {
    fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> bool {
        let (Some(user), Some(password)) =
            (credentials.get("username"), credentials.get("password"))
        else {
            debug!(peer = credentials.peer(), "missing username or password");
            return false;
        };

        self.users
            .get(user)
            .is_some_and(|hash| verify_password(hash, password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with(PHC_PREFIX));
        assert!(verify_password(&hash, "s3cret"));
        assert!(!verify_password(&hash, "wrong"));
    }

    #[test]
    fn test_verify_invalid_hash() {
        assert!(!verify_password("invalid_hash", "password"));
    }

    fn creds(pairs: &[(&str, &str)]) -> Credentials {
        Credentials::from_pairs(
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())),
            "127.0.0.1:1000",
        )
    }

    /// Тест проверяет вход по паролю, хешированному при загрузке.
    #[test]
    fn test_authenticator_plaintext_user() {
        let auth = PasswordAuthenticator::from_users(&[UserConfig {
            username: "anton".to_string(),
            password: "pw".to_string(),
        }])
        .unwrap();

        assert!(auth.authenticate(&creds(&[("username", "anton"), ("password", "pw")])));
        assert!(!auth.authenticate(&creds(&[("username", "anton"), ("password", "no")])));
        assert!(!auth.authenticate(&creds(&[("username", "ghost"), ("password", "pw")])));
        assert!(!auth.authenticate(&creds(&[("username", "anton")])));
    }

    #[test]
    fn test_authenticator_prehashed_user() {
        let hash = hash_password("pw").unwrap();
        let mut auth = PasswordAuthenticator::new();
        auth.add_user("svc", &hash).unwrap();
        assert_eq!(auth.len(), 1);
        assert!(auth.authenticate(&creds(&[("username", "svc"), ("password", "pw")])));
    }
}
