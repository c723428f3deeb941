//! User directory seam.
//!
//! Console accounts and caller keys come from an external store. The static
//! implementation reads them from configuration.

use std::collections::{HashMap, HashSet};

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use serde::Serialize;
use thiserror::Error;

use crate::config::schema::DirectoryConfig;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error("invalid password hash format")]
    InvalidHash,
}

/// Hash `password` into a PHC string with the default Argon2id parameters.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with(&Argon2::default(), password)
}

/// Hash with explicit Argon2 parameters; the PHC string records them.
pub fn hash_password_with(argon2: &Argon2<'_>, password: &str) -> Result<String, PasswordError> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = SaltString::encode_b64(&salt).map_err(|e| PasswordError::Hash(e.to_string()))?;
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Check `password` against a stored PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Whether `hash` is an Argon2 PHC string.
pub fn is_argon2_hash(hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| argon2::Algorithm::try_from(parsed.algorithm).is_ok())
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
    pub active: bool,
}

pub trait UserDirectory: Send + Sync {
    /// The account, if the credentials match. Inactive accounts are returned
    /// so callers can tell a disabled account from a wrong password.
    fn authenticate(&self, username: &str, password: &str) -> Option<Account>;

    fn is_known_caller(&self, caller_key: &str) -> bool;
}

pub struct StaticDirectory {
    accounts: HashMap<String, (String, Account)>,
    caller_keys: HashSet<String>,
}

impl StaticDirectory {
    pub fn from_config(config: &DirectoryConfig) -> Self {
        let accounts = config
            .accounts
            .iter()
            .map(|a| {
                let account = Account {
                    user_id: a.user_id,
                    username: a.username.clone(),
                    is_admin: a.is_admin,
                    active: a.active,
                };
                (a.username.clone(), (a.password_hash.clone(), account))
            })
            .collect();
        Self {
            accounts,
            caller_keys: config.caller_keys.iter().cloned().collect(),
        }
    }
}

impl UserDirectory for StaticDirectory {
    fn authenticate(&self, username: &str, password: &str) -> Option<Account> {
        let (hash, account) = self.accounts.get(username)?;
        match verify_password(password, hash) {
            Ok(true) => Some(account.clone()),
            Ok(false) => None,
            Err(e) => {
                tracing::warn!(username, error = %e, "Stored password hash is unusable");
                None
            }
        }
    }

    fn is_known_caller(&self, caller_key: &str) -> bool {
        self.caller_keys.contains(caller_key)
    }
}

#[cfg(test)]
mod tests {
    use argon2::{Algorithm, Params, Version};

    use super::*;
    use crate::config::schema::AccountConfig;

    fn cheap_hash(password: &str) -> String {
        let params = Params::new(Params::MIN_M_COST, 1, 1, None).unwrap();
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        hash_password_with(&argon2, password).unwrap()
    }

    fn directory() -> StaticDirectory {
        StaticDirectory::from_config(&DirectoryConfig {
            accounts: vec![
                AccountConfig {
                    user_id: 1,
                    username: "admin".into(),
                    password_hash: cheap_hash("s3cret"),
                    is_admin: true,
                    active: true,
                },
                AccountConfig {
                    user_id: 2,
                    username: "former".into(),
                    password_hash: cheap_hash("pw"),
                    is_admin: true,
                    active: false,
                },
                AccountConfig {
                    user_id: 3,
                    username: "broken".into(),
                    password_hash: "not-a-phc-string".into(),
                    is_admin: false,
                    active: true,
                },
            ],
            caller_keys: vec!["sk-live-1".into()],
        })
    }

    #[test]
    fn password_must_match() {
        let dir = directory();
        assert_eq!(dir.authenticate("admin", "s3cret").unwrap().user_id, 1);
        assert!(dir.authenticate("admin", "wrong").is_none());
        assert!(dir.authenticate("nobody", "s3cret").is_none());
    }

    #[test]
    fn unusable_hash_never_authenticates() {
        assert!(directory().authenticate("broken", "not-a-phc-string").is_none());
    }

    #[test]
    fn inactive_accounts_are_returned_as_inactive() {
        let account = directory().authenticate("former", "pw").unwrap();
        assert!(!account.active);
    }

    #[test]
    fn caller_keys() {
        let dir = directory();
        assert!(dir.is_known_caller("sk-live-1"));
        assert!(!dir.is_known_caller("sk-live-2"));
    }

    #[test]
    fn hashes_are_salted_argon2id() {
        let first = hash_password("hunter2").unwrap();
        let second = hash_password("hunter2").unwrap();
        assert!(first.starts_with("$argon2id$"));
        assert_ne!(first, second);
        assert!(verify_password("hunter2", &first).unwrap());
        assert!(verify_password("hunter2", &second).unwrap());
        assert!(!verify_password("hunter3", &first).unwrap());
    }

    #[test]
    fn hash_format_detection() {
        assert!(is_argon2_hash(&cheap_hash("x")));
        assert!(!is_argon2_hash("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"));
        assert!(!is_argon2_hash("$pbkdf2-sha256$i=1000$c2FsdA$aGFzaA"));
    }
}
