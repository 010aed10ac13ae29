use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{AdminCredential, CredentialEntry};

/// Length of a SHA-256 digest in hex characters.
pub const HASH_HEX_LEN: usize = 64;

/// hash_password
///
/// One-way digest shared by the snapshot loader and the login check:
/// lowercase hex SHA-256 of the UTF-8 password.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compares two digests without short-circuiting on the first differing byte.
pub fn digest_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// resolve_entry
///
/// Turns a raw snapshot entry into a credential. A well-formed `passwordHash`
/// wins; otherwise a plaintext `password` is hashed. Entries carrying neither
/// are dropped.
pub fn resolve_entry(entry: CredentialEntry) -> Option<AdminCredential> {
    let id = entry.id.trim().to_string();
    if id.is_empty() {
        return None;
    }

    let password_hash = match (entry.password_hash, entry.password) {
        (Some(hash), _) if is_hex_digest(&hash) => hash.to_ascii_lowercase(),
        (_, Some(plain)) => hash_password(&plain),
        _ => return None,
    };

    Some(AdminCredential { id, password_hash })
}

fn is_hex_digest(value: &str) -> bool {
    value.len() == HASH_HEX_LEN && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// CredentialStore
///
/// Admin id → password hash, built once at startup from the local snapshot and
/// never mutated afterwards. Shared read-only through [`CredentialState`].
#[derive(Debug, Default)]
pub struct CredentialStore {
    entries: HashMap<String, AdminCredential>,
}

impl CredentialStore {
    pub fn new(entries: HashMap<String, AdminCredential>) -> Self {
        Self { entries }
    }

    /// Builds the store from already-resolved credentials. Later duplicates of an id are ignored.
    pub fn from_credentials(credentials: impl IntoIterator<Item = AdminCredential>) -> Self {
        let mut entries = HashMap::new();
        for credential in credentials {
            entries.entry(credential.id.clone()).or_insert(credential);
        }
        Self { entries }
    }

    pub fn get(&self, id: &str) -> Option<&AdminCredential> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type CredentialState = Arc<CredentialStore>;
