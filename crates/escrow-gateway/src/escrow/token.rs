//! Escrow token codec.
//!
//! A token is an `(id, nonce)` pair carried on the wire as `id.nonce` under
//! a fixed cookie/query key. The id addresses the stored entry; the nonce is
//! the secret compared against the stored value, so a leaked id alone never
//! grants retrieval.

use rand::Rng;
use uuid::Uuid;

/// One escrow token. Both halves are opaque ASCII with no embedded `.`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowToken {
    pub id: String,
    pub nonce: String,
}

impl EscrowToken {
    /// Generate a fresh token: UUID v4 id, 4 CSPRNG bytes as 8 hex chars.
    pub fn generate() -> Self {
        let nonce_bytes: [u8; 4] = rand::thread_rng().gen();
        let nonce = nonce_bytes
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>();
        Self {
            id: Uuid::new_v4().to_string(),
            nonce,
        }
    }

    /// Wire encoding: `id.nonce`.
    pub fn encode(&self) -> String {
        format!("{}.{}", self.id, self.nonce)
    }

    /// Parse the wire encoding. Malformed input is `None`, never an error.
    pub fn parse(raw: &str) -> Option<Self> {
        let (id, nonce) = raw.split_once('.')?;
        if id.is_empty() || nonce.is_empty() || nonce.contains('.') {
            return None;
        }
        Some(Self {
            id: id.to_string(),
            nonce: nonce.to_string(),
        })
    }

    /// Extract a token from a `Cookie` request header.
    pub fn from_cookie_header(header: &str, data_key: &str) -> Option<Self> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == data_key)
            .and_then(|(_, value)| Self::parse(value))
    }

    /// Extract a token from a raw query string.
    pub fn from_query(query: &str, data_key: &str) -> Option<Self> {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == data_key)
            .and_then(|(_, value)| Self::parse(value))
    }
}

/// Derive the store key for an id: fixed namespace prefix + id.
pub fn escrow_key(prefix: &str, id: &str) -> String {
    format!("{prefix}{id}")
}
