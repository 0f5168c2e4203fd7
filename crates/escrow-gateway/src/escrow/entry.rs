//! Stored-entry wire format.
//!
//! An escrowed response is kept in the store as a JSON document
//! `{nonce, response}` where the response is a (status, headers, body)
//! triple with the body as a sequence of string chunks. The document must
//! round-trip byte-for-byte through the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A complete HTTP response in engine-facing form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<String>,
}

impl EscrowResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    /// The concatenated body.
    pub fn body_text(&self) -> String {
        self.body.concat()
    }
}

/// The document stored under `escrow_key(id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEscrow {
    pub nonce: String,
    pub response: EscrowResponse,
}

impl StoredEscrow {
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decode a stored document. Failure means store corruption; callers
    /// fail closed rather than serving the raw value.
    pub fn decode(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_store_value() {
        let mut response = EscrowResponse::new(200);
        response
            .headers
            .insert("content-type".to_string(), "text/html".to_string());
        response.body = vec!["<p>".to_string(), "ok".to_string(), "</p>".to_string()];

        let stored = StoredEscrow {
            nonce: "abcd1234".to_string(),
            response,
        };
        let encoded = stored.encode().unwrap();
        let decoded = StoredEscrow::decode(&encoded).unwrap();
        assert_eq!(decoded, stored);
        assert_eq!(decoded.encode().unwrap(), encoded);
    }

    #[test]
    fn test_decode_fails_closed_on_garbage() {
        assert!(StoredEscrow::decode("not json").is_err());
        assert!(StoredEscrow::decode(r#"{"nonce":"n"}"#).is_err());
    }

    #[test]
    fn test_body_text_concatenates_chunks() {
        let mut response = EscrowResponse::new(200);
        response.body = vec!["a".to_string(), "b".to_string()];
        assert_eq!(response.body_text(), "ab");
    }
}
