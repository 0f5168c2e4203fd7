//! The escrow decision engine.
//!
//! Three-way dispatch per request, in strict priority order:
//! 1. serve-from-escrow — GET carrying a valid token for a stored entry;
//! 2. store-and-redirect — POST to a route flagged as an escrow route;
//! 3. pass-through — everything else, forwarded untouched.
//!
//! The engine owns the escrow entry lifecycle (create, consume, reject) and
//! speaks only to the store and classifier traits plus plain
//! request/response structs; nothing here depends on the HTTP framework.

use std::time::Duration;

use http::Method;

use crate::config::EscrowConfig;
use crate::error::EngineError;
use crate::escrow::entry::{EscrowResponse, StoredEscrow};
use crate::escrow::token::{escrow_key, EscrowToken};
use crate::rewrite::DomainRewriter;
use crate::routes::RouteClassifier;
use crate::store::EscrowStore;

/// Engine-facing view of an inbound request.
#[derive(Debug, Clone)]
pub struct EscrowRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub cookie: Option<String>,
}

/// What the engine decided for a request. Variants are mutually exclusive;
/// a GET with a valid token always wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// A stored entry exists for this token; consume and serve it.
    ServeFromEscrow(EscrowToken),
    /// Escrow route: compute downstream, store the result, redirect.
    StoreAndRedirect,
    /// Forward untouched.
    PassThrough,
}

pub struct EscrowEngine<S, C> {
    store: S,
    classifier: C,
    rewriter: DomainRewriter,
    ttl: Duration,
    data_key: String,
    key_prefix: String,
}

impl<S: EscrowStore, C: RouteClassifier> EscrowEngine<S, C> {
    pub fn new(store: S, classifier: C, rewriter: DomainRewriter, escrow: &EscrowConfig) -> Self {
        Self {
            store,
            classifier,
            rewriter,
            ttl: Duration::from_secs(escrow.ttl_secs),
            data_key: escrow.data_key.clone(),
            key_prefix: escrow.key_prefix.clone(),
        }
    }

    /// Extract the token from the transport the current domain mode uses:
    /// cookie when the domains coincide, query parameter when they differ
    /// (cross-domain cookies are not delivered back).
    fn token(&self, request: &EscrowRequest) -> Option<EscrowToken> {
        if self.rewriter.single_domain() {
            request
                .cookie
                .as_deref()
                .and_then(|header| EscrowToken::from_cookie_header(header, &self.data_key))
        } else {
            request
                .query
                .as_deref()
                .and_then(|query| EscrowToken::from_query(query, &self.data_key))
        }
    }

    /// Classify the request. Side-effect-free: the store is only consulted
    /// (via `exists`) when a GET actually carries a token, and a routing
    /// miss is a normal negative.
    pub async fn decide(&self, request: &EscrowRequest) -> Result<Decision, EngineError> {
        if request.method == Method::GET {
            if let Some(token) = self.token(request) {
                let key = escrow_key(&self.key_prefix, &token.id);
                if self.store.exists(&key).await? {
                    return Ok(Decision::ServeFromEscrow(token));
                }
            }
        }

        if request.method == Method::POST {
            let escrow_route = self
                .classifier
                .resolve(&request.path, &request.method)
                .is_some_and(|descriptor| descriptor.escrow);
            if escrow_route {
                return Ok(Decision::StoreAndRedirect);
            }
        }

        Ok(Decision::PassThrough)
    }

    /// Consume the entry for a token and return the escrowed response.
    ///
    /// Compare first, consume second: the nonce is validated against a plain
    /// read, and a mismatch returns 403 without touching the store — the
    /// entry stays exactly as created, keeping its original expiry, so a
    /// guesser probing with the right id can neither burn nor prolong the
    /// legitimate holder's token. Only a validated request consumes, via the
    /// atomic `take`, so a racing duplicate GET observes absence. `None`
    /// means the entry vanished between `decide` and now (consumed or
    /// expired); callers fall through to pass-through.
    pub async fn serve_from_escrow(
        &self,
        token: &EscrowToken,
    ) -> Result<Option<EscrowResponse>, EngineError> {
        let key = escrow_key(&self.key_prefix, &token.id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        if StoredEscrow::decode(&raw)?.nonce != token.nonce {
            tracing::warn!(id = %token.id, "escrow nonce mismatch, entry untouched");
            return Ok(Some(EscrowResponse::new(403)));
        }

        let Some(raw) = self.store.take(&key).await? else {
            return Ok(None);
        };
        let stored = StoredEscrow::decode(&raw)?;
        if stored.nonce != token.nonce {
            // The key changed hands between the read and the take; what was
            // consumed is not what was validated, so serve nothing.
            tracing::warn!(id = %token.id, "escrow entry changed during consume");
            return Ok(Some(EscrowResponse::new(403)));
        }

        tracing::debug!(id = %token.id, status = stored.response.status, "serving escrowed response");
        Ok(Some(stored.response))
    }

    /// Store a computed downstream response under a fresh token and build
    /// the 303 redirect that carries the token back to the client.
    pub async fn store_and_redirect(
        &self,
        request: &EscrowRequest,
        mut downstream: EscrowResponse,
    ) -> Result<EscrowResponse, EngineError> {
        let token = EscrowToken::generate();

        // A downstream redirect aimed at the secure domain must bounce the
        // client back to the insecure one.
        let location_rewrite = downstream
            .headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("location"))
            .and_then(|(name, value)| {
                self.rewriter
                    .rewrite_location(value)
                    .map(|rewritten| (name.clone(), rewritten))
            });
        if let Some((name, rewritten)) = location_rewrite {
            downstream.headers.insert(name, rewritten);
        }

        let stored = StoredEscrow {
            nonce: token.nonce.clone(),
            response: downstream,
        };
        let key = escrow_key(&self.key_prefix, &token.id);
        self.store.set(&key, &stored.encode()?).await?;
        self.store.expire(&key, self.ttl).await?;

        let mut location = self.rewriter.redirect_location(&request.path);
        let mut redirect = EscrowResponse::new(303);
        if self.rewriter.single_domain() {
            redirect.headers.insert(
                "Set-Cookie".to_string(),
                format!("{}={}", self.data_key, token.encode()),
            );
        } else {
            let separator = if location.contains('?') { '&' } else { '?' };
            location = format!(
                "{location}{separator}{}={}",
                self.data_key,
                token.encode()
            );
        }
        redirect.headers.insert("Location".to_string(), location);
        redirect.body = vec![String::new()];

        tracing::debug!(id = %token.id, path = %request.path, "stored response in escrow");
        Ok(redirect)
    }
}
