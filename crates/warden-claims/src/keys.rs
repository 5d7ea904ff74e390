//! Issuer signing key retrieval with cached JWKS.
//!
//! # Purpose
//! Resolve the public key an issuer used to sign a token, by issuer URL and
//! key id, from `{issuer}/.well-known/jwks.json`.
//!
//! # Key invariants
//! - Key sets are cached per issuer for a bounded TTL.
//! - A key id missing from a cached set triggers exactly one refetch before
//!   `UnknownKeyId` is returned.
//! - Fetch failures are surfaced immediately; nothing here retries.
//!
//! # Concurrency model
//! The cache is a `DashMap` shared by clones of the provider, so concurrent
//! requests read and refresh it without a global lock.
use crate::{ClaimsError, ClaimsResult};
use async_trait::async_trait;
use dashmap::DashMap;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of issuer public keys.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// The JWK with id `kid` published by `issuer`.
    ///
    /// # Errors
    /// - `ClaimsError::UnknownKeyId` if the issuer does not publish `kid`.
    /// - `ClaimsError::KeyFetch` if the key set cannot be retrieved.
    async fn jwk(&self, issuer: &str, kid: &str) -> ClaimsResult<Jwk>;
}

/// Fixed key set, for tests and pinned deployments. Ignores the issuer.
#[async_trait]
impl KeyProvider for JwkSet {
    async fn jwk(&self, _issuer: &str, kid: &str) -> ClaimsResult<Jwk> {
        find_jwk(self, kid)
            .cloned()
            .ok_or_else(|| ClaimsError::UnknownKeyId(kid.to_string()))
    }
}

#[async_trait]
impl<T: KeyProvider + ?Sized> KeyProvider for Arc<T> {
    async fn jwk(&self, issuer: &str, kid: &str) -> ClaimsResult<Jwk> {
        (**self).jwk(issuer, kid).await
    }
}

#[derive(Debug, Clone)]
struct CachedJwks {
    jwks: JwkSet,
    expires_at: Instant,
}

/// Fetches `{issuer}/.well-known/jwks.json` over HTTP and caches the result.
#[derive(Debug, Clone)]
pub struct JwksKeyProvider {
    client: reqwest::Client,
    cache: Arc<DashMap<String, CachedJwks>>,
    ttl: Duration,
}

impl Default for JwksKeyProvider {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}

impl JwksKeyProvider {
    pub fn new(ttl: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), ttl)
    }

    pub fn with_client(client: reqwest::Client, ttl: Duration) -> Self {
        Self {
            client,
            cache: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Key set location for an issuer.
    pub fn jwks_url(issuer: &str) -> String {
        format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/'))
    }

    async fn get_jwks(&self, url: &str) -> ClaimsResult<JwkSet> {
        if let Some(entry) = self.cache.get(url)
            && entry.expires_at > Instant::now()
        {
            return Ok(entry.jwks.clone());
        }
        self.refresh_jwks(url).await
    }

    async fn refresh_jwks(&self, url: &str) -> ClaimsResult<JwkSet> {
        tracing::debug!(url, "fetching issuer key set");
        let jwks: JwkSet = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        self.cache.insert(
            url.to_string(),
            CachedJwks {
                jwks: jwks.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(jwks)
    }
}

#[async_trait]
impl KeyProvider for JwksKeyProvider {
    async fn jwk(&self, issuer: &str, kid: &str) -> ClaimsResult<Jwk> {
        let url = Self::jwks_url(issuer);
        let jwks = self.get_jwks(&url).await?;
        if let Some(key) = find_jwk(&jwks, kid) {
            return Ok(key.clone());
        }
        // Rotated keys show up under a new kid before our TTL runs out.
        let refreshed = self.refresh_jwks(&url).await?;
        find_jwk(&refreshed, kid)
            .cloned()
            .ok_or_else(|| ClaimsError::UnknownKeyId(kid.to_string()))
    }
}

pub(crate) fn find_jwk<'a>(jwks: &'a JwkSet, kid: &str) -> Option<&'a Jwk> {
    jwks.keys
        .iter()
        .find(|key| key.common.key_id.as_deref() == Some(kid))
}
