//! Bearer token verification and tenant identity extraction.
//!
//! # Purpose
//! Turn inbound request headers into a verified [`ClaimSet`] and then into a
//! [`TenantIdentity`] carrying the tenant id and, for federated flows, the
//! identity pool id and provider login map.
//!
//! # Key invariants
//! - Only the issuer is read before signature verification, to pick the key
//!   set. Every other claim is trusted only after `decode` succeeds.
//! - `token_use` must equal `id`; access tokens are rejected.
//! - Expiry and not-before are enforced with a bounded leeway; audience is
//!   not checked because identity tokens carry per-client audiences.
//! - Failures are returned immediately. Nothing in this module retries.
//!
//! # Security model and threat assumptions
//! - Attackers may craft tokens naming any issuer. Only issuers listed in
//!   `ClaimsConfig::allowed_issuers` have their key sets fetched; an empty
//!   list rejects every token before any network call.
//! - Unverified extraction exists for non-production setups only and logs a
//!   warning every time it is used.
use crate::headers::{HeaderLookup, bearer_token};
use crate::identity::{ClaimSet, TenantIdentity, provider_name};
use crate::keys::KeyProvider;
use crate::{ClaimsError, ClaimsResult};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_TENANT_CLAIM: &str = "custom:tenant_id";
pub const DEFAULT_IDENTITY_POOL_CLAIM: &str = "custom:identity_pool";

/// Claim names and verification knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsConfig {
    pub tenant_claim: String,
    pub identity_pool_claim: String,
    /// Seconds of clock skew tolerated for `exp` and `nbf`.
    pub leeway_seconds: u64,
    pub allowed_algorithms: Vec<Algorithm>,
    /// Issuers whose key sets may be fetched. Empty trusts no issuer.
    pub allowed_issuers: Vec<String>,
}

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self {
            tenant_claim: DEFAULT_TENANT_CLAIM.to_string(),
            identity_pool_claim: DEFAULT_IDENTITY_POOL_CLAIM.to_string(),
            leeway_seconds: 60,
            allowed_algorithms: vec![Algorithm::RS256],
            allowed_issuers: Vec::new(),
        }
    }
}

impl ClaimsConfig {
    pub fn allow_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.allowed_issuers.push(issuer.into());
        self
    }

    /// Whether `issuer` is on the allow-list, ignoring a trailing slash.
    pub fn trusts_issuer(&self, issuer: &str) -> bool {
        let issuer = issuer.trim_end_matches('/');
        self.allowed_issuers
            .iter()
            .any(|candidate| candidate.trim_end_matches('/') == issuer)
    }
}

/// Verifies bearer tokens against issuer key sets and reads tenant claims.
#[derive(Clone)]
pub struct ClaimsExtractor {
    keys: Arc<dyn KeyProvider>,
    config: ClaimsConfig,
}

impl std::fmt::Debug for ClaimsExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimsExtractor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClaimsExtractor {
    /// Extractor with default claim names trusting exactly `issuers`.
    pub fn new<I, S>(keys: Arc<dyn KeyProvider>, issuers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let config = ClaimsConfig {
            allowed_issuers: issuers.into_iter().map(Into::into).collect(),
            ..ClaimsConfig::default()
        };
        Self::with_config(keys, config)
    }

    pub fn with_config(keys: Arc<dyn KeyProvider>, config: ClaimsConfig) -> Self {
        Self { keys, config }
    }

    pub fn config(&self) -> &ClaimsConfig {
        &self.config
    }

    /// Verified claims of the bearer token in `headers`.
    ///
    /// # Errors
    /// - `MissingAuthorization` / `MalformedToken` for header problems.
    /// - Verification variants (`Jwt`, `KeyFetch`, `UnknownKeyId`, ...) when the
    ///   token cannot be verified.
    /// - `WrongTokenType` unless `token_use` is `id`.
    pub async fn extract_raw_claims<H>(&self, headers: &H) -> ClaimsResult<ClaimSet>
    where
        H: HeaderLookup + Sync + ?Sized,
    {
        let token = bearer_token(headers)?;
        self.verify_token(token).await
    }

    /// Verify a raw token and return its claims.
    pub async fn verify_token(&self, token: &str) -> ClaimsResult<ClaimSet> {
        // Step 1: Check header algorithm and key id before any network work.
        let header = decode_header(token)?;
        if !self.config.allowed_algorithms.contains(&header.alg) {
            tracing::warn!(alg = ?header.alg, "token signed with a disallowed algorithm");
            return Err(ClaimsError::UnsupportedAlgorithm);
        }
        let kid = header.kid.as_deref().ok_or(ClaimsError::MissingKeyId)?;

        // Step 2: Read the issuer without verification to locate its key set.
        let unverified = decode_unverified_claims(token)?;
        let issuer = unverified
            .issuer()
            .ok_or(ClaimsError::MissingIssuer)?
            .to_string();
        if !self.config.trusts_issuer(&issuer) {
            tracing::warn!(issuer = %issuer, "token issuer is not allowed");
            return Err(ClaimsError::IssuerNotAllowed);
        }

        // Step 3: Resolve the signing key and bind a verifier to it.
        let jwk = self.keys.jwk(&issuer, kid).await?;
        ensure_jwk_matches_algorithm(&jwk, header.alg)?;
        let decoding_key = DecodingKey::from_jwk(&jwk)?;

        // Step 4: Verify signature, expiry, not-before and issuer.
        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[issuer.as_str()]);
        validation.validate_aud = false;
        validation.validate_nbf = true;
        validation.leeway = self.config.leeway_seconds;
        let data = decode::<Map<String, Value>>(token, &decoding_key, &validation).map_err(|err| {
            tracing::warn!(issuer = %issuer, error = %err, "token verification failed");
            ClaimsError::from(err)
        })?;

        // Step 5: Only identity tokens carry the tenant attributes.
        let claims = ClaimSet::new(data.claims);
        require_id_token(&claims)?;
        Ok(claims)
    }

    /// Claims of the bearer token in `headers` without signature checks.
    ///
    /// `token_use` is still enforced. Use only where a trusted layer has
    /// already verified the token or in non-production setups.
    pub fn extract_unverified_claims<H>(&self, headers: &H) -> ClaimsResult<ClaimSet>
    where
        H: HeaderLookup + ?Sized,
    {
        let token = bearer_token(headers)?;
        tracing::warn!("reading bearer token claims without signature verification");
        let claims = decode_unverified_claims(token)?;
        require_id_token(&claims)?;
        Ok(claims)
    }

    /// Verified tenant identity from `headers`.
    ///
    /// When `identity_pool_claim` is given the identity also carries the pool
    /// id and a login map of issuer host to the raw bearer token.
    ///
    /// # Errors
    /// - Everything [`ClaimsExtractor::extract_raw_claims`] returns.
    /// - `MissingTenantClaim` / `MissingIdentityPoolClaim` for absent or blank claims.
    pub async fn extract_claims<H>(
        &self,
        headers: &H,
        tenant_claim: &str,
        identity_pool_claim: Option<&str>,
    ) -> ClaimsResult<TenantIdentity>
    where
        H: HeaderLookup + Sync + ?Sized,
    {
        let token = bearer_token(headers)?;
        let claims = self.verify_token(token).await?;
        identity_from_claims(&claims, token, tenant_claim, identity_pool_claim)
    }

    /// Verified tenant-only identity using the configured tenant claim.
    pub async fn extract_tenant_identity<H>(&self, headers: &H) -> ClaimsResult<TenantIdentity>
    where
        H: HeaderLookup + Sync + ?Sized,
    {
        self.extract_claims(headers, &self.config.tenant_claim, None)
            .await
    }

    /// Verified federated identity using the configured claim names.
    pub async fn extract_federated_identity<H>(&self, headers: &H) -> ClaimsResult<TenantIdentity>
    where
        H: HeaderLookup + Sync + ?Sized,
    {
        self.extract_claims(
            headers,
            &self.config.tenant_claim,
            Some(&self.config.identity_pool_claim),
        )
        .await
    }

    /// Tenant-only identity read without signature verification.
    pub fn extract_unverified_identity<H>(&self, headers: &H) -> ClaimsResult<TenantIdentity>
    where
        H: HeaderLookup + ?Sized,
    {
        let token = bearer_token(headers)?;
        let claims = self.extract_unverified_claims(headers)?;
        identity_from_claims(&claims, token, &self.config.tenant_claim, None)
    }
}

/// Build a [`TenantIdentity`] from already verified claims.
pub fn identity_from_claims(
    claims: &ClaimSet,
    token: &str,
    tenant_claim: &str,
    identity_pool_claim: Option<&str>,
) -> ClaimsResult<TenantIdentity> {
    let tenant = claims.non_empty_str(tenant_claim).ok_or_else(|| {
        tracing::warn!(claim = tenant_claim, "token has no tenant id");
        ClaimsError::MissingTenantClaim(tenant_claim.to_string())
    })?;
    let identity = TenantIdentity::new(tenant)?;
    let Some(pool_claim) = identity_pool_claim else {
        return Ok(identity);
    };

    let pool = claims.non_empty_str(pool_claim).ok_or_else(|| {
        tracing::warn!(claim = pool_claim, "token has no identity pool id");
        ClaimsError::MissingIdentityPoolClaim(pool_claim.to_string())
    })?;
    let issuer = claims.issuer().ok_or(ClaimsError::MissingIssuer)?;
    let mut logins = BTreeMap::new();
    logins.insert(provider_name(issuer).to_string(), token.to_string());
    Ok(identity.with_identity_pool(pool, logins))
}

fn require_id_token(claims: &ClaimSet) -> ClaimsResult<()> {
    if claims.is_id_token() {
        return Ok(());
    }
    tracing::warn!(token_use = ?claims.token_use(), "request does not contain an id token");
    Err(ClaimsError::WrongTokenType)
}

fn decode_unverified_claims(token: &str) -> ClaimsResult<ClaimSet> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ClaimsError::MalformedToken("token format".to_string()));
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| ClaimsError::MalformedToken("token payload".to_string()))?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(ClaimSet::new(map)),
        Ok(_) => Err(ClaimsError::MalformedToken("token payload".to_string())),
        Err(err) => Err(ClaimsError::MalformedToken(format!("token payload: {err}"))),
    }
}

fn ensure_jwk_matches_algorithm(jwk: &Jwk, alg: Algorithm) -> ClaimsResult<()> {
    if let Some(key_alg) = jwk.common.key_algorithm {
        let matches = matches!(
            (key_alg, alg),
            (KeyAlgorithm::RS256, Algorithm::RS256)
                | (KeyAlgorithm::RS384, Algorithm::RS384)
                | (KeyAlgorithm::RS512, Algorithm::RS512)
                | (KeyAlgorithm::PS256, Algorithm::PS256)
                | (KeyAlgorithm::PS384, Algorithm::PS384)
                | (KeyAlgorithm::PS512, Algorithm::PS512)
                | (KeyAlgorithm::ES256, Algorithm::ES256)
                | (KeyAlgorithm::ES384, Algorithm::ES384)
        );
        if !matches {
            return Err(ClaimsError::InvalidJwk("alg mismatch".to_string()));
        }
    }
    match (&jwk.algorithm, alg) {
        (
            AlgorithmParameters::RSA(_),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512,
        ) => Ok(()),
        (AlgorithmParameters::EllipticCurve(params), Algorithm::ES256) => {
            if params.curve != EllipticCurve::P256 {
                return Err(ClaimsError::InvalidJwk("unexpected EC curve".to_string()));
            }
            Ok(())
        }
        (AlgorithmParameters::EllipticCurve(params), Algorithm::ES384) => {
            if params.curve != EllipticCurve::P384 {
                return Err(ClaimsError::InvalidJwk("unexpected EC curve".to_string()));
            }
            Ok(())
        }
        _ => Err(ClaimsError::InvalidJwk("kty mismatch".to_string())),
    }
}
