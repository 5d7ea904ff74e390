//! Bearer token verification and tenant identity extraction.
//!
//! # Purpose
//! Establishes who is calling before any credentials are vended: locates the
//! bearer token in request headers, verifies it against the issuer's published
//! key set, and reduces the verified claims to a [`TenantIdentity`].
//!
//! # Architectural role
//! The trust boundary of the vending flow. Downstream crates only ever see a
//! `TenantIdentity`, never a raw claim map.
//!
//! # How to use
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use warden_claims::{ClaimsExtractor, JwksKeyProvider};
//!
//! async fn tenant_of(headers: &HashMap<String, String>) -> Option<String> {
//!     let extractor = ClaimsExtractor::new(
//!         Arc::new(JwksKeyProvider::default()),
//!         ["https://cognito-idp.us-east-1.amazonaws.com/us-east-1_Example"],
//!     );
//!     let identity = extractor.extract_tenant_identity(headers).await.ok()?;
//!     Some(identity.tenant_id().to_string())
//! }
//! ```
pub mod errors;
pub mod extractor;
pub mod headers;
pub mod identity;
pub mod keys;

pub use errors::{ClaimsError, ClaimsErrorKind, ClaimsResult};
pub use extractor::{
    ClaimsConfig, ClaimsExtractor, DEFAULT_IDENTITY_POOL_CLAIM, DEFAULT_TENANT_CLAIM,
    identity_from_claims,
};
pub use headers::{HeaderLookup, bearer_token};
pub use identity::{ClaimSet, TenantIdentity, provider_name};
pub use keys::{JwksKeyProvider, KeyProvider};
