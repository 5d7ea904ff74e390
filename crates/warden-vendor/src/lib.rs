//! Tenant-scoped temporary credential vending.
//!
//! # Purpose
//! Exchanges an established tenant identity plus a tenant-scoped session
//! policy for short-lived credentials from a trusted token-issuing authority.
//!
//! # Architectural role
//! Composes `warden-claims` (who is calling) and `warden-policy` (what they
//! may touch) behind the [`TokenVendor`], with three strategies:
//! - [`DeclaredIdentity`]: tenant supplied by an already-authenticating layer.
//! - [`BearerToken`]: tenant read from a verified bearer token.
//! - [`FederatedIdentity`]: tenant and identity pool read from a bearer token,
//!   role and web identity token obtained from the pool.
//!
//! # Security boundary
//! The session policy can only narrow a role's permissions. A blank policy
//! is refused before the authority is contacted.
//!
//! # How to use
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden_policy::DeclarativePolicyGenerator;
//! use warden_vendor::aws::{AwsEndpoints, CredentialsChain, StsClient};
//! use warden_vendor::{CallerContext, DeclaredIdentity, TokenVendor};
//!
//! async fn vend() -> Result<(), warden_vendor::VendError> {
//!     let client = reqwest::Client::new();
//!     let sts = StsClient::with_credentials_provider(
//!         client.clone(),
//!         AwsEndpoints::default(),
//!         Arc::new(CredentialsChain::standard(client)),
//!     );
//!     let vendor = TokenVendor::new(
//!         Arc::new(DeclaredIdentity::new("arn:aws:iam::123456789012:role/tenant-role")),
//!         DeclarativePolicyGenerator::new().dynamo_leading_key("employee"),
//!         Arc::new(sts),
//!     );
//!     let credentials = vendor.vend_token(&CallerContext::declared("t1")).await?;
//!     println!("{}", credentials.access_key_id);
//!     Ok(())
//! }
//! ```
pub mod aws;
pub mod credentials;
pub mod errors;
pub mod exchange;
pub mod identity_pool;
pub mod vendor;

pub use credentials::ScopedCredentials;
pub use errors::{ExchangeError, ExchangeResult, FailureClass, VendError, VendResult};
pub use exchange::{AssumeRoleRequest, CredentialExchange, exchange_credentials};
pub use identity_pool::{AUTHENTICATED_ROLE, FederatedGrant, IdentityPool, federate};
pub use vendor::{
    BearerToken, CallerContext, DEFAULT_DURATION_SECONDS, DeclaredIdentity, FederatedIdentity,
    RoleGrant, TokenVendor, VendingStrategy,
};
