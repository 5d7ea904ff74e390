//! Token vending: identity, policy, then credentials.
//!
//! # Purpose
//! One [`TokenVendor`] drives every vend through the same sequence while a
//! [`VendingStrategy`] supplies the variant-specific parts: how the tenant
//! identity is established and which role (and web identity token) the
//! exchange uses.
//!
//! # Key invariants
//! - States advance `Start -> ClaimsVerified -> PolicyAssembled ->
//!   CredentialsIssued`; any failure ends the vend with no credentials.
//! - The policy is generated from a per-request clone of the configured
//!   generator, so tenants never share parameters.
//! - Nothing is cached between vends.
//!
//! # Concurrency model
//! Vendors are immutable after construction and safe to share across tasks.
use crate::exchange::{AssumeRoleRequest, CredentialExchange, exchange_credentials};
use crate::identity_pool::{IdentityPool, federate};
use crate::{ScopedCredentials, VendError, VendResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use warden_claims::{ClaimsExtractor, TenantIdentity};
use warden_policy::DeclarativePolicyGenerator;

/// Session duration used when none is configured.
pub const DEFAULT_DURATION_SECONDS: u32 = 900;

/// What the entry point knows about the caller.
#[derive(Clone, Default)]
pub struct CallerContext {
    headers: http::HeaderMap,
    declared_tenant: Option<String>,
}

impl CallerContext {
    pub fn from_headers(headers: http::HeaderMap) -> Self {
        Self {
            headers,
            declared_tenant: None,
        }
    }

    /// Tenant already authenticated by a trusted upstream layer.
    pub fn declared(tenant: impl Into<String>) -> Self {
        Self {
            headers: http::HeaderMap::new(),
            declared_tenant: Some(tenant.into()),
        }
    }

    pub fn with_declared_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.declared_tenant = Some(tenant.into());
        self
    }

    pub fn headers(&self) -> &http::HeaderMap {
        &self.headers
    }

    pub fn declared_tenant(&self) -> Option<&str> {
        self.declared_tenant.as_deref()
    }
}

impl std::fmt::Debug for CallerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallerContext")
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("declared_tenant", &self.declared_tenant)
            .finish()
    }
}

/// Role to assume and, for federated flows, the token proving the identity.
#[derive(Clone, PartialEq, Eq)]
pub struct RoleGrant {
    pub role_arn: String,
    pub web_identity_token: Option<String>,
}

impl RoleGrant {
    pub fn role(role_arn: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            web_identity_token: None,
        }
    }
}

impl std::fmt::Debug for RoleGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleGrant")
            .field("role_arn", &self.role_arn)
            .field(
                "web_identity_token",
                &self.web_identity_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Variant-specific half of a vend.
#[async_trait]
pub trait VendingStrategy: Send + Sync {
    /// Short label for logs and metrics.
    fn variant(&self) -> &'static str;

    async fn resolve_identity(&self, caller: &CallerContext) -> VendResult<TenantIdentity>;

    async fn role_grant(&self, identity: &TenantIdentity) -> VendResult<RoleGrant>;
}

/// Tenant supplied by an upstream layer that already authenticated the caller.
#[derive(Debug, Clone)]
pub struct DeclaredIdentity {
    role_arn: String,
}

impl DeclaredIdentity {
    pub fn new(role_arn: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
        }
    }
}

#[async_trait]
impl VendingStrategy for DeclaredIdentity {
    fn variant(&self) -> &'static str {
        "declared"
    }

    async fn resolve_identity(&self, caller: &CallerContext) -> VendResult<TenantIdentity> {
        let tenant = caller.declared_tenant().unwrap_or_default();
        Ok(TenantIdentity::new(tenant)?)
    }

    async fn role_grant(&self, _identity: &TenantIdentity) -> VendResult<RoleGrant> {
        Ok(RoleGrant::role(self.role_arn.clone()))
    }
}

/// Tenant read from a bearer token, assuming a fixed role.
#[derive(Debug, Clone)]
pub struct BearerToken {
    extractor: ClaimsExtractor,
    role_arn: String,
    validate_token: bool,
}

impl BearerToken {
    pub fn new(extractor: ClaimsExtractor, role_arn: impl Into<String>) -> Self {
        Self {
            extractor,
            role_arn: role_arn.into(),
            validate_token: true,
        }
    }

    /// Skip signature verification. Non-production use only.
    pub fn validate_token(mut self, validate: bool) -> Self {
        self.validate_token = validate;
        self
    }
}

#[async_trait]
impl VendingStrategy for BearerToken {
    fn variant(&self) -> &'static str {
        "bearer"
    }

    async fn resolve_identity(&self, caller: &CallerContext) -> VendResult<TenantIdentity> {
        if !self.validate_token {
            tracing::warn!("bearer token signature verification is disabled");
            return Ok(self.extractor.extract_unverified_identity(caller.headers())?);
        }
        Ok(self.extractor.extract_tenant_identity(caller.headers()).await?)
    }

    async fn role_grant(&self, _identity: &TenantIdentity) -> VendResult<RoleGrant> {
        Ok(RoleGrant::role(self.role_arn.clone()))
    }
}

/// Tenant and identity pool read from a bearer token, role taken from the
/// pool after federating the caller's login.
#[derive(Clone)]
pub struct FederatedIdentity {
    extractor: ClaimsExtractor,
    pool: Arc<dyn IdentityPool>,
}

impl FederatedIdentity {
    pub fn new(extractor: ClaimsExtractor, pool: Arc<dyn IdentityPool>) -> Self {
        Self { extractor, pool }
    }
}

impl std::fmt::Debug for FederatedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederatedIdentity")
            .field("extractor", &self.extractor)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl VendingStrategy for FederatedIdentity {
    fn variant(&self) -> &'static str {
        "federated"
    }

    async fn resolve_identity(&self, caller: &CallerContext) -> VendResult<TenantIdentity> {
        Ok(self
            .extractor
            .extract_federated_identity(caller.headers())
            .await?)
    }

    async fn role_grant(&self, identity: &TenantIdentity) -> VendResult<RoleGrant> {
        let grant = federate(self.pool.as_ref(), identity).await?;
        Ok(RoleGrant {
            role_arn: grant.role_arn,
            web_identity_token: Some(grant.open_id_token),
        })
    }
}

/// Vends tenant-scoped credentials using one strategy.
#[derive(Clone)]
pub struct TokenVendor {
    strategy: Arc<dyn VendingStrategy>,
    generator: DeclarativePolicyGenerator,
    exchange: Arc<dyn CredentialExchange>,
    duration_seconds: u32,
}

impl std::fmt::Debug for TokenVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVendor")
            .field("variant", &self.strategy.variant())
            .field("generator", &self.generator)
            .field("duration_seconds", &self.duration_seconds)
            .finish_non_exhaustive()
    }
}

impl TokenVendor {
    /// `generator` declares the fragments and parameters; the tenant is set
    /// per vend.
    pub fn new(
        strategy: Arc<dyn VendingStrategy>,
        generator: DeclarativePolicyGenerator,
        exchange: Arc<dyn CredentialExchange>,
    ) -> Self {
        Self {
            strategy,
            generator,
            exchange,
            duration_seconds: DEFAULT_DURATION_SECONDS,
        }
    }

    pub fn duration_seconds(mut self, duration_seconds: u32) -> Self {
        self.duration_seconds = duration_seconds;
        self
    }

    pub fn variant(&self) -> &'static str {
        self.strategy.variant()
    }

    /// Establish the caller's tenant, scope a policy to it, and exchange that
    /// policy for temporary credentials.
    ///
    /// # Errors
    /// - `VendError::Claims` when the caller's identity cannot be established.
    /// - `VendError::Policy` when the configured fragments cannot be assembled.
    /// - `VendError::IdentityFederation` / `VendError::CredentialExchange` for
    ///   remote authority failures.
    pub async fn vend_token(&self, caller: &CallerContext) -> VendResult<ScopedCredentials> {
        let variant = self.strategy.variant();
        let started = Instant::now();
        let outcome = self.vend(caller).await;
        let label = match &outcome {
            Ok(_) => "issued",
            Err(err) => err.failure().as_str(),
        };
        metrics::counter!("warden_vend_total", "variant" => variant, "outcome" => label)
            .increment(1);
        metrics::histogram!("warden_vend_duration_seconds", "variant" => variant)
            .record(started.elapsed().as_secs_f64());
        if let Err(err) = &outcome {
            tracing::warn!(variant, failure = err.failure().as_str(), error = %err, "vend failed");
        }
        outcome
    }

    async fn vend(&self, caller: &CallerContext) -> VendResult<ScopedCredentials> {
        let variant = self.strategy.variant();

        let identity = self.strategy.resolve_identity(caller).await?;
        let tenant = identity.tenant_id();
        tracing::info!(variant, tenant, "claims verified");

        let policy = self
            .generator
            .clone()
            .tenant(tenant)
            .generate_policy()
            .map_err(VendError::from)?;
        tracing::info!(
            variant,
            tenant,
            statements = policy.statement_count().unwrap_or_default(),
            "policy assembled"
        );

        let grant = self.strategy.role_grant(&identity).await?;
        let request = AssumeRoleRequest {
            role_arn: grant.role_arn,
            policy,
            session_name: tenant.to_string(),
            duration_seconds: self.duration_seconds,
            web_identity_token: grant.web_identity_token,
        };
        let credentials = exchange_credentials(self.exchange.as_ref(), &request).await?;
        tracing::info!(
            variant,
            tenant,
            access_key_id = %credentials.access_key_id,
            "credentials issued"
        );
        Ok(credentials)
    }
}
