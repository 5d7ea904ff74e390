//! Credential exchange seam.
//!
//! # Key invariants
//! - A blank policy document never reaches the token-issuing authority;
//!   [`exchange_credentials`] fails with `PolicyError::EmptyPolicy` first.
//! - The policy is always sent as a session policy, so it can only narrow
//!   what the role grants.
//! - Authority failures are returned once; nothing here retries.
use crate::{ExchangeResult, ScopedCredentials, VendError, VendResult};
use async_trait::async_trait;
use warden_policy::{PolicyError, ScopedPolicyDocument};

/// One assume-role call.
#[derive(Clone)]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub policy: ScopedPolicyDocument,
    /// Tenant id, used as the role session name.
    pub session_name: String,
    pub duration_seconds: u32,
    /// OpenID token for the web identity flavor of the call.
    pub web_identity_token: Option<String>,
}

impl std::fmt::Debug for AssumeRoleRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssumeRoleRequest")
            .field("role_arn", &self.role_arn)
            .field("policy", &self.policy)
            .field("session_name", &self.session_name)
            .field("duration_seconds", &self.duration_seconds)
            .field(
                "web_identity_token",
                &self.web_identity_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Trusted authority that turns a role and session policy into credentials.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn assume_role(&self, request: &AssumeRoleRequest) -> ExchangeResult<ScopedCredentials>;
}

/// Run one exchange, refusing blank policies before any call is made.
///
/// # Errors
/// - `VendError::Policy(PolicyError::EmptyPolicy)` for a blank policy.
/// - `VendError::CredentialExchange` when the authority rejects the call.
pub async fn exchange_credentials(
    exchange: &dyn CredentialExchange,
    request: &AssumeRoleRequest,
) -> VendResult<ScopedCredentials> {
    if request.policy.is_blank() {
        tracing::error!(
            tenant = %request.session_name,
            "refusing to assume role with an empty session policy"
        );
        return Err(PolicyError::EmptyPolicy.into());
    }
    exchange.assume_role(request).await.map_err(|err| {
        tracing::error!(
            tenant = %request.session_name,
            role_arn = %request.role_arn,
            error = %err,
            "credential exchange failed"
        );
        VendError::CredentialExchange(err)
    })
}
