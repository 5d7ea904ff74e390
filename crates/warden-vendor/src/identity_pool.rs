//! Federated identity pool seam.
//!
//! # Purpose
//! Converts a tenant's provider logins into the OpenID token and role ARN
//! used for a web identity credential exchange.
//!
//! # Key invariants
//! - The three calls run strictly in order: identity id, then OpenID token,
//!   then the pool's authenticated role.
//! - The first failing call ends the federation; nothing is retried.
use crate::{ExchangeError, ExchangeResult, VendError, VendResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use warden_claims::{ClaimsError, DEFAULT_IDENTITY_POOL_CLAIM, TenantIdentity};

/// Role key the pool uses for authenticated identities.
pub const AUTHENTICATED_ROLE: &str = "authenticated";

/// Identity pool operations needed for federation.
#[async_trait]
pub trait IdentityPool: Send + Sync {
    /// Opaque identity id for these logins within the pool.
    async fn get_id(
        &self,
        identity_pool_id: &str,
        logins: &BTreeMap<String, String>,
    ) -> ExchangeResult<String>;

    /// OpenID token for an identity id.
    async fn get_open_id_token(
        &self,
        identity_id: &str,
        logins: &BTreeMap<String, String>,
    ) -> ExchangeResult<String>;

    /// Role ARNs configured on the pool, keyed by role type.
    async fn get_identity_pool_roles(
        &self,
        identity_pool_id: &str,
    ) -> ExchangeResult<BTreeMap<String, String>>;
}

/// Result of a successful federation.
#[derive(Clone)]
pub struct FederatedGrant {
    pub identity_id: String,
    pub open_id_token: String,
    pub role_arn: String,
}

impl std::fmt::Debug for FederatedGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederatedGrant")
            .field("identity_id", &self.identity_id)
            .field("open_id_token", &"<redacted>")
            .field("role_arn", &self.role_arn)
            .finish()
    }
}

/// Federate `identity` through its identity pool.
///
/// # Errors
/// - `VendError::Claims(MissingIdentityPoolClaim)` if the identity has no pool.
/// - `VendError::IdentityFederation` for any failed pool call or a pool with
///   no authenticated role.
pub async fn federate(
    pool: &dyn IdentityPool,
    identity: &TenantIdentity,
) -> VendResult<FederatedGrant> {
    let pool_id = identity.identity_pool_id().ok_or_else(|| {
        ClaimsError::MissingIdentityPoolClaim(DEFAULT_IDENTITY_POOL_CLAIM.to_string())
    })?;
    let logins = identity.provider_logins();

    let identity_id = pool
        .get_id(pool_id, logins)
        .await
        .map_err(|err| federation_failed(identity, "GetId", err))?;
    let open_id_token = pool
        .get_open_id_token(&identity_id, logins)
        .await
        .map_err(|err| federation_failed(identity, "GetOpenIdToken", err))?;
    let roles = pool
        .get_identity_pool_roles(pool_id)
        .await
        .map_err(|err| federation_failed(identity, "GetIdentityPoolRoles", err))?;
    let role_arn = roles.get(AUTHENTICATED_ROLE).cloned().ok_or_else(|| {
        federation_failed(
            identity,
            "GetIdentityPoolRoles",
            ExchangeError::MalformedResponse("pool has no authenticated role".to_string()),
        )
    })?;

    tracing::debug!(
        tenant = identity.tenant_id(),
        identity_id = %identity_id,
        "identity federated"
    );
    Ok(FederatedGrant {
        identity_id,
        open_id_token,
        role_arn,
    })
}

fn federation_failed(identity: &TenantIdentity, step: &str, err: ExchangeError) -> VendError {
    tracing::error!(tenant = identity.tenant_id(), step, error = %err, "identity federation failed");
    VendError::IdentityFederation(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPool {
        calls: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
        roles: BTreeMap<String, String>,
    }

    impl RecordingPool {
        fn record(&self, call: &str) -> ExchangeResult<()> {
            self.calls.lock().expect("calls").push(call.to_string());
            if self.fail_on == Some(call) {
                return Err(ExchangeError::Rejected {
                    status: 400,
                    code: "NotAuthorizedException".to_string(),
                    message: "Invalid login token".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl IdentityPool for RecordingPool {
        async fn get_id(
            &self,
            identity_pool_id: &str,
            logins: &BTreeMap<String, String>,
        ) -> ExchangeResult<String> {
            self.record("GetId")?;
            Ok(format!("{identity_pool_id}/{}", logins.len()))
        }

        async fn get_open_id_token(
            &self,
            identity_id: &str,
            _logins: &BTreeMap<String, String>,
        ) -> ExchangeResult<String> {
            self.record("GetOpenIdToken")?;
            Ok(format!("openid-for-{identity_id}"))
        }

        async fn get_identity_pool_roles(
            &self,
            _identity_pool_id: &str,
        ) -> ExchangeResult<BTreeMap<String, String>> {
            self.record("GetIdentityPoolRoles")?;
            Ok(self.roles.clone())
        }
    }

    fn roles() -> BTreeMap<String, String> {
        let mut roles = BTreeMap::new();
        roles.insert(
            AUTHENTICATED_ROLE.to_string(),
            "arn:aws:iam::123456789012:role/auth".to_string(),
        );
        roles.insert(
            "unauthenticated".to_string(),
            "arn:aws:iam::123456789012:role/unauth".to_string(),
        );
        roles
    }

    fn federated_identity() -> TenantIdentity {
        let mut logins = BTreeMap::new();
        logins.insert("issuer.example/pool".to_string(), "raw-token".to_string());
        TenantIdentity::new("t1")
            .expect("identity")
            .with_identity_pool("us-east-1:pool", logins)
    }

    #[tokio::test]
    async fn federation_runs_three_steps_in_order() {
        let pool = RecordingPool {
            roles: roles(),
            ..RecordingPool::default()
        };
        let grant = federate(&pool, &federated_identity()).await.expect("grant");
        assert_eq!(grant.identity_id, "us-east-1:pool/1");
        assert_eq!(grant.open_id_token, "openid-for-us-east-1:pool/1");
        assert_eq!(grant.role_arn, "arn:aws:iam::123456789012:role/auth");
        assert_eq!(
            *pool.calls.lock().expect("calls"),
            vec!["GetId", "GetOpenIdToken", "GetIdentityPoolRoles"]
        );
    }

    #[tokio::test]
    async fn first_failure_stops_federation() {
        let pool = RecordingPool {
            roles: roles(),
            fail_on: Some("GetOpenIdToken"),
            ..RecordingPool::default()
        };
        let err = federate(&pool, &federated_identity()).await.unwrap_err();
        assert!(matches!(err, VendError::IdentityFederation(_)));
        assert_eq!(
            *pool.calls.lock().expect("calls"),
            vec!["GetId", "GetOpenIdToken"]
        );
    }

    #[tokio::test]
    async fn pool_without_authenticated_role_fails() {
        let pool = RecordingPool::default();
        let err = federate(&pool, &federated_identity()).await.unwrap_err();
        assert!(matches!(
            err,
            VendError::IdentityFederation(ExchangeError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn identity_without_pool_is_a_claim_error() {
        let pool = RecordingPool::default();
        let identity = TenantIdentity::new("t1").expect("identity");
        let err = federate(&pool, &identity).await.unwrap_err();
        assert!(matches!(
            err,
            VendError::Claims(ClaimsError::MissingIdentityPoolClaim(_))
        ));
        assert!(pool.calls.lock().expect("calls").is_empty());
    }
}
