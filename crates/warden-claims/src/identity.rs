//! Claim sets and the tenant identity derived from them.
//!
//! # Key invariants
//! - A `TenantIdentity` always has a non-empty tenant id.
//! - Provider logins hold raw bearer tokens; `Debug` never prints them.
use crate::{ClaimsError, ClaimsResult};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Claim name carrying the token purpose (`id` or `access`).
pub const TOKEN_USE_CLAIM: &str = "token_use";

/// Required `token_use` value.
pub const ID_TOKEN_USE: &str = "id";

/// Decoded token payload. Only lives for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// Build from any JSON value; non-object payloads yield an empty set.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// String-valued claim. Other value types are ignored.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// String claim that is present and not blank.
    pub fn non_empty_str(&self, name: &str) -> Option<&str> {
        self.get_str(name).filter(|value| !value.trim().is_empty())
    }

    pub fn token_use(&self) -> Option<&str> {
        self.get_str(TOKEN_USE_CLAIM)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.get_str("iss")
    }

    pub fn is_id_token(&self) -> bool {
        self.token_use() == Some(ID_TOKEN_USE)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Who is calling, reduced to what credential vending needs.
#[derive(Clone, PartialEq, Eq)]
pub struct TenantIdentity {
    tenant_id: String,
    identity_pool_id: Option<String>,
    provider_logins: BTreeMap<String, String>,
}

impl TenantIdentity {
    /// # Errors
    /// - `ClaimsError::EmptyTenantId` if `tenant_id` is empty or blank.
    pub fn new(tenant_id: impl Into<String>) -> ClaimsResult<Self> {
        let tenant_id = tenant_id.into();
        if tenant_id.trim().is_empty() {
            return Err(ClaimsError::EmptyTenantId);
        }
        Ok(Self {
            tenant_id,
            identity_pool_id: None,
            provider_logins: BTreeMap::new(),
        })
    }

    /// Attach a federated identity pool and the logins it accepts.
    pub fn with_identity_pool(
        mut self,
        identity_pool_id: impl Into<String>,
        provider_logins: BTreeMap<String, String>,
    ) -> Self {
        self.identity_pool_id = Some(identity_pool_id.into());
        self.provider_logins = provider_logins;
        self
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn identity_pool_id(&self) -> Option<&str> {
        self.identity_pool_id.as_deref()
    }

    /// Issuer host (scheme stripped) to raw bearer token.
    pub fn provider_logins(&self) -> &BTreeMap<String, String> {
        &self.provider_logins
    }
}

impl std::fmt::Debug for TenantIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantIdentity")
            .field("tenant_id", &self.tenant_id)
            .field("identity_pool_id", &self.identity_pool_id)
            .field(
                "provider_logins",
                &self.provider_logins.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Login map key for an issuer: the issuer URL without its scheme.
pub fn provider_name(issuer: &str) -> &str {
    issuer
        .strip_prefix("https://")
        .or_else(|| issuer.strip_prefix("http://"))
        .unwrap_or(issuer)
}
