//! Vending HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and assembles the vendors
//! each route hands requests to.
//!
//! # Notes
//! Route composition lives here to keep `main` small and testable.
//!
//! # Security considerations
//! - Verified bearer and federated vending are only wired when at least one
//!   token issuer is configured; otherwise those routes answer `not_enabled`.
//! - Signing credentials come from a provider consulted on every signed call.
use crate::api;
use crate::config::VendingConfig;
use anyhow::Context;
use axum::Router;
use axum::http::HeaderName;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use warden_claims::{ClaimsExtractor, JwksKeyProvider};
use warden_vendor::aws::{CognitoIdentityClient, CredentialsProvider, StsClient};
use warden_vendor::{BearerToken, DeclaredIdentity, FederatedIdentity, TokenVendor};

const JWKS_CACHE_TTL_SECS: u64 = 3600;

#[derive(Clone)]
pub struct AppState {
    /// Absent when no role is configured.
    pub declared: Option<TokenVendor>,
    /// Absent when no role is configured, or when tokens are verified and no
    /// issuer is trusted.
    pub bearer: Option<TokenVendor>,
    /// Absent when no issuer is trusted.
    pub federated: Option<TokenVendor>,
    pub declared_tenant_header: HeaderName,
}

impl AppState {
    /// Wire the three vendors from configuration. `credentials` sign the
    /// `AssumeRole` and `GetIdentityPoolRoles` calls.
    pub fn from_config(
        config: &VendingConfig,
        credentials: Option<Arc<dyn CredentialsProvider>>,
    ) -> anyhow::Result<Self> {
        let declared_tenant_header = HeaderName::from_bytes(
            config.declared_tenant_header.to_ascii_lowercase().as_bytes(),
        )
        .with_context(|| format!("invalid tenant header {}", config.declared_tenant_header))?;

        let client = reqwest::Client::new();
        let endpoints = config.endpoints();
        let generator = config.policy_generator();
        let sts = Arc::new(match &credentials {
            Some(provider) => {
                StsClient::with_credentials_provider(client.clone(), endpoints.clone(), provider.clone())
            }
            None => StsClient::new(client.clone(), endpoints.clone(), None),
        });
        let keys = Arc::new(JwksKeyProvider::with_client(
            client.clone(),
            Duration::from_secs(JWKS_CACHE_TTL_SECS),
        ));
        let extractor = ClaimsExtractor::with_config(keys, config.claims_config());

        let declared = config.role_arn.as_ref().map(|role_arn| {
            TokenVendor::new(
                Arc::new(DeclaredIdentity::new(role_arn)),
                generator.clone(),
                sts.clone(),
            )
            .duration_seconds(config.duration_seconds)
        });
        let trusts_issuers = !config.allowed_issuers.is_empty();
        if !trusts_issuers {
            tracing::warn!("no token issuers configured; verified bearer and federated vending disabled");
        }

        let bearer_enabled = trusts_issuers || !config.validate_token;
        let bearer = config.role_arn.as_ref().filter(|_| bearer_enabled).map(|role_arn| {
            TokenVendor::new(
                Arc::new(
                    BearerToken::new(extractor.clone(), role_arn)
                        .validate_token(config.validate_token),
                ),
                generator.clone(),
                sts.clone(),
            )
            .duration_seconds(config.duration_seconds)
        });
        if config.role_arn.is_none() {
            tracing::warn!("no role configured; declared and bearer vending disabled");
        }
        let federated = trusts_issuers.then(|| {
            let pool = Arc::new(match credentials {
                Some(provider) => {
                    CognitoIdentityClient::with_credentials_provider(client, endpoints, provider)
                }
                None => CognitoIdentityClient::new(client, endpoints, None),
            });
            TokenVendor::new(
                Arc::new(FederatedIdentity::new(extractor, pool)),
                generator,
                sts,
            )
            .duration_seconds(config.duration_seconds)
        });

        Ok(Self {
            declared,
            bearer,
            federated,
            declared_tenant_header,
        })
    }

    pub fn variants(&self) -> Vec<String> {
        [&self.declared, &self.bearer, &self.federated]
            .into_iter()
            .flatten()
            .map(|vendor| vendor.variant().to_string())
            .collect()
    }
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            )
        });

    Router::new()
        .route(
            "/v1/credentials/declared",
            axum::routing::post(api::credentials::vend_declared),
        )
        .route(
            "/v1/credentials/bearer",
            axum::routing::post(api::credentials::vend_bearer),
        )
        .route(
            "/v1/credentials/federated",
            axum::routing::post(api::credentials::vend_federated),
        )
        .route(
            "/v1/system/health",
            axum::routing::get(api::system::system_health),
        )
        .layer(trace_layer)
        .with_state(state)
}
