//! Credential vending handlers.
//!
//! # Purpose and responsibility
//! One endpoint per vending variant. Each hands the request headers to its
//! `TokenVendor` and returns the scoped credentials as JSON.
//!
//! # Key invariants and assumptions
//! - The declared variant trusts only the configured tenant header, which an
//!   upstream authorizer must set and strip from client input.
//! - Bearer and federated variants ignore that header entirely.
//! - A variant without a configured vendor answers 404 `not_enabled`.
use crate::api::error::{ApiError, api_not_enabled};
use crate::app::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use warden_vendor::{CallerContext, ScopedCredentials};

pub(crate) async fn vend_declared(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ScopedCredentials>, ApiError> {
    let vendor = state
        .declared
        .as_ref()
        .ok_or_else(|| api_not_enabled("declared identity vending is not configured"))?;
    let declared = headers
        .get(&state.declared_tenant_header)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .map(str::to_string);
    let mut caller = CallerContext::from_headers(headers);
    if let Some(tenant) = declared {
        caller = caller.with_declared_tenant(tenant);
    }
    Ok(Json(vendor.vend_token(&caller).await?))
}

pub(crate) async fn vend_bearer(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ScopedCredentials>, ApiError> {
    let vendor = state
        .bearer
        .as_ref()
        .ok_or_else(|| api_not_enabled("bearer token vending is not configured"))?;
    let caller = CallerContext::from_headers(headers);
    Ok(Json(vendor.vend_token(&caller).await?))
}

pub(crate) async fn vend_federated(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ScopedCredentials>, ApiError> {
    let vendor = state
        .federated
        .as_ref()
        .ok_or_else(|| api_not_enabled("federated vending is not configured"))?;
    let caller = CallerContext::from_headers(headers);
    Ok(Json(vendor.vend_token(&caller).await?))
}
