//! Request header access and bearer token parsing.
//!
//! # Purpose
//! Abstracts over the header containers entry points hand us (plain maps from
//! serverless events, `http::HeaderMap` from servers) and pulls the bearer
//! token out of the `Authorization` header.
//!
//! # Key invariants
//! - Header names are matched case-insensitively. When a map holds the same
//!   name in several cases, the exact spelling asked for wins, then the
//!   lexically smallest one.
//! - The auth scheme must be `Bearer` (any case) followed by whitespace and a
//!   non-empty token.
use crate::{ClaimsError, ClaimsResult};
use std::collections::{BTreeMap, HashMap};

pub const AUTHORIZATION: &str = "authorization";

/// Case-insensitive header lookup.
pub trait HeaderLookup {
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderLookup for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name)
            .or_else(|| {
                self.iter()
                    .filter(|(key, _)| key.eq_ignore_ascii_case(name))
                    .min_by_key(|(key, _)| key.as_str())
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }
}

impl HeaderLookup for BTreeMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name)
            .or_else(|| {
                self.iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }
}

impl HeaderLookup for http::HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

impl<T: HeaderLookup + ?Sized> HeaderLookup for &T {
    fn header(&self, name: &str) -> Option<&str> {
        (**self).header(name)
    }
}

/// Extract the raw token from an `Authorization: Bearer <token>` header.
///
/// # Errors
/// - `ClaimsError::MissingAuthorization` if no Authorization header exists.
/// - `ClaimsError::MalformedToken` if the scheme is not Bearer or the token is empty.
pub fn bearer_token<H: HeaderLookup + ?Sized>(headers: &H) -> ClaimsResult<&str> {
    let value = headers.header(AUTHORIZATION).ok_or_else(|| {
        tracing::warn!("request does not contain an Authorization header");
        ClaimsError::MissingAuthorization
    })?;
    let value = value.trim_start();
    let Some((scheme, token)) = value.split_once(char::is_whitespace) else {
        tracing::warn!("Authorization header does not contain a bearer token");
        return Err(ClaimsError::MalformedToken("missing token".to_string()));
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        tracing::warn!("Authorization header uses a non-bearer scheme");
        return Err(ClaimsError::MalformedToken("unsupported scheme".to_string()));
    }
    let token = token.trim();
    if token.is_empty() {
        tracing::warn!("Authorization header does not contain a bearer token");
        return Err(ClaimsError::MalformedToken("empty token".to_string()));
    }
    Ok(token)
}
