//! AWS Signature Version 4 request signing.
//!
//! # Purpose
//! Sign the few calls that need caller credentials (STS `AssumeRole`, Cognito
//! `GetIdentityPoolRoles`). Headers are produced, not applied, so the HTTP
//! client stays in charge of the request.
//!
//! # Key invariants
//! - Signed headers always include `host` and `x-amz-date`, plus
//!   `x-amz-security-token` when the credentials carry a session token.
//! - Query parameters are sorted and encoded with the RFC 3986 unreserved set.
use super::AwsCredentials;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// A request as far as the signature is concerned.
#[derive(Debug, Clone, Copy)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub url: &'a Url,
    /// Extra headers to sign, e.g. `content-type` or `x-amz-target`.
    pub headers: &'a [(&'a str, &'a str)],
    pub body: &'a [u8],
}

/// Signs requests for one service in one region.
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    credentials: AwsCredentials,
    region: String,
    service: String,
}

impl SigV4Signer {
    pub fn new(
        credentials: AwsCredentials,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: service.into(),
        }
    }

    /// Headers to add to the request: `x-amz-date`, the optional security
    /// token, and `authorization`.
    pub fn sign(&self, request: &SignableRequest<'_>, now: DateTime<Utc>) -> Vec<(String, String)> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();

        let mut headers = self.headers_to_sign(request, &amz_date);
        headers.sort_by(|a, b| a.0.cmp(&b.0));
        let canonical = canonical_request(request, &headers);
        let scope = format!("{date}/{}/{}/aws4_request", self.region, self.service);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical.as_bytes()))
        );
        let key = signing_key(
            &self.credentials.secret_access_key,
            &date,
            &self.region,
            &self.service,
        );
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));
        let signed_headers = signed_header_names(&headers);

        let mut out = vec![("x-amz-date".to_string(), amz_date)];
        if let Some(token) = &self.credentials.session_token {
            out.push(("x-amz-security-token".to_string(), token.clone()));
        }
        out.push((
            "authorization".to_string(),
            format!(
                "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
                self.credentials.access_key_id
            ),
        ));
        out
    }

    fn headers_to_sign(&self, request: &SignableRequest<'_>, amz_date: &str) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = request
            .headers
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), normalize_header_value(value)))
            .collect();
        headers.push(("host".to_string(), host_header(request.url)));
        headers.push(("x-amz-date".to_string(), amz_date.to_string()));
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers
    }
}

/// Derived signing key for a date, region and service.
pub fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

/// Canonical request over already lowercased, sorted headers.
pub fn canonical_request(request: &SignableRequest<'_>, sorted_headers: &[(String, String)]) -> String {
    let canonical_headers: String = sorted_headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method,
        canonical_uri(request.url),
        canonical_query(request.url),
        canonical_headers,
        signed_header_names(sorted_headers),
        hex::encode(Sha256::digest(request.body))
    )
}

fn signed_header_names(sorted_headers: &[(String, String)]) -> String {
    sorted_headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";")
}

fn canonical_uri(url: &Url) -> String {
    let path = url.path();
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn normalize_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn uri_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    // Keys longer than a block are hashed first; shorter keys are zero padded.
    let mut block = hmac::digest::Key::<HmacSha256>::default();
    if key.len() > block.len() {
        let digest = Sha256::digest(key);
        block[..digest.len()].copy_from_slice(&digest);
    } else {
        block[..key.len()].copy_from_slice(key);
    }
    let mut mac = <HmacSha256 as Mac>::new(&block);
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
