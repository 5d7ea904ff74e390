//! STS client for `AssumeRole` and `AssumeRoleWithWebIdentity`.
//!
//! # Key invariants
//! - The scoped policy is always sent as the `Policy` session parameter.
//! - `AssumeRole` is signed with credentials resolved for that call;
//!   `AssumeRoleWithWebIdentity` is authorized by its web identity token and
//!   is sent unsigned.
//! - One request per call. Errors come back as `ExchangeError`, unretried.
use super::provider::{CredentialsProvider, resolve_credentials};
use super::sigv4::{SigV4Signer, SignableRequest};
use super::{AwsCredentials, AwsEndpoints, parse_endpoint, rejection};
use crate::exchange::{AssumeRoleRequest, CredentialExchange};
use crate::{ExchangeError, ExchangeResult, ScopedCredentials};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

const STS_API_VERSION: &str = "2011-06-15";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

#[derive(Debug, Clone)]
pub struct StsClient {
    client: reqwest::Client,
    endpoints: AwsEndpoints,
    credentials: Option<Arc<dyn CredentialsProvider>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
    #[serde(default)]
    expiration: Option<Value>,
}

impl StsClient {
    /// Fixed `credentials` sign `AssumeRole`; without them only the web
    /// identity flavor can succeed.
    pub fn new(
        client: reqwest::Client,
        endpoints: AwsEndpoints,
        credentials: Option<AwsCredentials>,
    ) -> Self {
        let credentials =
            credentials.map(|credentials| Arc::new(credentials) as Arc<dyn CredentialsProvider>);
        Self {
            client,
            endpoints,
            credentials,
        }
    }

    /// Sign `AssumeRole` with whatever `provider` returns at call time.
    pub fn with_credentials_provider(
        client: reqwest::Client,
        endpoints: AwsEndpoints,
        provider: Arc<dyn CredentialsProvider>,
    ) -> Self {
        Self {
            client,
            endpoints,
            credentials: Some(provider),
        }
    }

    fn action(request: &AssumeRoleRequest) -> &'static str {
        if request.web_identity_token.is_some() {
            "AssumeRoleWithWebIdentity"
        } else {
            "AssumeRole"
        }
    }

    fn form_body(action: &str, request: &AssumeRoleRequest) -> String {
        let duration = request.duration_seconds.to_string();
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("Action", action)
            .append_pair("Version", STS_API_VERSION)
            .append_pair("RoleArn", &request.role_arn)
            .append_pair("RoleSessionName", &request.session_name)
            .append_pair("Policy", request.policy.as_str())
            .append_pair("DurationSeconds", &duration);
        if let Some(token) = &request.web_identity_token {
            form.append_pair("WebIdentityToken", token);
        }
        form.finish()
    }
}

#[async_trait]
impl CredentialExchange for StsClient {
    async fn assume_role(&self, request: &AssumeRoleRequest) -> ExchangeResult<ScopedCredentials> {
        let action = Self::action(request);
        let url = parse_endpoint(&self.endpoints.sts)?;
        let body = Self::form_body(action, request);

        let mut builder = self
            .client
            .post(url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE);
        if request.web_identity_token.is_none() {
            let credentials = resolve_credentials(self.credentials.as_ref()).await?;
            let signer = SigV4Signer::new(credentials, &self.endpoints.region, "sts");
            let signable = SignableRequest {
                method: "POST",
                url: &url,
                headers: &[("content-type", FORM_CONTENT_TYPE)],
                body: body.as_bytes(),
            };
            for (name, value) in signer.sign(&signable, Utc::now()) {
                builder = builder.header(name, value);
            }
        }

        tracing::debug!(action, role_arn = %request.role_arn, tenant = %request.session_name, "calling sts");
        let response = builder.body(body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(rejection(status, &bytes));
        }
        parse_credentials(action, &bytes, &request.session_name)
    }
}

fn parse_credentials(
    action: &str,
    body: &[u8],
    tenant: &str,
) -> ExchangeResult<ScopedCredentials> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| ExchangeError::MalformedResponse(format!("sts body: {err}")))?;
    let pointer = format!("/{action}Response/{action}Result/Credentials");
    let raw = value
        .pointer(&pointer)
        .cloned()
        .ok_or_else(|| ExchangeError::MalformedResponse("sts response has no credentials".to_string()))?;
    let credentials: StsCredentials = serde_json::from_value(raw)
        .map_err(|err| ExchangeError::MalformedResponse(format!("sts credentials: {err}")))?;
    Ok(ScopedCredentials {
        access_key_id: credentials.access_key_id,
        secret_access_key: credentials.secret_access_key,
        session_token: credentials.session_token,
        tenant: tenant.to_string(),
        expiration: credentials.expiration.as_ref().and_then(parse_expiration),
    })
}

/// Epoch seconds (the JSON protocol) or an RFC 3339 string.
fn parse_expiration(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(number) => {
            let seconds = number.as_f64()?;
            DateTime::from_timestamp(seconds.trunc() as i64, 0)
        }
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|time| time.with_timezone(&Utc)),
        _ => None,
    }
}
