//! Cognito Identity client for federated identity exchange.
//!
//! `GetId` and `GetOpenIdToken` are authorized by the provider logins and
//! sent unsigned. `GetIdentityPoolRoles` is a developer operation and is
//! signed with credentials resolved for that call.
use super::provider::{CredentialsProvider, resolve_credentials};
use super::sigv4::{SigV4Signer, SignableRequest};
use super::{AwsCredentials, AwsEndpoints, parse_endpoint, rejection};
use crate::identity_pool::IdentityPool;
use crate::{ExchangeError, ExchangeResult};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "AWSCognitoIdentityService";

#[derive(Debug, Clone)]
pub struct CognitoIdentityClient {
    client: reqwest::Client,
    endpoints: AwsEndpoints,
    credentials: Option<Arc<dyn CredentialsProvider>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdResponse {
    identity_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetOpenIdTokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetIdentityPoolRolesResponse {
    #[serde(default)]
    roles: BTreeMap<String, String>,
}

impl CognitoIdentityClient {
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

    async fn call<T: DeserializeOwned>(
        &self,
        operation: &str,
        payload: Value,
        signed: bool,
    ) -> ExchangeResult<T> {
        let url = parse_endpoint(&self.endpoints.cognito_identity)?;
        let target = format!("{TARGET_PREFIX}.{operation}");
        let body = payload.to_string();

        let mut builder = self
            .client
            .post(url.clone())
            .header(reqwest::header::CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header("x-amz-target", &target);
        if signed {
            let credentials = resolve_credentials(self.credentials.as_ref()).await?;
            let signer = SigV4Signer::new(credentials, &self.endpoints.region, "cognito-identity");
            let signable = SignableRequest {
                method: "POST",
                url: &url,
                headers: &[
                    ("content-type", JSON_CONTENT_TYPE),
                    ("x-amz-target", target.as_str()),
                ],
                body: body.as_bytes(),
            };
            for (name, value) in signer.sign(&signable, Utc::now()) {
                builder = builder.header(name, value);
            }
        }

        tracing::debug!(operation, "calling cognito identity");
        let response = builder.body(body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(rejection(status, &bytes));
        }
        serde_json::from_slice(&bytes)
            .map_err(|err| ExchangeError::MalformedResponse(format!("{operation}: {err}")))
    }
}

#[async_trait]
impl IdentityPool for CognitoIdentityClient {
    async fn get_id(
        &self,
        identity_pool_id: &str,
        logins: &BTreeMap<String, String>,
    ) -> ExchangeResult<String> {
        let response: GetIdResponse = self
            .call(
                "GetId",
                json!({ "IdentityPoolId": identity_pool_id, "Logins": logins }),
                false,
            )
            .await?;
        Ok(response.identity_id)
    }

    async fn get_open_id_token(
        &self,
        identity_id: &str,
        logins: &BTreeMap<String, String>,
    ) -> ExchangeResult<String> {
        let response: GetOpenIdTokenResponse = self
            .call(
                "GetOpenIdToken",
                json!({ "IdentityId": identity_id, "Logins": logins }),
                false,
            )
            .await?;
        Ok(response.token)
    }

    async fn get_identity_pool_roles(
        &self,
        identity_pool_id: &str,
    ) -> ExchangeResult<BTreeMap<String, String>> {
        let response: GetIdentityPoolRolesResponse = self
            .call(
                "GetIdentityPoolRoles",
                json!({ "IdentityPoolId": identity_pool_id }),
                true,
            )
            .await?;
        Ok(response.roles)
    }
}
