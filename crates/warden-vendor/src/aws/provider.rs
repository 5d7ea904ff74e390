//! Sources of the credentials that sign STS and Cognito Identity calls.
//!
//! # Purpose
//! Resolve signing credentials at the time of each signed request, so rotated
//! keys and refreshed role sessions are picked up without a restart.
//!
//! # Key invariants
//! - `Ok(None)` means a source has nothing configured. An error means it is
//!   configured but could not be read.
//! - Session credentials fetched from the container agent or instance
//!   metadata are reused until 60 seconds before they expire.
//! - Secrets never reach logs; only access key ids and expirations do.
use super::AwsCredentials;
use crate::{ExchangeError, ExchangeResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Host serving `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI`.
pub const CONTAINER_CREDENTIALS_HOST: &str = "http://169.254.170.2";
pub const INSTANCE_METADATA_ENDPOINT: &str = "http://169.254.169.254";

const REFRESH_MARGIN_SECS: i64 = 60;
const METADATA_TOKEN_TTL_SECS: &str = "21600";
const METADATA_TIMEOUT: Duration = Duration::from_secs(2);

#[async_trait]
pub trait CredentialsProvider: Send + Sync + std::fmt::Debug {
    async fn credentials(&self) -> ExchangeResult<Option<AwsCredentials>>;
}

#[async_trait]
impl CredentialsProvider for AwsCredentials {
    async fn credentials(&self) -> ExchangeResult<Option<AwsCredentials>> {
        Ok(Some(self.clone()))
    }
}

/// Signing credentials for one request, or `MissingCredentials` when no
/// source has any.
pub(crate) async fn resolve_credentials(
    provider: Option<&Arc<dyn CredentialsProvider>>,
) -> ExchangeResult<AwsCredentials> {
    let Some(provider) = provider else {
        return Err(ExchangeError::MissingCredentials);
    };
    provider
        .credentials()
        .await?
        .ok_or(ExchangeError::MissingCredentials)
}

/// Reads `AWS_ACCESS_KEY_ID` and friends again on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

#[async_trait]
impl CredentialsProvider for EnvCredentials {
    async fn credentials(&self) -> ExchangeResult<Option<AwsCredentials>> {
        Ok(AwsCredentials::from_env())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SessionCredentials {
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    expiration: Option<DateTime<Utc>>,
}

fn parse_session(source: &str, body: &str) -> ExchangeResult<SessionCredentials> {
    serde_json::from_str(body)
        .map_err(|err| ExchangeError::CredentialsUnavailable(format!("{source}: {err}")))
}

/// Last fetched session credentials and when they expire.
#[derive(Debug, Default)]
struct SessionCache(RwLock<Option<(AwsCredentials, DateTime<Utc>)>>);

impl SessionCache {
    fn fresh(&self, now: DateTime<Utc>) -> Option<AwsCredentials> {
        let slot = self.0.read().ok()?;
        let (credentials, expiration) = slot.as_ref()?;
        let refresh_at = *expiration - chrono::Duration::seconds(REFRESH_MARGIN_SECS);
        (now < refresh_at).then(|| credentials.clone())
    }

    fn store(&self, session: SessionCredentials) -> AwsCredentials {
        let credentials = AwsCredentials::new(
            session.access_key_id,
            session.secret_access_key,
            session.token,
        );
        if let Some(expiration) = session.expiration
            && let Ok(mut slot) = self.0.write()
        {
            *slot = Some((credentials.clone(), expiration));
        }
        credentials
    }
}

async fn fetch_text(request: reqwest::RequestBuilder, source: &str) -> ExchangeResult<String> {
    let response = request
        .timeout(METADATA_TIMEOUT)
        .send()
        .await
        .map_err(|err| ExchangeError::CredentialsUnavailable(format!("{source}: {err}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(ExchangeError::CredentialsUnavailable(format!(
            "{source} returned {status}"
        )));
    }
    response
        .text()
        .await
        .map_err(|err| ExchangeError::CredentialsUnavailable(format!("{source}: {err}")))
}

/// Task role credentials served by the container agent.
#[derive(Debug)]
pub struct ContainerCredentials {
    client: reqwest::Client,
    uri: Option<String>,
    authorization: Option<String>,
    cache: SessionCache,
}

impl ContainerCredentials {
    pub fn new(client: reqwest::Client, uri: impl Into<String>, authorization: Option<String>) -> Self {
        Self {
            client,
            uri: Some(uri.into()),
            authorization,
            cache: SessionCache::default(),
        }
    }

    /// Configure from `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI` (preferred) or
    /// `AWS_CONTAINER_CREDENTIALS_FULL_URI`, plus the optional
    /// `AWS_CONTAINER_AUTHORIZATION_TOKEN`.
    pub fn from_env(client: reqwest::Client) -> Self {
        Self::from_lookup(client, |name| std::env::var(name).ok())
    }

    fn from_lookup(client: reqwest::Client, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let uri = non_empty("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI")
            .map(|path| format!("{CONTAINER_CREDENTIALS_HOST}{path}"))
            .or_else(|| non_empty("AWS_CONTAINER_CREDENTIALS_FULL_URI"));
        Self {
            client,
            uri,
            authorization: non_empty("AWS_CONTAINER_AUTHORIZATION_TOKEN"),
            cache: SessionCache::default(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.uri.is_some()
    }
}

#[async_trait]
impl CredentialsProvider for ContainerCredentials {
    async fn credentials(&self) -> ExchangeResult<Option<AwsCredentials>> {
        let Some(uri) = &self.uri else {
            return Ok(None);
        };
        if let Some(credentials) = self.cache.fresh(Utc::now()) {
            return Ok(Some(credentials));
        }
        let mut request = self.client.get(uri);
        if let Some(token) = &self.authorization {
            request = request.header(reqwest::header::AUTHORIZATION, token);
        }
        let body = fetch_text(request, "container credentials").await?;
        let session = parse_session("container credentials", &body)?;
        tracing::debug!(
            access_key_id = %session.access_key_id,
            expiration = ?session.expiration,
            "refreshed container credentials"
        );
        Ok(Some(self.cache.store(session)))
    }
}

/// Instance profile credentials read through the IMDSv2 session flow.
#[derive(Debug)]
pub struct InstanceMetadataCredentials {
    client: reqwest::Client,
    endpoint: String,
    cache: SessionCache,
}

impl InstanceMetadataCredentials {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_endpoint(client, INSTANCE_METADATA_ENDPOINT)
    }

    pub fn with_endpoint(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            cache: SessionCache::default(),
        }
    }
}

#[async_trait]
impl CredentialsProvider for InstanceMetadataCredentials {
    async fn credentials(&self) -> ExchangeResult<Option<AwsCredentials>> {
        if let Some(credentials) = self.cache.fresh(Utc::now()) {
            return Ok(Some(credentials));
        }
        let token = fetch_text(
            self.client
                .put(format!("{}/latest/api/token", self.endpoint))
                .header("x-aws-ec2-metadata-token-ttl-seconds", METADATA_TOKEN_TTL_SECS),
            "instance metadata token",
        )
        .await?;
        let token = token.trim();

        let roles_url = format!("{}/latest/meta-data/iam/security-credentials/", self.endpoint);
        let roles = fetch_text(
            self.client
                .get(&roles_url)
                .header("x-aws-ec2-metadata-token", token),
            "instance profile",
        )
        .await?;
        let Some(role) = roles.lines().map(str::trim).find(|line| !line.is_empty()) else {
            return Ok(None);
        };

        let body = fetch_text(
            self.client
                .get(format!("{roles_url}{role}"))
                .header("x-aws-ec2-metadata-token", token),
            "instance profile credentials",
        )
        .await?;
        let session = parse_session("instance profile credentials", &body)?;
        tracing::debug!(
            role,
            access_key_id = %session.access_key_id,
            expiration = ?session.expiration,
            "refreshed instance profile credentials"
        );
        Ok(Some(self.cache.store(session)))
    }
}

/// Tries each source in order and returns the first credentials found.
#[derive(Debug, Clone)]
pub struct CredentialsChain {
    providers: Vec<Arc<dyn CredentialsProvider>>,
}

impl CredentialsChain {
    pub fn new(providers: Vec<Arc<dyn CredentialsProvider>>) -> Self {
        Self { providers }
    }

    /// Environment, then the container agent when configured, then instance
    /// metadata.
    pub fn standard(client: reqwest::Client) -> Self {
        let mut providers: Vec<Arc<dyn CredentialsProvider>> = vec![Arc::new(EnvCredentials)];
        let container = ContainerCredentials::from_env(client.clone());
        if container.is_configured() {
            providers.push(Arc::new(container));
        }
        providers.push(Arc::new(InstanceMetadataCredentials::new(client)));
        Self::new(providers)
    }
}

#[async_trait]
impl CredentialsProvider for CredentialsChain {
    async fn credentials(&self) -> ExchangeResult<Option<AwsCredentials>> {
        let mut last_error = None;
        for provider in &self.providers {
            match provider.credentials().await {
                Ok(Some(credentials)) => return Ok(Some(credentials)),
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(error = %err, "credentials source failed; trying next");
                    last_error = Some(err);
                }
            }
        }
        match last_error {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }
}
