//! AWS wire clients behind the exchange and identity pool seams.
//!
//! Speaks the JSON flavors of the STS Query API and the Cognito Identity
//! `awsJson1.1` protocol directly over `reqwest`.
pub mod cognito;
pub mod credentials;
pub mod provider;
pub mod sigv4;
pub mod sts;

pub use cognito::CognitoIdentityClient;
pub use credentials::AwsCredentials;
pub use provider::{
    ContainerCredentials, CredentialsChain, CredentialsProvider, EnvCredentials,
    InstanceMetadataCredentials,
};
pub use sigv4::{SigV4Signer, SignableRequest};
pub use sts::StsClient;

use crate::ExchangeError;
use serde::Deserialize;

pub const DEFAULT_REGION: &str = "us-east-1";

/// Region and service endpoints. Endpoints are overridable for local testing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsEndpoints {
    pub region: String,
    pub sts: String,
    pub cognito_identity: String,
}

impl AwsEndpoints {
    pub fn for_region(region: impl Into<String>) -> Self {
        let region = region.into();
        Self {
            sts: format!("https://sts.{region}.amazonaws.com"),
            cognito_identity: format!("https://cognito-identity.{region}.amazonaws.com"),
            region,
        }
    }

    pub fn with_sts_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.sts = endpoint.into();
        self
    }

    pub fn with_cognito_identity_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.cognito_identity = endpoint.into();
        self
    }
}

impl Default for AwsEndpoints {
    fn default() -> Self {
        Self::for_region(DEFAULT_REGION)
    }
}

fn parse_endpoint(endpoint: &str) -> Result<url::Url, ExchangeError> {
    url::Url::parse(endpoint)
        .map_err(|err| ExchangeError::MalformedResponse(format!("invalid endpoint {endpoint}: {err}")))
}

#[derive(Debug, Default, Deserialize)]
struct QueryErrorEnvelope {
    #[serde(rename = "Error")]
    error: Option<QueryErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct QueryErrorBody {
    #[serde(rename = "Code")]
    code: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct JsonErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Turn a non-success response body into `ExchangeError::Rejected`,
/// understanding both the Query (`Error.Code`) and JSON (`__type`) shapes.
fn rejection(status: reqwest::StatusCode, body: &[u8]) -> ExchangeError {
    let fallback_code = status
        .canonical_reason()
        .unwrap_or("UnknownError")
        .replace(' ', "");
    let (code, message) = if let Ok(QueryErrorEnvelope { error: Some(error) }) =
        serde_json::from_slice::<QueryErrorEnvelope>(body)
    {
        (error.code, error.message)
    } else if let Ok(error) = serde_json::from_slice::<JsonErrorBody>(body) {
        let code = error
            .error_type
            .map(|value| value.rsplit('#').next().unwrap_or_default().to_string());
        (code, error.message)
    } else {
        (None, None)
    };
    ExchangeError::Rejected {
        status: status.as_u16(),
        code: code.unwrap_or(fallback_code),
        message: message.unwrap_or_default(),
    }
}
