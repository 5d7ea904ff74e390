use thiserror::Error;
use warden_claims::{ClaimsError, ClaimsErrorKind};
use warden_policy::PolicyError;

/// Failure talking to a remote authority (STS or the identity pool service).
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("request rejected ({status}): {code}: {message}")]
    Rejected {
        status: u16,
        code: String,
        message: String,
    },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("no signing credentials available")]
    MissingCredentials,
    #[error("signing credentials could not be loaded: {0}")]
    CredentialsUnavailable(String),
}

/// Error codes meaning the presented identity token was not accepted.
const IDENTITY_REJECTION_CODES: [&str; 6] = [
    "InvalidIdentityToken",
    "ExpiredToken",
    "ExpiredTokenException",
    "IDPRejectedClaim",
    "NotAuthorizedException",
    "InvalidIdentityTokenException",
];

const THROTTLING_CODES: [&str; 4] = [
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "IDPCommunicationError",
];

impl ExchangeError {
    fn failure(&self) -> FailureClass {
        match self {
            ExchangeError::Rejected { status, code, .. } => {
                if *status >= 500 || THROTTLING_CODES.contains(&code.as_str()) {
                    FailureClass::ServiceUnavailable
                } else if IDENTITY_REJECTION_CODES.contains(&code.as_str()) {
                    FailureClass::IdentityNotEstablished
                } else {
                    FailureClass::AccessDenied
                }
            }
            ExchangeError::Transport(_)
            | ExchangeError::MalformedResponse(_)
            | ExchangeError::MissingCredentials
            | ExchangeError::CredentialsUnavailable(_) => FailureClass::ServiceUnavailable,
        }
    }
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Uniform failure signal for callers choosing a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    IdentityNotEstablished,
    AccessDenied,
    ServiceUnavailable,
    /// The vendor itself is set up wrong: bad template, missing fragment.
    Misconfigured,
}

impl FailureClass {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureClass::IdentityNotEstablished => "identity_not_established",
            FailureClass::AccessDenied => "access_denied",
            FailureClass::ServiceUnavailable => "service_unavailable",
            FailureClass::Misconfigured => "misconfigured",
        }
    }
}

/// Everything that can stop a vend. No variant carries token text.
#[derive(Debug, Error)]
pub enum VendError {
    #[error(transparent)]
    Claims(#[from] ClaimsError),
    #[error("policy assembly failed: {0}")]
    Policy(#[from] PolicyError),
    #[error("identity federation failed: {0}")]
    IdentityFederation(#[source] ExchangeError),
    #[error("credential exchange failed: {0}")]
    CredentialExchange(#[source] ExchangeError),
}

impl VendError {
    pub fn failure(&self) -> FailureClass {
        match self {
            VendError::Claims(err) => match err.kind() {
                ClaimsErrorKind::Authentication => FailureClass::IdentityNotEstablished,
                ClaimsErrorKind::Claim => FailureClass::AccessDenied,
            },
            VendError::Policy(PolicyError::InvalidTenant(_)) => FailureClass::AccessDenied,
            VendError::Policy(_) => FailureClass::Misconfigured,
            VendError::IdentityFederation(err) | VendError::CredentialExchange(err) => {
                err.failure()
            }
        }
    }
}

pub type VendResult<T> = Result<T, VendError>;
