use thiserror::Error;

/// Errors raised while locating, verifying, or reading a bearer token.
///
/// # Security
/// Variants never carry token text; messages are safe to log.
#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("request does not contain an Authorization header")]
    MissingAuthorization,
    #[error("malformed bearer token: {0}")]
    MalformedToken(String),
    #[error("token header has no key id")]
    MissingKeyId,
    #[error("token has no issuer")]
    MissingIssuer,
    #[error("issuer not allowed")]
    IssuerNotAllowed,
    #[error("unsupported token algorithm")]
    UnsupportedAlgorithm,
    #[error("signing key {0} not found in issuer key set")]
    UnknownKeyId(String),
    #[error("invalid jwk: {0}")]
    InvalidJwk(String),
    #[error("failed to fetch issuer key set: {0}")]
    KeyFetch(#[from] reqwest::Error),
    #[error("token verification failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("request does not contain an id token")]
    WrongTokenType,
    #[error("no tenant id in claim {0}")]
    MissingTenantClaim(String),
    #[error("no identity pool id in claim {0}")]
    MissingIdentityPoolClaim(String),
    #[error("tenant id must not be empty")]
    EmptyTenantId,
}

/// Coarse classification used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimsErrorKind {
    /// The caller's identity could not be established.
    Authentication,
    /// The token is authentic but lacks required tenant attributes.
    Claim,
}

impl ClaimsError {
    pub fn kind(&self) -> ClaimsErrorKind {
        match self {
            ClaimsError::MissingTenantClaim(_)
            | ClaimsError::MissingIdentityPoolClaim(_)
            | ClaimsError::EmptyTenantId => ClaimsErrorKind::Claim,
            _ => ClaimsErrorKind::Authentication,
        }
    }

    /// True for failures of signature, key, or temporal validation.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            ClaimsError::MissingKeyId
                | ClaimsError::MissingIssuer
                | ClaimsError::IssuerNotAllowed
                | ClaimsError::UnsupportedAlgorithm
                | ClaimsError::UnknownKeyId(_)
                | ClaimsError::InvalidJwk(_)
                | ClaimsError::KeyFetch(_)
                | ClaimsError::Jwt(_)
        )
    }
}

pub type ClaimsResult<T> = Result<T, ClaimsError>;
