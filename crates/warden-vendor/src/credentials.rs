use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Temporary credentials limited to one tenant's resources.
///
/// # Security
/// `Debug` prints the access key id and tenant only. The secret key and
/// session token never reach logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    /// Session name the credentials were issued under.
    pub tenant: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
}

impl ScopedCredentials {
    pub fn tenant(&self) -> &str {
        &self.tenant
    }
}

impl std::fmt::Debug for ScopedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("tenant", &self.tenant)
            .field("expiration", &self.expiration)
            .finish()
    }
}
