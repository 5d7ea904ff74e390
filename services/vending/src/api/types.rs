//! Wire types shared by the vending API handlers.
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    /// Vending variants this instance is configured to serve.
    pub variants: Vec<String>,
}
