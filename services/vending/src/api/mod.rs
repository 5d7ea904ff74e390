//! HTTP API surface of the vending service.
pub mod credentials;
pub mod error;
pub mod system;
pub mod types;
