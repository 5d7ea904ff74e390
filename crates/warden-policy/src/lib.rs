//! Tenant-scoped session policy assembly.
//!
//! # Purpose
//! Builds least-privilege access policy documents for a single tenant by
//! filling reusable statement templates with tenant-specific values.
//!
//! # How it fits
//! The token vendor declares which access patterns apply to a request, sets the
//! tenant resolved from the caller's identity, and passes the generated
//! document to the credential exchange as a session policy.
//!
//! # Key invariants
//! - A generated policy always contains at least one statement and a tenant.
//! - Output is whitespace-free so exact-match tests and size limits are stable.
//! - Unresolved `{{placeholder}}` tokens are kept verbatim unless strict mode
//!   is enabled on the generator.
//!
//! # Examples
//! ```rust
//! use warden_policy::DeclarativePolicyGenerator;
//!
//! let policy = DeclarativePolicyGenerator::new()
//!     .s3_folder_per_tenant("TestBucket")
//!     .tenant("A1B2C3D4")
//!     .generate_policy()
//!     .expect("policy");
//! assert!(policy.as_str().contains("arn:aws:s3:::TestBucket/A1B2C3D4/*"));
//! ```
//!
//! # Common pitfalls
//! - Declaring a fragment without its parameters (for example a bucket) leaves
//!   the placeholder in the output.
//! - Reusing one generator across tenants without resetting the tenant.

mod errors;
mod fragment;
mod generator;
mod processor;
mod template;

pub use errors::{PolicyError, PolicyResult};
pub use fragment::Fragment;
pub use generator::DeclarativePolicyGenerator;
pub use processor::{
    POLICY_VERSION, PolicyParameters, PolicyTemplateProcessor, ScopedPolicyDocument, TENANT_PARAMETER,
};
pub use template::{EmbeddedTemplates, TemplateSource};
