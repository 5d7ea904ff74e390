use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy template not found: {0}")]
    TemplateNotFound(String),
    #[error("a scoped policy must contain at least one statement")]
    EmptyPolicy,
    #[error("a scoped policy must contain a tenant")]
    MissingTenant,
    #[error("tenant id contains characters not allowed in a policy: {0:?}")]
    InvalidTenant(String),
    #[error("unresolved policy placeholder: {0}")]
    UnresolvedPlaceholder(String),
}

pub type PolicyResult<T> = Result<T, PolicyError>;
