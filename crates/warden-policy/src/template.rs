//! Policy template store.
//!
//! # Purpose
//! Resolves named statement templates to their raw text and joins several
//! templates into the comma-separated statement list the processor expects.
//!
//! # Key invariants
//! - Templates are addressed by exact name; unknown names are errors.
//! - Assembly preserves input order so output is deterministic.
//! - Sources are read-only and safe to share across concurrent requests.
use crate::{Fragment, PolicyError, PolicyResult};
use std::collections::{BTreeMap, HashMap};

/// Read-only catalog mapping template names to statement text.
pub trait TemplateSource: Send + Sync {
    /// Load one template by exact name.
    ///
    /// # Errors
    /// - `PolicyError::TemplateNotFound` if the name is not in the catalog.
    fn load(&self, name: &str) -> PolicyResult<String>;

    /// Load every named template and join them with `,` in input order.
    ///
    /// # Errors
    /// - `PolicyError::TemplateNotFound` for the first unknown name.
    fn assemble(&self, names: &[String]) -> PolicyResult<String> {
        let statements = names
            .iter()
            .map(|name| {
                self.load(name).inspect_err(|_| {
                    tracing::info!(template = %name, "unable to locate policy template");
                })
            })
            .collect::<PolicyResult<Vec<_>>>()?;
        Ok(statements.join(","))
    }
}

/// The built-in fragment catalog compiled into the binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedTemplates;

impl TemplateSource for EmbeddedTemplates {
    fn load(&self, name: &str) -> PolicyResult<String> {
        name.parse::<Fragment>()
            .map(|fragment| fragment.template_text().to_string())
            .map_err(|_| PolicyError::TemplateNotFound(name.to_string()))
    }
}

impl TemplateSource for HashMap<String, String> {
    fn load(&self, name: &str) -> PolicyResult<String> {
        self.get(name)
            .cloned()
            .ok_or_else(|| PolicyError::TemplateNotFound(name.to_string()))
    }
}

impl TemplateSource for BTreeMap<String, String> {
    fn load(&self, name: &str) -> PolicyResult<String> {
        self.get(name)
            .cloned()
            .ok_or_else(|| PolicyError::TemplateNotFound(name.to_string()))
    }
}
