//! Placeholder substitution and policy envelope assembly.
//!
//! # Purpose
//! Turns a comma-separated list of statement templates into one
//! whitespace-normalized policy document for a single tenant.
//!
//! # Key invariants
//! - Substitution is a single left-to-right pass over `{{name}}` tokens, so a
//!   substituted value is never itself re-expanded.
//! - Placeholders without a parameter are copied through verbatim.
//! - Substituted values are JSON-escaped, so a value can never close the
//!   string it is pasted into.
//! - The returned document never contains whitespace.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameter name every generated policy must carry.
pub const TENANT_PARAMETER: &str = "tenant";

/// Policy language version written into the document envelope.
pub const POLICY_VERSION: &str = "2012-10-17";

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Placeholder name to substitution value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyParameters(BTreeMap<String, String>);

impl PolicyParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// The tenant parameter, if present and not blank.
    pub fn tenant(&self) -> Option<&str> {
        self.get(TENANT_PARAMETER)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PolicyParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Fills placeholders in assembled statements and wraps them in the policy envelope.
#[derive(Debug, Clone)]
pub struct PolicyTemplateProcessor {
    statements: String,
    parameters: PolicyParameters,
}

impl PolicyTemplateProcessor {
    pub fn new(statements: impl Into<String>, parameters: PolicyParameters) -> Self {
        Self {
            statements: statements.into(),
            parameters,
        }
    }

    /// Statements with every known placeholder replaced.
    pub fn resolved_statements(&self) -> String {
        let mut out = String::with_capacity(self.statements.len());
        let mut rest = self.statements.as_str();
        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + OPEN.len()..];
            let Some(end) = after_open.find(CLOSE) else {
                out.push_str(&rest[start..]);
                return out;
            };
            let name = after_open[..end].trim();
            match self.parameters.get(name) {
                Some(value) => push_escaped(&mut out, value),
                None => out.push_str(&rest[start..start + OPEN.len() + end + CLOSE.len()]),
            }
            rest = &after_open[end + CLOSE.len()..];
        }
        out.push_str(rest);
        out
    }

    /// The complete, whitespace-free policy document.
    pub fn tenant_scoped_policy(&self) -> ScopedPolicyDocument {
        let policy = format!(
            "{{ \"Version\": \"{POLICY_VERSION}\",\n  \"Statement\": [\n{} ]\n}}",
            self.resolved_statements()
        );
        ScopedPolicyDocument(strip_whitespace(&policy))
    }
}

/// A fully assembled session policy for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopedPolicyDocument(String);

impl ScopedPolicyDocument {
    /// Wrap policy text produced elsewhere. Blank text is accepted here and
    /// rejected by the credential exchange.
    pub fn from_raw(policy: impl Into<String>) -> Self {
        Self(policy.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Number of entries in the `Statement` array, if the document parses.
    pub fn statement_count(&self) -> Option<usize> {
        let value: serde_json::Value = serde_json::from_str(&self.0).ok()?;
        value.get("Statement")?.as_array().map(Vec::len)
    }

    /// Placeholder names still present in the document, in order of appearance.
    pub fn unresolved_placeholders(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut rest = self.0.as_str();
        while let Some(start) = rest.find(OPEN) {
            let after_open = &rest[start + OPEN.len()..];
            let Some(end) = after_open.find(CLOSE) else {
                break;
            };
            names.push(after_open[..end].to_string());
            rest = &after_open[end + CLOSE.len()..];
        }
        names
    }
}

impl std::fmt::Display for ScopedPolicyDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Append `value` as the body of a JSON string literal, without the quotes.
fn push_escaped(out: &mut String, value: &str) {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    out.push_str(&quoted[1..quoted.len() - 1]);
}

fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}
