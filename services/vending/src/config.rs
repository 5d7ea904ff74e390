use anyhow::{Context, Result, bail};
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::str::FromStr;
use warden_claims::{ClaimsConfig, DEFAULT_IDENTITY_POOL_CLAIM, DEFAULT_TENANT_CLAIM};
use warden_policy::DeclarativePolicyGenerator;
use warden_vendor::DEFAULT_DURATION_SECONDS;
use warden_vendor::aws::{AwsEndpoints, DEFAULT_REGION};

pub const DEFAULT_DECLARED_TENANT_HEADER: &str = "x-authorizer-tenant-id";

// Vending service configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct VendingConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub region: String,
    pub sts_endpoint: Option<String>,
    pub cognito_endpoint: Option<String>,
    pub role_arn: Option<String>,
    pub duration_seconds: u32,
    pub tenant_claim: String,
    pub identity_pool_claim: String,
    pub validate_token: bool,
    pub declared_tenant_header: String,
    pub allowed_algorithms: Vec<Algorithm>,
    /// Token issuers whose key sets are trusted. Verified bearer and
    /// federated vending stay off while this is empty.
    pub allowed_issuers: Vec<String>,
    pub bucket: Option<String>,
    pub table: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VendingConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    region: Option<String>,
    sts_endpoint: Option<String>,
    cognito_endpoint: Option<String>,
    role_arn: Option<String>,
    duration_seconds: Option<u32>,
    tenant_claim: Option<String>,
    identity_pool_claim: Option<String>,
    validate_token: Option<bool>,
    declared_tenant_header: Option<String>,
    allowed_algorithms: Option<Vec<String>>,
    allowed_issuers: Option<Vec<String>>,
    bucket: Option<String>,
    table: Option<String>,
}

impl VendingConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("WARDEN_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8443".to_string())
            .parse()
            .with_context(|| "parse WARDEN_BIND")?;
        let metrics_bind = std::env::var("WARDEN_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| "parse WARDEN_METRICS_BIND")?;
        let duration_seconds = match env_value("WARDEN_DURATION_SECONDS") {
            Some(value) => value
                .parse()
                .with_context(|| "parse WARDEN_DURATION_SECONDS")?,
            None => DEFAULT_DURATION_SECONDS,
        };
        let validate_token = match env_value("WARDEN_VALIDATE_TOKEN") {
            Some(value) => parse_bool(&value).with_context(|| "parse WARDEN_VALIDATE_TOKEN")?,
            None => true,
        };
        let allowed_algorithms = match env_value("WARDEN_ALLOWED_ALGORITHMS") {
            Some(value) => parse_algorithms(split_list(&value))
                .with_context(|| "parse WARDEN_ALLOWED_ALGORITHMS")?,
            None => vec![Algorithm::RS256],
        };
        Ok(Self {
            bind_addr,
            metrics_bind,
            region: env_value("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            sts_endpoint: env_value("WARDEN_STS_ENDPOINT"),
            cognito_endpoint: env_value("WARDEN_COGNITO_ENDPOINT"),
            role_arn: env_value("ROLE"),
            duration_seconds,
            tenant_claim: env_value("WARDEN_TENANT_CLAIM")
                .unwrap_or_else(|| DEFAULT_TENANT_CLAIM.to_string()),
            identity_pool_claim: env_value("WARDEN_IDENTITY_POOL_CLAIM")
                .unwrap_or_else(|| DEFAULT_IDENTITY_POOL_CLAIM.to_string()),
            validate_token,
            declared_tenant_header: env_value("WARDEN_DECLARED_TENANT_HEADER")
                .unwrap_or_else(|| DEFAULT_DECLARED_TENANT_HEADER.to_string()),
            allowed_algorithms,
            allowed_issuers: env_value("WARDEN_ALLOWED_ISSUERS")
                .map(|value| split_list(&value).map(str::to_string).collect())
                .unwrap_or_default(),
            bucket: env_value("S3_BUCKET"),
            table: env_value("DB_TABLE"),
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("WARDEN_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read WARDEN_CONFIG: {path}"))?;
            let override_cfg: VendingConfigOverride = serde_yaml::from_str(&contents)
                .with_context(|| "parse vending config yaml")?;
            config.apply(override_cfg)?;
        }
        Ok(config)
    }

    fn apply(&mut self, override_cfg: VendingConfigOverride) -> Result<()> {
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.region {
            self.region = value;
        }
        if let Some(value) = override_cfg.sts_endpoint {
            self.sts_endpoint = Some(value);
        }
        if let Some(value) = override_cfg.cognito_endpoint {
            self.cognito_endpoint = Some(value);
        }
        if let Some(value) = override_cfg.role_arn {
            self.role_arn = Some(value);
        }
        if let Some(value) = override_cfg.duration_seconds {
            self.duration_seconds = value;
        }
        if let Some(value) = override_cfg.tenant_claim {
            self.tenant_claim = value;
        }
        if let Some(value) = override_cfg.identity_pool_claim {
            self.identity_pool_claim = value;
        }
        if let Some(value) = override_cfg.validate_token {
            self.validate_token = value;
        }
        if let Some(value) = override_cfg.declared_tenant_header {
            self.declared_tenant_header = value;
        }
        if let Some(values) = override_cfg.allowed_algorithms {
            self.allowed_algorithms = parse_algorithms(values.iter().map(String::as_str))
                .with_context(|| "parse allowed_algorithms")?;
        }
        if let Some(values) = override_cfg.allowed_issuers {
            self.allowed_issuers = values;
        }
        if let Some(value) = override_cfg.bucket {
            self.bucket = Some(value);
        }
        if let Some(value) = override_cfg.table {
            self.table = Some(value);
        }
        Ok(())
    }

    pub fn endpoints(&self) -> AwsEndpoints {
        let mut endpoints = AwsEndpoints::for_region(&self.region);
        if let Some(endpoint) = &self.sts_endpoint {
            endpoints = endpoints.with_sts_endpoint(endpoint);
        }
        if let Some(endpoint) = &self.cognito_endpoint {
            endpoints = endpoints.with_cognito_identity_endpoint(endpoint);
        }
        endpoints
    }

    pub fn claims_config(&self) -> ClaimsConfig {
        ClaimsConfig {
            tenant_claim: self.tenant_claim.clone(),
            identity_pool_claim: self.identity_pool_claim.clone(),
            allowed_algorithms: self.allowed_algorithms.clone(),
            allowed_issuers: self.allowed_issuers.clone(),
            ..ClaimsConfig::default()
        }
    }

    /// Fragments enabled by the configured bucket and table.
    pub fn policy_generator(&self) -> DeclarativePolicyGenerator {
        let mut generator = DeclarativePolicyGenerator::new();
        if let Some(bucket) = &self.bucket {
            generator = generator.s3_folder_per_tenant(bucket);
        }
        if let Some(table) = &self.table {
            generator = generator.dynamo_leading_key(table);
        }
        generator
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => bail!("expected a boolean, got {other}"),
    }
}

fn parse_algorithms<'a>(values: impl Iterator<Item = &'a str>) -> Result<Vec<Algorithm>> {
    let algorithms = values
        .map(|value| Algorithm::from_str(value).with_context(|| format!("unknown algorithm {value}")))
        .collect::<Result<Vec<_>>>()?;
    if algorithms.is_empty() {
        bail!("at least one algorithm is required");
    }
    Ok(algorithms)
}
