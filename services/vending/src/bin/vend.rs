// Command-line vendor: prints tenant-scoped credentials (or just the policy) as JSON.
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use vending::observability;
use warden_policy::DeclarativePolicyGenerator;
use warden_vendor::aws::{AwsEndpoints, CredentialsChain, DEFAULT_REGION, StsClient};
use warden_vendor::{CallerContext, DEFAULT_DURATION_SECONDS, DeclaredIdentity, TokenVendor};

const DEFAULT_ROLE_NAME: &str = "role-for-assuming-policies";

#[derive(Parser, Debug)]
#[command(name = "vend")]
#[command(about = "Vend temporary credentials scoped to one tenant")]
struct Args {
    /// Tenant the credentials are scoped to
    #[arg(long)]
    tenant: String,

    /// Role to assume
    #[arg(long, env = "ROLE", conflicts_with = "account_id")]
    role_arn: Option<String>,

    /// Account holding the default vending role
    #[arg(long)]
    account_id: Option<String>,

    /// Region for the token service
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    region: String,

    /// Token service endpoint override
    #[arg(long, env = "WARDEN_STS_ENDPOINT")]
    sts_endpoint: Option<String>,

    /// Requested session duration
    #[arg(long, default_value_t = DEFAULT_DURATION_SECONDS)]
    duration_seconds: u32,

    /// Bucket for the folder-per-tenant fragment
    #[arg(long)]
    bucket: Option<String>,

    /// Table for the leading-key fragment
    #[arg(long)]
    table: Option<String>,

    /// Include the queue-per-tenant fragment
    #[arg(long)]
    sqs_queue: bool,

    /// Include the tag-based secrets fragment
    #[arg(long)]
    secrets_tag: bool,

    /// Include the access-point-per-tenant fragment
    #[arg(long)]
    efs_access_point: bool,

    /// Parameter store path for the path-per-tenant fragment
    #[arg(long)]
    parameter_path: Option<String>,

    /// Extra template by name (repeatable)
    #[arg(long = "template")]
    templates: Vec<String>,

    /// Extra template parameter as key=value (repeatable)
    #[arg(long = "param", value_parser = parse_key_value)]
    params: Vec<(String, String)>,

    /// Fail when a placeholder is left unresolved
    #[arg(long)]
    strict_placeholders: bool,

    /// Print the scoped policy without contacting the token service
    #[arg(long)]
    policy_only: bool,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn generator(&self) -> DeclarativePolicyGenerator {
        let mut generator =
            DeclarativePolicyGenerator::new().strict_placeholders(self.strict_placeholders);
        if let Some(bucket) = &self.bucket {
            generator = generator.s3_folder_per_tenant(bucket);
        }
        if let Some(table) = &self.table {
            generator = generator.dynamo_leading_key(table);
        }
        if self.sqs_queue {
            generator = generator.sqs_tenant_queue();
        }
        if self.secrets_tag {
            generator = generator.secrets_manager_resource_tag();
        }
        if self.efs_access_point {
            generator = generator.efs_access_point_per_tenant();
        }
        if let Some(path) = &self.parameter_path {
            generator = generator.parameter_store_path_per_tenant(path);
        }
        for template in &self.templates {
            generator = generator.template(template);
        }
        for (key, value) in &self.params {
            generator = generator.parameter(key, value);
        }
        generator
    }

    fn role_arn(&self) -> Result<String> {
        match (&self.role_arn, &self.account_id) {
            (Some(role_arn), _) => Ok(role_arn.clone()),
            (None, Some(account_id)) => Ok(format!(
                "arn:aws:iam::{account_id}:role/{DEFAULT_ROLE_NAME}"
            )),
            (None, None) => bail!("either --role-arn or --account-id is required"),
        }
    }

    fn endpoints(&self) -> AwsEndpoints {
        let endpoints = AwsEndpoints::for_region(&self.region);
        match &self.sts_endpoint {
            Some(endpoint) => endpoints.with_sts_endpoint(endpoint),
            None => endpoints,
        }
    }
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw}"))?;
    if key.trim().is_empty() {
        return Err(format!("empty parameter name in {raw}"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    observability::init_cli_logging(args.verbose);

    let generator = args.generator();
    if args.policy_only {
        let policy = generator
            .clone()
            .tenant(&args.tenant)
            .generate_policy()
            .context("assemble policy")?;
        let pretty: serde_json::Value =
            serde_json::from_str(policy.as_str()).context("parse assembled policy")?;
        println!("{}", serde_json::to_string_pretty(&pretty)?);
        return Ok(());
    }

    let role_arn = args.role_arn()?;
    info!(tenant = %args.tenant, %role_arn, "vending credentials");
    let client = reqwest::Client::new();
    let sts = StsClient::with_credentials_provider(
        client.clone(),
        args.endpoints(),
        Arc::new(CredentialsChain::standard(client)),
    );
    let vendor = TokenVendor::new(Arc::new(DeclaredIdentity::new(role_arn)), generator, Arc::new(sts))
        .duration_seconds(args.duration_seconds);
    let credentials = vendor
        .vend_token(&CallerContext::declared(args.tenant.clone()))
        .await
        .context("vend credentials")?;
    println!("{}", serde_json::to_string_pretty(&credentials)?);
    Ok(())
}
