//! Client chain configuration.
//!
//! Built once and handed to [`crate::ClientChain`]; nothing reads the
//! environment after construction. Project and feature names must match what
//! was provisioned; `from_stack_outputs` is the easiest way to keep them in
//! sync.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8443";
pub const DEFAULT_REGION: &str = "local-1";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub endpoint: String,
    pub region: String,
    pub identity_pool_id: String,
    pub user_pool_id: String,
    pub user_pool_client_id: String,
    pub role_arn: String,
    pub project_name: String,
    pub feature_name: String,
    pub timeout: Duration,
}

#[derive(Debug, Default, Deserialize)]
struct ClientConfigOverride {
    endpoint: Option<String>,
    region: Option<String>,
    identity_pool_id: Option<String>,
    user_pool_id: Option<String>,
    user_pool_client_id: Option<String>,
    role_arn: Option<String>,
    project_name: Option<String>,
    feature_name: Option<String>,
    timeout_ms: Option<u64>,
}

impl ClientConfig {
    /// Load from `GUESTFLAG_*` variables, then apply the YAML file at `path`
    /// if one is given.
    pub fn from_env_or_yaml(path: Option<&Path>) -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok().filter(|value| !value.is_empty());
        let timeout_ms = match env("GUESTFLAG_TIMEOUT_MS") {
            Some(value) => value.parse().with_context(|| "parse GUESTFLAG_TIMEOUT_MS")?,
            None => DEFAULT_TIMEOUT_MS,
        };
        let mut config = Self {
            endpoint: env("GUESTFLAG_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            region: env("GUESTFLAG_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            identity_pool_id: env("GUESTFLAG_IDENTITY_POOL_ID").unwrap_or_default(),
            user_pool_id: env("GUESTFLAG_USER_POOL_ID").unwrap_or_default(),
            user_pool_client_id: env("GUESTFLAG_USER_POOL_CLIENT_ID").unwrap_or_default(),
            role_arn: env("GUESTFLAG_ROLE_ARN").unwrap_or_default(),
            project_name: env("GUESTFLAG_PROJECT_NAME").unwrap_or_default(),
            feature_name: env("GUESTFLAG_FEATURE_NAME").unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
        };

        if let Some(path) = path {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("read client config {}", path.display()))?;
            let override_cfg: ClientConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse client config yaml")?;
            config.apply(override_cfg);
        }
        config.validate()?;
        Ok(config)
    }

    /// Build from the outputs of a provisioned standard stack.
    pub fn from_stack_outputs(
        endpoint: impl Into<String>,
        region: impl Into<String>,
        outputs: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let output = |key: &str| {
            outputs
                .get(key)
                .cloned()
                .with_context(|| format!("stack output {key} missing"))
        };
        let config = Self {
            endpoint: endpoint.into(),
            region: region.into(),
            identity_pool_id: output("IdentityPoolId")?,
            user_pool_id: output("UserPoolId")?,
            user_pool_client_id: output("UserPoolClientId")?,
            role_arn: output("RoleArn")?,
            project_name: output("EvidentlyProjectName")?,
            feature_name: output("EvidentlyFeatureName")?,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("endpoint", &self.endpoint),
            ("region", &self.region),
            ("identity_pool_id", &self.identity_pool_id),
            ("user_pool_id", &self.user_pool_id),
            ("user_pool_client_id", &self.user_pool_client_id),
            ("role_arn", &self.role_arn),
            ("project_name", &self.project_name),
            ("feature_name", &self.feature_name),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{name} must not be empty");
            }
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            anyhow::bail!("endpoint must be an http(s) url: {}", self.endpoint);
        }
        if self.timeout.is_zero() {
            anyhow::bail!("timeout must be positive");
        }
        Ok(())
    }

    fn apply(&mut self, override_cfg: ClientConfigOverride) {
        let fields = [
            (&mut self.endpoint, override_cfg.endpoint),
            (&mut self.region, override_cfg.region),
            (&mut self.identity_pool_id, override_cfg.identity_pool_id),
            (&mut self.user_pool_id, override_cfg.user_pool_id),
            (&mut self.user_pool_client_id, override_cfg.user_pool_client_id),
            (&mut self.role_arn, override_cfg.role_arn),
            (&mut self.project_name, override_cfg.project_name),
            (&mut self.feature_name, override_cfg.feature_name),
        ];
        for (field, value) in fields {
            if let Some(value) = value {
                *field = value;
            }
        }
        if let Some(timeout_ms) = override_cfg.timeout_ms {
            self.timeout = Duration::from_millis(timeout_ms);
        }
    }
}
