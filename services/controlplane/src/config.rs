use anyhow::{Context, Result};
use guestflag_authz::{AccountId, Region};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_REGION: &str = "local-1";
pub const DEFAULT_ACCOUNT_ID: &str = "000000000000";
pub const DEFAULT_OPENID_TOKEN_TTL_SECS: u64 = 600;
pub const DEFAULT_IDENTITY_TTL_SECS: u64 = 3600;
pub const DEFAULT_CREDENTIAL_TTL_SECS: u64 = 900;
pub const DEFAULT_LOG_FILTER: &str = "info";

// Control plane configuration sourced from environment variables, optionally
// overridden by a YAML file.
#[derive(Debug, Clone)]
pub struct ControlPlaneConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub region: Region,
    pub account_id: AccountId,
    pub openid_token_ttl: Duration,
    pub identity_ttl: Duration,
    pub credential_ttl: Duration,
    /// Stack name to apply with the standard template at startup.
    pub bootstrap_stack: Option<String>,
    /// `EnvFilter` directives for the log output.
    pub log_filter: String,
    /// OTLP gRPC collector; spans stay local when unset.
    pub otlp_endpoint: Option<String>,
    pub instance_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ControlPlaneConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    region: Option<String>,
    account_id: Option<String>,
    openid_token_ttl_secs: Option<u64>,
    identity_ttl_secs: Option<u64>,
    credential_ttl_secs: Option<u64>,
    bootstrap_stack: Option<String>,
    log_filter: Option<String>,
    otlp_endpoint: Option<String>,
    instance_id: Option<String>,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8443)),
            metrics_bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            region: Region::new(DEFAULT_REGION),
            account_id: AccountId::new(DEFAULT_ACCOUNT_ID),
            openid_token_ttl: Duration::from_secs(DEFAULT_OPENID_TOKEN_TTL_SECS),
            identity_ttl: Duration::from_secs(DEFAULT_IDENTITY_TTL_SECS),
            credential_ttl: Duration::from_secs(DEFAULT_CREDENTIAL_TTL_SECS),
            bootstrap_stack: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            otlp_endpoint: None,
            instance_id: None,
        }
    }
}

impl ControlPlaneConfig {
    pub fn from_env() -> Result<Self> {
        let metrics_bind = std::env::var("GUESTFLAG_CP_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| "parse GUESTFLAG_CP_METRICS_BIND")?;
        let bind_addr = std::env::var("GUESTFLAG_CP_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8443".to_string())
            .parse()
            .with_context(|| "parse GUESTFLAG_CP_BIND")?;
        let region = std::env::var("GUESTFLAG_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string());
        let account_id =
            std::env::var("GUESTFLAG_ACCOUNT_ID").unwrap_or_else(|_| DEFAULT_ACCOUNT_ID.to_string());
        let config = Self {
            bind_addr,
            metrics_bind,
            region: Region::new(region),
            account_id: AccountId::new(account_id),
            openid_token_ttl: secs_from_env(
                "GUESTFLAG_OPENID_TOKEN_TTL_SECS",
                DEFAULT_OPENID_TOKEN_TTL_SECS,
            )?,
            identity_ttl: secs_from_env("GUESTFLAG_IDENTITY_TTL_SECS", DEFAULT_IDENTITY_TTL_SECS)?,
            credential_ttl: secs_from_env(
                "GUESTFLAG_CREDENTIAL_TTL_SECS",
                DEFAULT_CREDENTIAL_TTL_SECS,
            )?,
            bootstrap_stack: non_empty_env("GUESTFLAG_CP_BOOTSTRAP_STACK"),
            log_filter: non_empty_env("GUESTFLAG_CP_LOG")
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            otlp_endpoint: non_empty_env("GUESTFLAG_CP_OTLP_ENDPOINT"),
            instance_id: non_empty_env("GUESTFLAG_CP_INSTANCE_ID"),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("GUESTFLAG_CP_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read GUESTFLAG_CP_CONFIG: {path}"))?;
            let override_cfg: ControlPlaneConfigOverride = serde_yaml::from_str(&contents)
                .with_context(|| "parse control plane config yaml")?;
            if let Some(value) = override_cfg.bind_addr {
                config.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
            }
            if let Some(value) = override_cfg.metrics_bind {
                config.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
            }
            if let Some(value) = override_cfg.region {
                config.region = Region::new(value);
            }
            if let Some(value) = override_cfg.account_id {
                config.account_id = AccountId::new(value);
            }
            if let Some(value) = override_cfg.openid_token_ttl_secs {
                config.openid_token_ttl = Duration::from_secs(value);
            }
            if let Some(value) = override_cfg.identity_ttl_secs {
                config.identity_ttl = Duration::from_secs(value);
            }
            if let Some(value) = override_cfg.credential_ttl_secs {
                config.credential_ttl = Duration::from_secs(value);
            }
            if let Some(value) = override_cfg.bootstrap_stack {
                config.bootstrap_stack = Some(value);
            }
            if let Some(value) = override_cfg.log_filter {
                config.log_filter = value;
            }
            if let Some(value) = override_cfg.otlp_endpoint {
                config.otlp_endpoint = Some(value);
            }
            if let Some(value) = override_cfg.instance_id {
                config.instance_id = Some(value);
            }
            config.validate()?;
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.region.is_empty() {
            anyhow::bail!("region must not be empty");
        }
        if self.account_id.is_empty() || !self.account_id.as_str().chars().all(|c| c.is_ascii_digit()) {
            anyhow::bail!("account id must be numeric: {}", self.account_id);
        }
        for (name, ttl) in [
            ("openid token ttl", self.openid_token_ttl),
            ("identity ttl", self.identity_ttl),
            ("credential ttl", self.credential_ttl),
        ] {
            if ttl.is_zero() {
                anyhow::bail!("{name} must be positive");
            }
        }
        EnvFilter::try_new(&self.log_filter)
            .with_context(|| format!("invalid log filter {:?}", self.log_filter))?;
        if let Some(endpoint) = &self.otlp_endpoint
            && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            anyhow::bail!("otlp endpoint must be an http(s) url: {endpoint}");
        }
        Ok(())
    }

    /// Issuer of OpenID tokens minted by the identity broker.
    pub fn identity_issuer(&self) -> String {
        format!("https://identity.{}.guestflag", self.region)
    }

    /// Issuer of session tokens minted by the credential federator.
    pub fn sts_issuer(&self) -> String {
        format!("https://sts.{}.guestflag", self.region)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn secs_from_env(key: &str, default: u64) -> Result<Duration> {
    match std::env::var(key) {
        Ok(value) => {
            let secs: u64 = value.parse().with_context(|| format!("parse {key}"))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(default)),
    }
}
