//! The anonymous visitor chain.
//!
//! # Purpose
//! Runs the four hops in order: anonymous identity, OpenID token, temporary
//! role credentials, feature evaluation. Each hop consumes the typed output
//! of the previous one.
//!
//! # Key invariants
//! - Strictly sequential; the first failure aborts the rest.
//! - No retries and no caching: every run walks the whole chain.
//! - The whole run is bounded by the configured timeout, reported as a
//!   network error.
//! - The entity id is fixed, so every anonymous caller gets the same
//!   variation for a given split.
use crate::config::ClientConfig;
use crate::error::{ChainError, ChainResult};
use crate::services::{EvaluationResult, VisitorServices};
use std::fmt;

pub const ENTITY_ID: &str = "artificial_id";

/// What the caller renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagDecision {
    Enabled,
    Disabled,
    /// The chain failed or served a non-boolean value.
    Unknown,
}

impl fmt::Display for FlagDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlagDecision::Enabled => "enabled",
            FlagDecision::Disabled => "disabled",
            FlagDecision::Unknown => "unknown",
        })
    }
}

pub struct ClientChain<S> {
    config: ClientConfig,
    services: S,
}

impl<S: VisitorServices> ClientChain<S> {
    pub fn new(config: ClientConfig, services: S) -> Self {
        Self { config, services }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Walk the chain once and return the raw evaluation.
    pub async fn run(&self) -> ChainResult<EvaluationResult> {
        let timeout = self.config.timeout;
        tokio::time::timeout(timeout, self.walk())
            .await
            .map_err(|_| ChainError::Network(format!("chain timed out after {timeout:?}")))?
    }

    /// Walk the chain and reduce the outcome to a decision; failures become
    /// [`FlagDecision::Unknown`].
    pub async fn decide(&self) -> FlagDecision {
        match self.run().await {
            Ok(result) => match result.value.as_bool() {
                Some(true) => FlagDecision::Enabled,
                Some(false) => FlagDecision::Disabled,
                None => {
                    tracing::warn!(
                        feature = %self.config.feature_name,
                        value_type = result.value.type_name(),
                        "feature served a non-boolean value"
                    );
                    FlagDecision::Unknown
                }
            },
            Err(err) => {
                tracing::warn!(
                    feature = %self.config.feature_name,
                    error = %err,
                    "visitor chain failed"
                );
                FlagDecision::Unknown
            }
        }
    }

    async fn walk(&self) -> ChainResult<EvaluationResult> {
        let config = &self.config;
        let identity_id = self
            .services
            .get_id(&config.identity_pool_id, &config.region)
            .await?;
        tracing::debug!(identity_id = %identity_id, "anonymous identity obtained");

        let token = self.services.get_open_id_token(&identity_id).await?;
        let credentials = self
            .services
            .assume_role_with_web_identity(&config.role_arn, &token.token)
            .await?;
        tracing::debug!(
            access_key_id = %credentials.access_key_id,
            expiration = %credentials.expiration,
            "temporary credentials obtained"
        );

        let result = self
            .services
            .evaluate_feature(
                &credentials,
                &config.project_name,
                &config.feature_name,
                ENTITY_ID,
            )
            .await?;
        tracing::info!(
            project = %config.project_name,
            feature = %config.feature_name,
            variation = %result.variation,
            reason = ?result.reason,
            "feature evaluated"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{OpenIdToken, TemporaryCredentials};
    use async_trait::async_trait;
    use guestflag_rollout::{Reason, VariationValue};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeServices {
        calls: Mutex<Vec<&'static str>>,
        fail_at: Option<&'static str>,
        value: Option<VariationValue>,
        delay: Option<Duration>,
    }

    impl FakeServices {
        fn record(&self, call: &'static str) -> ChainResult<()> {
            self.calls.lock().expect("calls").push(call);
            match self.fail_at {
                Some("get_id") if call == "get_id" => {
                    Err(ChainError::IdentityService("unknown pool".to_string()))
                }
                Some("assume") if call == "assume" => {
                    Err(ChainError::TrustPolicyMismatch("aud".to_string()))
                }
                Some("evaluate") if call == "evaluate" => {
                    Err(ChainError::AccessDenied("policy".to_string()))
                }
                _ => Ok(()),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().expect("calls").clone()
        }
    }

    #[async_trait]
    impl VisitorServices for FakeServices {
        async fn get_id(&self, identity_pool_id: &str, region: &str) -> ChainResult<String> {
            self.record("get_id")?;
            assert_eq!(identity_pool_id, "local-1:pool");
            assert_eq!(region, "local-1");
            Ok("local-1:visitor".to_string())
        }

        async fn get_open_id_token(&self, identity_id: &str) -> ChainResult<OpenIdToken> {
            self.record("token")?;
            Ok(OpenIdToken {
                identity_id: identity_id.to_string(),
                token: "jwt".to_string(),
            })
        }

        async fn assume_role_with_web_identity(
            &self,
            role_arn: &str,
            web_identity_token: &str,
        ) -> ChainResult<TemporaryCredentials> {
            self.record("assume")?;
            assert_eq!(role_arn, "grn:iam::000000000000:role/r");
            assert_eq!(web_identity_token, "jwt");
            Ok(TemporaryCredentials {
                access_key_id: "GFTA0000000000000000".to_string(),
                secret_access_key: "secret".to_string(),
                session_token: "session".to_string(),
                expiration: chrono::Utc::now(),
            })
        }

        async fn evaluate_feature(
            &self,
            _credentials: &TemporaryCredentials,
            project: &str,
            feature: &str,
            entity_id: &str,
        ) -> ChainResult<EvaluationResult> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.record("evaluate")?;
            assert_eq!((project, feature, entity_id), ("TestProject", "TestFeature", ENTITY_ID));
            Ok(EvaluationResult {
                variation: "FeatureEnabled".to_string(),
                value: self.value.clone().unwrap_or(VariationValue::Bool(true)),
                reason: Reason::LaunchRuleMatch,
                launch: Some("TestLaunch".to_string()),
            })
        }
    }

    fn config() -> ClientConfig {
        ClientConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            region: "local-1".to_string(),
            identity_pool_id: "local-1:pool".to_string(),
            user_pool_id: "local-1_ABCDEFGHI".to_string(),
            user_pool_client_id: "client".to_string(),
            role_arn: "grn:iam::000000000000:role/r".to_string(),
            project_name: "TestProject".to_string(),
            feature_name: "TestFeature".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn hops_run_in_order() {
        let chain = ClientChain::new(config(), FakeServices::default());
        assert_eq!(chain.decide().await, FlagDecision::Enabled);
        assert_eq!(chain.services.calls(), ["get_id", "token", "assume", "evaluate"]);
    }

    #[tokio::test]
    async fn first_failure_aborts_the_rest() {
        let chain = ClientChain::new(
            config(),
            FakeServices {
                fail_at: Some("assume"),
                ..FakeServices::default()
            },
        );
        let err = chain.run().await.expect_err("trust");
        assert!(matches!(err, ChainError::TrustPolicyMismatch(_)));
        assert_eq!(chain.services.calls(), ["get_id", "token", "assume"]);

        let chain = ClientChain::new(
            config(),
            FakeServices {
                fail_at: Some("get_id"),
                ..FakeServices::default()
            },
        );
        assert_eq!(chain.decide().await, FlagDecision::Unknown);
        assert_eq!(chain.services.calls(), ["get_id"]);
    }

    #[tokio::test]
    async fn denied_evaluation_is_unknown() {
        let chain = ClientChain::new(
            config(),
            FakeServices {
                fail_at: Some("evaluate"),
                ..FakeServices::default()
            },
        );
        assert_eq!(chain.decide().await, FlagDecision::Unknown);
    }

    #[tokio::test]
    async fn boolean_values_map_to_decisions() {
        let chain = ClientChain::new(
            config(),
            FakeServices {
                value: Some(VariationValue::Bool(false)),
                ..FakeServices::default()
            },
        );
        assert_eq!(chain.decide().await, FlagDecision::Disabled);

        let chain = ClientChain::new(
            config(),
            FakeServices {
                value: Some(VariationValue::String("on".to_string())),
                ..FakeServices::default()
            },
        );
        assert_eq!(chain.decide().await, FlagDecision::Unknown);
    }

    #[tokio::test]
    async fn slow_chain_times_out_as_network_error() {
        let chain = ClientChain::new(
            ClientConfig {
                timeout: Duration::from_millis(20),
                ..config()
            },
            FakeServices {
                delay: Some(Duration::from_secs(5)),
                ..FakeServices::default()
            },
        );
        let err = chain.run().await.expect_err("timeout");
        assert!(matches!(err, ChainError::Network(_)));
    }
}
