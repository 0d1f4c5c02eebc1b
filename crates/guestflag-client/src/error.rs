//! Aggregate error for the visitor chain.
//!
//! Every hop maps its failure onto one variant; the first failure aborts the
//! remaining hops.
use thiserror::Error;

pub type ChainResult<T> = Result<T, ChainError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("identity service error: {0}")]
    IdentityService(String),
    #[error("token issuance error: {0}")]
    TokenIssuance(String),
    #[error("trust policy mismatch: {0}")]
    TrustPolicyMismatch(String),
    /// The credentials hop failed for a reason other than its trust
    /// conditions, e.g. a malformed role name.
    #[error("credential exchange error: {0}")]
    CredentialExchange(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("evaluation error: {0}")]
    Evaluation(String),
    #[error("network error: {0}")]
    Network(String),
}

/// Hop of the chain a service call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Identity,
    OpenIdToken,
    Credentials,
    Evaluation,
}

impl ChainError {
    /// Map a control-plane error body onto the taxonomy.
    ///
    /// `internal` and a missing code mean the service itself failed and map
    /// to [`ChainError::Network`]. Other codes outside the taxonomy
    /// (validation) are charged to the stage that produced them.
    pub fn from_service(stage: Stage, code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "identity_service_error" => ChainError::IdentityService(message),
            "token_issuance_error" => ChainError::TokenIssuance(message),
            "trust_policy_mismatch" => ChainError::TrustPolicyMismatch(message),
            "access_denied" => ChainError::AccessDenied(message),
            "evaluation_error" | "not_found" => ChainError::Evaluation(message),
            "" | "internal" => ChainError::Network(message),
            _ => match stage {
                Stage::Identity => ChainError::IdentityService(message),
                Stage::OpenIdToken => ChainError::TokenIssuance(message),
                Stage::Credentials => ChainError::CredentialExchange(message),
                Stage::Evaluation => ChainError::Evaluation(message),
            },
        }
    }

    /// Map a non-success response. Server errors and bodies that are not a
    /// control-plane error document are network failures.
    pub fn from_response(stage: Stage, status: reqwest::StatusCode, body: &[u8]) -> Self {
        #[derive(serde::Deserialize)]
        struct ErrorBody {
            code: String,
            message: String,
        }

        if status.is_server_error() {
            return ChainError::Network(format!("upstream returned {status}"));
        }
        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(body) => ChainError::from_service(stage, &body.code, body.message),
            Err(_) => ChainError::Network(format!("unexpected status {status}")),
        }
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        ChainError::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_codes_map_regardless_of_stage() {
        assert_eq!(
            ChainError::from_service(Stage::Evaluation, "access_denied", "x"),
            ChainError::AccessDenied("x".to_string())
        );
        assert_eq!(
            ChainError::from_service(Stage::Identity, "trust_policy_mismatch", "x"),
            ChainError::TrustPolicyMismatch("x".to_string())
        );
        assert_eq!(
            ChainError::from_service(Stage::Evaluation, "not_found", "x"),
            ChainError::Evaluation("x".to_string())
        );
    }

    #[test]
    fn other_codes_fall_back_to_the_stage() {
        assert_eq!(
            ChainError::from_service(Stage::Identity, "validation_error", "x"),
            ChainError::IdentityService("x".to_string())
        );
        assert_eq!(
            ChainError::from_service(Stage::OpenIdToken, "conflict", "x"),
            ChainError::TokenIssuance("x".to_string())
        );
        assert_eq!(
            ChainError::from_service(Stage::Credentials, "validation_error", "x"),
            ChainError::CredentialExchange("x".to_string())
        );
    }

    #[test]
    fn service_failures_are_never_trust_mismatches() {
        for code in ["", "internal"] {
            let err = ChainError::from_service(Stage::Credentials, code, "boom");
            assert_eq!(err, ChainError::Network("boom".to_string()), "{code:?}");
        }
    }

    #[test]
    fn responses_map_by_status_then_body() {
        use reqwest::StatusCode;

        let gateway =
            ChainError::from_response(Stage::Credentials, StatusCode::BAD_GATEWAY, b"<html/>");
        assert!(matches!(gateway, ChainError::Network(_)), "{gateway}");

        let internal = br#"{"code":"internal","message":"store down"}"#;
        let err = ChainError::from_response(
            Stage::Credentials,
            StatusCode::INTERNAL_SERVER_ERROR,
            internal,
        );
        assert!(matches!(err, ChainError::Network(_)), "{err}");

        let err = ChainError::from_response(Stage::Credentials, StatusCode::NOT_FOUND, b"");
        assert!(matches!(err, ChainError::Network(_)), "{err}");

        let mismatch = br#"{"code":"trust_policy_mismatch","message":"amr"}"#;
        assert_eq!(
            ChainError::from_response(Stage::Credentials, StatusCode::FORBIDDEN, mismatch),
            ChainError::TrustPolicyMismatch("amr".to_string())
        );
    }
}
