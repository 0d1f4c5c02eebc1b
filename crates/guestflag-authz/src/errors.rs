use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("invalid resource name: {0}")]
    InvalidResourceName(String),
    #[error("policy grants a resource pattern broader than the provisioned resources: {0}")]
    BroadResource(String),
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
    #[error("trust condition not satisfied: {0}")]
    TrustConditionUnmet(String),
    #[error("token expired")]
    Expired,
    #[error("key error: {0}")]
    Key(String),
    #[error("request signature invalid: {0}")]
    Signature(String),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

pub type AuthzResult<T> = Result<T, AuthzError>;
