use guestflag_authz::{
    AuthenticationClass, FederatedTrust, IdentityPoolId, PolicyDocument, Region, ResourceName,
    RoleName,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPool {
    pub id: String,
    pub provider_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPoolClient {
    pub id: String,
    pub user_pool_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProviderRef {
    pub provider_name: String,
    pub client_id: String,
}

/// Role each authentication class of a pool federates into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMappings {
    pub authenticated: Option<ResourceName>,
    pub unauthenticated: Option<ResourceName>,
}

impl RoleMappings {
    pub fn for_class(&self, class: AuthenticationClass) -> Option<&ResourceName> {
        match class {
            AuthenticationClass::Authenticated => self.authenticated.as_ref(),
            AuthenticationClass::Unauthenticated => self.unauthenticated.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPool {
    pub id: IdentityPoolId,
    pub region: Region,
    pub allow_unauthenticated: bool,
    pub providers: Vec<IdentityProviderRef>,
    pub roles: RoleMappings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederatedRole {
    pub arn: ResourceName,
    pub name: RoleName,
    pub variant: AuthenticationClass,
    pub trust: FederatedTrust,
    pub policy: PolicyDocument,
}
