//! Development credential center.
//!
//! Accepts any `Authorization` header and hands out a fixed access box;
//! requests without one take the anonymous path. Signature verification
//! belongs to the real credential center, not this stand-in.

use silo_s3_core::auth::{AuthCenter, AuthError};
use silo_s3_model::types::{AccessBox, ContainerPolicy, GateData, SessionToken};

/// Auth center that trusts every signed request.
#[derive(Debug, Clone)]
pub struct DevAuthCenter {
    template: AccessBox,
}

impl DevAuthCenter {
    /// Create a center issuing boxes with the given named policies and a
    /// fixed session token.
    #[must_use]
    pub fn new(policies: Vec<ContainerPolicy>) -> Self {
        Self {
            template: AccessBox {
                gate: GateData {
                    eacl_session_token: Some(SessionToken("dev-session-token".to_owned())),
                },
                policies,
            },
        }
    }
}

impl Default for DevAuthCenter {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait::async_trait]
impl AuthCenter for DevAuthCenter {
    async fn authenticate(&self, parts: &http::request::Parts) -> Result<AccessBox, AuthError> {
        if !parts.headers.contains_key(http::header::AUTHORIZATION) {
            return Err(AuthError::NoAuthorizationHeader);
        }
        Ok(self.template.clone())
    }
}
