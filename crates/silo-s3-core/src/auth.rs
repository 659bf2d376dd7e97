//! Authentication boundary and the per-request frame.
//!
//! The credential center verifies request signatures and yields an
//! [`AccessBox`]; the gateway only defines the [`AuthCenter`] interface and
//! threads the resolved box through the typed [`ReqInfo`] frame instead of
//! an untyped context key.

use std::sync::Arc;

use silo_s3_model::error::S3Error;
use silo_s3_model::s3_error;
use silo_s3_model::types::{AccessBox, SessionToken};

/// Outcome of signature verification.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request carries no `Authorization` header; the caller proceeds
    /// anonymously and the backend falls back to the node key.
    #[error("no authorization header")]
    NoAuthorizationHeader,

    /// Verification ran and failed; the request must be rejected.
    #[error("authentication failed: {0}")]
    Failed(String),
}

/// The credential center consumed by the gateway.
///
/// Implementations verify AWS v2/v4 signatures and resolve the caller's
/// access box. All methods must be safe for concurrent use.
#[async_trait::async_trait]
pub trait AuthCenter: Send + Sync + 'static {
    /// Authenticate a request from its head.
    async fn authenticate(&self, parts: &http::request::Parts) -> Result<AccessBox, AuthError>;
}

/// Per-request log/trace frame carrying the request id, addressed bucket
/// and object, and the resolved access box.
#[derive(Debug, Clone, Default)]
pub struct ReqInfo {
    /// Request id assigned when the request entered the service.
    pub request_id: String,
    /// Bucket name from the request path; empty for bucket-less routes.
    pub bucket_name: String,
    /// Object name from the request path; empty for bucket routes.
    pub object_name: String,
    /// Access box installed by the auth middleware; `None` on the
    /// anonymous path.
    pub access_box: Option<Arc<AccessBox>>,
}

impl ReqInfo {
    /// The access box for operations that require one.
    ///
    /// A missing `gate` is synthesized as empty, so callers can rely on
    /// the field being present.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the box was never installed.
    pub fn box_data(&self) -> Result<AccessBox, S3Error> {
        let boxed = self
            .access_box
            .as_deref()
            .ok_or_else(|| S3Error::internal("couldn't get box data from context"))?;
        Ok(boxed.clone())
    }

    /// The session token permitting extended-ACL modification.
    ///
    /// # Errors
    ///
    /// Returns an internal error when the box or the token is absent.
    pub fn eacl_session_token(&self) -> Result<SessionToken, S3Error> {
        self.box_data()?
            .gate
            .eacl_session_token
            .ok_or_else(|| s3_error!(InternalError, "couldn't get eacl session token from a box"))
    }
}
