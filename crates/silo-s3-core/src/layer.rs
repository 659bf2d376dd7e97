//! The object-layer façade the coordinators depend on.
//!
//! The gateway owns this interface; a concrete backend (the Silo client)
//! implements it. All operations are cancel-safe: dropping the returned
//! future must abandon the call without corrupting backend state. Payload
//! streams are consumed exactly once.

use std::collections::HashMap;
use std::sync::Arc;

use silo_s3_model::PayloadStream;
use silo_s3_model::error::{S3Error, S3ErrorCode};
use silo_s3_model::types::{
    AccessBox, BucketInfo, BucketSettings, ContainerId, EaclTable, ObjectInfo, ObjectLock,
    ObjectVersion, PlacementPolicy, SessionToken, TagSet,
};

use crate::encryption::EncryptionParams;

/// Parameters for [`ObjectLayer::put_object`].
#[derive(Debug)]
pub struct PutObjectParams {
    /// Destination bucket name.
    pub bucket: String,
    /// Destination object name.
    pub object: String,
    /// Object payload; consumed exactly once by the layer.
    pub payload: PayloadStream,
    /// Declared payload size; `-1` when unknown.
    pub size: i64,
    /// Attributes to store on the object.
    pub header: HashMap<String, String>,
}

/// Parameters for [`ObjectLayer::get_object_info`].
#[derive(Debug, Clone)]
pub struct HeadObjectParams {
    /// Resolved bucket.
    pub bucket: BucketInfo,
    /// Object name.
    pub object: String,
    /// Version id; empty addresses the current version.
    pub version_id: String,
}

/// Parameters for [`ObjectLayer::copy_object`].
#[derive(Debug, Clone)]
pub struct CopyObjectParams {
    /// Source object descriptor from the preceding head call.
    pub src_object: ObjectInfo,
    /// Resolved source bucket.
    pub src_bucket: BucketInfo,
    /// Resolved destination bucket.
    pub dst_bucket: BucketInfo,
    /// Destination object name.
    pub dst_object: String,
    /// Source payload size.
    pub src_size: i64,
    /// Attributes to store on the destination object.
    pub header: HashMap<String, String>,
    /// SSE-C parameters validated against the source.
    pub encryption: EncryptionParams,
    /// Redundancy override; empty means the placement policy decides.
    pub copies_number: Vec<u32>,
    /// Lock to apply to the destination object.
    pub lock: Option<ObjectLock>,
}

/// Parameters for [`ObjectLayer::create_bucket`].
#[derive(Debug, Clone)]
pub struct CreateBucketParams {
    /// Bucket name.
    pub name: String,
    /// Basic ACL mask for the new container.
    pub acl: u32,
    /// Placement policy for the new container.
    pub policy: PlacementPolicy,
    /// The location constraint the policy was resolved from; empty when
    /// none was requested.
    pub location_constraint: String,
    /// Whether object lock is enabled from creation.
    pub object_lock_enabled: bool,
}

/// Parameters for [`ObjectLayer::put_bucket_acl`].
#[derive(Debug, Clone)]
pub struct PutBucketAclParams {
    /// Resolved bucket.
    pub bucket: BucketInfo,
    /// Extended-ACL table to install.
    pub eacl: EaclTable,
    /// Session token authorizing the modification.
    pub session_token: Option<SessionToken>,
}

/// Error category reported by the object layer.
///
/// The gateway classifies these into the S3 taxonomy; anything not
/// recognized becomes `InternalError` with the message preserved.
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    /// The backend refused the operation.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The addressed bucket does not exist.
    #[error("bucket not found: {0}")]
    NoSuchBucket(String),

    /// The addressed object does not exist.
    #[error("object not found: {0}")]
    NoSuchKey(String),

    /// A backend-side precondition was not met.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The backend rejected the request as malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Anything else: transport failures, internal backend errors.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<LayerError> for S3Error {
    fn from(err: LayerError) -> Self {
        let code = match &err {
            LayerError::AccessDenied(_) => S3ErrorCode::AccessDenied,
            LayerError::NoSuchBucket(_) => S3ErrorCode::NoSuchBucket,
            LayerError::NoSuchKey(_) => S3ErrorCode::NoSuchKey,
            LayerError::PreconditionFailed(_) => S3ErrorCode::PreconditionFailed,
            LayerError::BadRequest(_) => S3ErrorCode::BadRequest,
            LayerError::Backend(_) => {
                return S3Error::internal(err.to_string());
            }
        };
        S3Error::new(code).with_source(err)
    }
}

/// Convenience result type for layer operations.
pub type LayerResult<T> = Result<T, LayerError>;

/// The narrow capability set the coordinators are written against.
#[async_trait::async_trait]
pub trait ObjectLayer: Send + Sync + 'static {
    /// Store an object, streaming the payload through.
    async fn put_object(&self, params: PutObjectParams) -> LayerResult<ObjectInfo>;

    /// Head an object without reading its payload.
    async fn get_object_info(&self, params: HeadObjectParams) -> LayerResult<ObjectInfo>;

    /// Read the tag set of an object version; returns the resolved
    /// version id alongside the tags.
    async fn get_object_tagging(&self, version: &ObjectVersion) -> LayerResult<(String, TagSet)>;

    /// Replace the tag set of an object version; returns the resolved
    /// version id.
    async fn put_object_tagging(
        &self,
        version: &ObjectVersion,
        tags: TagSet,
    ) -> LayerResult<String>;

    /// Copy an object inside the backend.
    async fn copy_object(&self, params: CopyObjectParams) -> LayerResult<ObjectInfo>;

    /// Create a container backing a bucket; returns its id.
    async fn create_bucket(
        &self,
        params: CreateBucketParams,
        access_box: &AccessBox,
    ) -> LayerResult<ContainerId>;

    /// Resolve a bucket by name.
    async fn get_bucket_info(&self, bucket: &str) -> LayerResult<BucketInfo>;

    /// Read bucket-level settings (versioning, lock configuration).
    async fn get_bucket_settings(&self, bucket: &BucketInfo) -> LayerResult<BucketSettings>;

    /// Install an extended-ACL table on a bucket.
    async fn put_bucket_acl(&self, params: PutBucketAclParams) -> LayerResult<()>;
}

/// Shared handle to a layer implementation.
pub type SharedObjectLayer = Arc<dyn ObjectLayer>;
