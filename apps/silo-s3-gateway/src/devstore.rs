//! In-memory object layer for local development and tests.
//!
//! Stands in for the Silo backend client: payloads live on the heap,
//! hashes are plain MD5, ids are fresh UUIDs. Not suitable for anything
//! beyond a single-process sandbox.

use std::collections::HashMap;

use chrono::Utc;
use md5::{Digest, Md5};
use parking_lot::Mutex;
use silo_s3_core::headers::CONTENT_TYPE_ATTR;
use silo_s3_core::layer::{
    CopyObjectParams, CreateBucketParams, HeadObjectParams, LayerError, LayerResult, ObjectLayer,
    PutBucketAclParams, PutObjectParams,
};
use silo_s3_model::types::{
    AccessBox, BucketInfo, BucketSettings, ContainerId, EaclTable, LockConfiguration, ObjectInfo,
    ObjectVersion, PlacementPolicy, TagSet,
};
use uuid::Uuid;

#[derive(Debug)]
struct ObjectRecord {
    info: ObjectInfo,
    payload: Vec<u8>,
    tags: TagSet,
}

#[derive(Debug)]
struct BucketRecord {
    info: BucketInfo,
    settings: BucketSettings,
    basic_acl: u32,
    eacl: Option<EaclTable>,
    objects: HashMap<String, ObjectRecord>,
}

/// A single-process object layer keeping everything in memory.
#[derive(Debug, Default)]
pub struct MemoryObjectLayer {
    buckets: Mutex<HashMap<String, BucketRecord>>,
    owner: String,
}

impl MemoryObjectLayer {
    /// Create an empty store owned by the given account id.
    #[must_use]
    pub fn new(owner: &str) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            owner: owner.to_owned(),
        }
    }

    /// Placement policy a bucket was created with, for inspection in
    /// tests.
    #[must_use]
    pub fn bucket_policy(&self, bucket: &str) -> Option<PlacementPolicy> {
        self.buckets
            .lock()
            .get(bucket)
            .map(|record| record.info.placement_policy.clone())
    }

    /// Basic ACL a bucket was created with, for inspection in tests.
    #[must_use]
    pub fn bucket_basic_acl(&self, bucket: &str) -> Option<u32> {
        self.buckets.lock().get(bucket).map(|record| record.basic_acl)
    }

    /// Extended-ACL table installed on a bucket, for inspection in tests.
    #[must_use]
    pub fn bucket_eacl(&self, bucket: &str) -> Option<EaclTable> {
        self.buckets
            .lock()
            .get(bucket)
            .and_then(|record| record.eacl.clone())
    }

    fn hash_hex(payload: &[u8]) -> String {
        Md5::digest(payload)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

#[async_trait::async_trait]
impl ObjectLayer for MemoryObjectLayer {
    async fn put_object(&self, params: PutObjectParams) -> LayerResult<ObjectInfo> {
        // Drain the stream before taking the lock.
        let payload = params
            .payload
            .collect()
            .await
            .map_err(|e| LayerError::Backend(e.into()))?;

        if params.size >= 0 && params.size != payload.len() as i64 {
            return Err(LayerError::BadRequest(format!(
                "declared size {} does not match payload size {}",
                params.size,
                payload.len()
            )));
        }

        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .get_mut(&params.bucket)
            .ok_or_else(|| LayerError::NoSuchBucket(params.bucket.clone()))?;

        let content_type = params
            .header
            .get(CONTENT_TYPE_ATTR)
            .cloned()
            .unwrap_or_default();

        let info = ObjectInfo {
            bucket: params.bucket.clone(),
            name: params.object.clone(),
            id: Uuid::new_v4().to_string(),
            size: payload.len() as i64,
            created: Utc::now(),
            content_type,
            headers: params.header,
            hash_sum: Self::hash_hex(&payload),
            version_id: String::new(),
        };

        bucket.objects.insert(
            params.object,
            ObjectRecord {
                info: info.clone(),
                payload: payload.to_vec(),
                tags: TagSet::new(),
            },
        );

        Ok(info)
    }

    async fn get_object_info(&self, params: HeadObjectParams) -> LayerResult<ObjectInfo> {
        let buckets = self.buckets.lock();
        let bucket = buckets
            .get(&params.bucket.name)
            .ok_or_else(|| LayerError::NoSuchBucket(params.bucket.name.clone()))?;
        bucket
            .objects
            .get(&params.object)
            .map(|record| record.info.clone())
            .ok_or_else(|| LayerError::NoSuchKey(params.object.clone()))
    }

    async fn get_object_tagging(&self, version: &ObjectVersion) -> LayerResult<(String, TagSet)> {
        let buckets = self.buckets.lock();
        let bucket = buckets
            .get(&version.bucket.name)
            .ok_or_else(|| LayerError::NoSuchBucket(version.bucket.name.clone()))?;
        let record = bucket
            .objects
            .get(&version.object)
            .ok_or_else(|| LayerError::NoSuchKey(version.object.clone()))?;
        Ok((record.info.version().to_owned(), record.tags.clone()))
    }

    async fn put_object_tagging(
        &self,
        version: &ObjectVersion,
        tags: TagSet,
    ) -> LayerResult<String> {
        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .get_mut(&version.bucket.name)
            .ok_or_else(|| LayerError::NoSuchBucket(version.bucket.name.clone()))?;
        let record = bucket
            .objects
            .get_mut(&version.object)
            .ok_or_else(|| LayerError::NoSuchKey(version.object.clone()))?;
        record.tags = tags;
        Ok(record.info.version().to_owned())
    }

    async fn copy_object(&self, params: CopyObjectParams) -> LayerResult<ObjectInfo> {
        let mut buckets = self.buckets.lock();

        let payload = buckets
            .get(&params.src_bucket.name)
            .ok_or_else(|| LayerError::NoSuchBucket(params.src_bucket.name.clone()))?
            .objects
            .get(&params.src_object.name)
            .ok_or_else(|| LayerError::NoSuchKey(params.src_object.name.clone()))?
            .payload
            .clone();

        let dst_bucket = buckets
            .get_mut(&params.dst_bucket.name)
            .ok_or_else(|| LayerError::NoSuchBucket(params.dst_bucket.name.clone()))?;

        let content_type = params
            .header
            .get(CONTENT_TYPE_ATTR)
            .cloned()
            .unwrap_or_default();

        let info = ObjectInfo {
            bucket: params.dst_bucket.name.clone(),
            name: params.dst_object.clone(),
            id: Uuid::new_v4().to_string(),
            size: payload.len() as i64,
            created: Utc::now(),
            content_type,
            headers: params.header,
            hash_sum: Self::hash_hex(&payload),
            version_id: String::new(),
        };

        dst_bucket.objects.insert(
            params.dst_object,
            ObjectRecord {
                info: info.clone(),
                payload,
                tags: TagSet::new(),
            },
        );

        Ok(info)
    }

    async fn create_bucket(
        &self,
        params: CreateBucketParams,
        _access_box: &AccessBox,
    ) -> LayerResult<ContainerId> {
        let mut buckets = self.buckets.lock();
        if buckets.contains_key(&params.name) {
            return Err(LayerError::BadRequest(format!(
                "bucket already exists: {}",
                params.name
            )));
        }

        let container_id = ContainerId(Uuid::new_v4().to_string());
        let settings = BucketSettings {
            versioning_enabled: false,
            lock_configuration: params.object_lock_enabled.then(|| LockConfiguration {
                object_lock_enabled: true,
                default_retention: None,
            }),
        };

        buckets.insert(
            params.name.clone(),
            BucketRecord {
                info: BucketInfo {
                    name: params.name,
                    container_id: container_id.clone(),
                    owner: self.owner.clone(),
                    placement_policy: params.policy,
                    created: Utc::now(),
                },
                settings,
                basic_acl: params.acl,
                eacl: None,
                objects: HashMap::new(),
            },
        );

        Ok(container_id)
    }

    async fn get_bucket_info(&self, bucket: &str) -> LayerResult<BucketInfo> {
        self.buckets
            .lock()
            .get(bucket)
            .map(|record| record.info.clone())
            .ok_or_else(|| LayerError::NoSuchBucket(bucket.to_owned()))
    }

    async fn get_bucket_settings(&self, bucket: &BucketInfo) -> LayerResult<BucketSettings> {
        self.buckets
            .lock()
            .get(&bucket.name)
            .map(|record| record.settings.clone())
            .ok_or_else(|| LayerError::NoSuchBucket(bucket.name.clone()))
    }

    async fn put_bucket_acl(&self, params: PutBucketAclParams) -> LayerResult<()> {
        if params.session_token.is_none() {
            return Err(LayerError::AccessDenied(
                "extended ACL modification requires a session token".to_owned(),
            ));
        }

        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .get_mut(&params.bucket.name)
            .ok_or_else(|| LayerError::NoSuchBucket(params.bucket.name.clone()))?;
        bucket.eacl = Some(params.eacl);
        Ok(())
    }
}
