//! S3 operation coordinators.
//!
//! One method per operation on [`Gateway`](crate::gateway::Gateway), each a
//! linear pipeline: read headers, resolve buckets, call the object layer,
//! shape the output. A step's failure aborts the remaining steps; nothing
//! already committed to the backend is rolled back.

pub mod bucket;
pub mod object;
pub mod tagging;

use http::HeaderMap;
use silo_s3_model::error::S3Error;
use silo_s3_model::s3_error;
use silo_s3_model::types::BucketInfo;

use crate::gateway::Gateway;
use crate::headers::header_str;

impl Gateway {
    /// Resolve a bucket and verify the expected-owner header when present.
    pub(crate) async fn get_bucket_and_check_owner(
        &self,
        headers: &HeaderMap,
        bucket: &str,
        owner_header: &str,
    ) -> Result<BucketInfo, S3Error> {
        let info = self.layer.get_bucket_info(bucket).await.map_err(S3Error::from)?;
        if let Some(expected) = header_str(headers, owner_header) {
            if expected != info.owner {
                return Err(s3_error!(AccessDenied));
            }
        }
        Ok(info)
    }
}
