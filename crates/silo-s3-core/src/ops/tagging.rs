//! Object tagging subresource coordinators.

use bytes::Bytes;
use http::HeaderMap;
use silo_s3_model::error::S3Error;
use silo_s3_model::s3_error;
use silo_s3_model::types::{ObjectVersion, Tagging};

use crate::auth::ReqInfo;
use crate::gateway::Gateway;
use crate::headers::AMZ_EXPECTED_BUCKET_OWNER;
use crate::notifications::{EventName, NotificationInfo, SendNotificationParams};

/// Result of a GET object-tagging operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetObjectTaggingOutput {
    /// Version the tag set was read from.
    pub version_id: String,
    /// The tag set as a wire document.
    pub tagging: Tagging,
}

/// Result of a PUT object-tagging operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectTaggingOutput {
    /// Version the tag set was stored on.
    pub version_id: String,
}

impl Gateway {
    /// Read the tag set of an object version.
    ///
    /// # Errors
    ///
    /// Classified layer errors.
    pub async fn handle_get_object_tagging(
        &self,
        req_info: &ReqInfo,
        headers: &HeaderMap,
        version_id: &str,
    ) -> Result<GetObjectTaggingOutput, S3Error> {
        let bucket = self
            .get_bucket_and_check_owner(headers, &req_info.bucket_name, AMZ_EXPECTED_BUCKET_OWNER)
            .await?;

        let version = ObjectVersion {
            bucket,
            object: req_info.object_name.clone(),
            version_id: version_id.to_owned(),
        };

        let (resolved_version, tags) = self
            .layer
            .get_object_tagging(&version)
            .await
            .map_err(S3Error::from)?;

        Ok(GetObjectTaggingOutput {
            version_id: resolved_version,
            tagging: Tagging::from_tag_set(&tags),
        })
    }

    /// Replace the tag set of an object version from a `Tagging` body.
    ///
    /// # Errors
    ///
    /// `MalformedXML` for an unparsable body, plus classified layer
    /// errors.
    pub async fn handle_put_object_tagging(
        &self,
        req_info: &ReqInfo,
        headers: &HeaderMap,
        version_id: &str,
        body: Bytes,
    ) -> Result<PutObjectTaggingOutput, S3Error> {
        let tagging: Tagging = silo_s3_xml::from_xml(&body)
            .map_err(|err| s3_error!(MalformedXML).with_source(err))?;

        let bucket = self
            .get_bucket_and_check_owner(headers, &req_info.bucket_name, AMZ_EXPECTED_BUCKET_OWNER)
            .await?;

        let version = ObjectVersion {
            bucket,
            object: req_info.object_name.clone(),
            version_id: version_id.to_owned(),
        };

        let resolved_version = self
            .layer
            .put_object_tagging(&version, tagging.into_tag_set())
            .await
            .map_err(S3Error::from)?;

        self.notifier.send(SendNotificationParams {
            event: EventName::ObjectCreatedPutTagging,
            info: NotificationInfo {
                name: req_info.object_name.clone(),
                version: resolved_version.clone(),
                ..NotificationInfo::default()
            },
            bucket_name: &req_info.bucket_name,
            req_info,
        });

        Ok(PutObjectTaggingOutput {
            version_id: resolved_version,
        })
    }
}
