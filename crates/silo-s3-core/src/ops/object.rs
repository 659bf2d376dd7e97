//! Object write and head coordinators: PUT, COPY, HEAD.

use http::HeaderMap;
use silo_s3_model::PayloadStream;
use silo_s3_model::error::S3Error;
use silo_s3_model::types::{CopyObjectResult, ObjectInfo, ObjectVersion};
use tracing::{error, info};

use crate::acl::{build_eacl_table, contains_acl_headers};
use crate::auth::ReqInfo;
use crate::encryption::{EncryptionInfo, form_encryption_params};
use crate::gateway::Gateway;
use crate::headers::{
    AMZ_EXPECTED_BUCKET_OWNER, AMZ_SOURCE_EXPECTED_BUCKET_OWNER, CONTENT_TYPE_ATTR,
    ConditionalArgs, Directive, check_preconditions, check_read_preconditions,
    get_copies_number_or_default, header_str, parse_copy_source, parse_metadata,
    parse_metadata_directive, parse_tagging_directive, parse_tagging_header,
};
use crate::layer::{CopyObjectParams, HeadObjectParams, PutBucketAclParams, PutObjectParams};
use crate::lock::form_object_lock;
use crate::notifications::{EventName, NotificationInfo, SendNotificationParams};

/// Result of a PUT object operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectOutput {
    /// Hash of the stored object, reported as `ETag`.
    pub e_tag: String,
}

/// Result of a HEAD object operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadObjectOutput {
    /// The resolved descriptor; the transport renders it as headers.
    pub info: ObjectInfo,
}

/// SSE-C headers echoed on responses for encrypted objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEcho {
    /// Customer algorithm.
    pub algorithm: String,
    /// Customer key MD5, base64.
    pub key_md5: String,
}

/// Result of a COPY object operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyObjectOutput {
    /// The XML body of the response.
    pub result: CopyObjectResult,
    /// Version of the destination object.
    pub version_id: String,
    /// SSE-C echo headers, when the copy is encrypted.
    pub sse_echo: Option<SseEcho>,
}

/// Directives and conditionals parsed from the COPY request headers.
#[derive(Debug, Default)]
struct CopyObjectArgs {
    conditional: ConditionalArgs,
    metadata_directive: Option<Directive>,
    tagging_directive: Option<Directive>,
}

fn parse_copy_object_args(headers: &HeaderMap) -> Result<CopyObjectArgs, S3Error> {
    Ok(CopyObjectArgs {
        conditional: ConditionalArgs::parse(headers)?,
        metadata_directive: parse_metadata_directive(headers)?,
        tagging_directive: parse_tagging_directive(headers)?,
    })
}

impl Gateway {
    /// Store an object, streaming the request body through to the layer.
    ///
    /// The payload is never buffered here; size is propagated verbatim
    /// from `Content-Length` (`-1` when unknown) and the layer detects
    /// short reads.
    ///
    /// # Errors
    ///
    /// Any layer failure is reported as `InternalError` carrying the
    /// backend message.
    pub async fn handle_put_object(
        &self,
        req_info: &ReqInfo,
        headers: &HeaderMap,
        payload: PayloadStream,
        content_length: i64,
    ) -> Result<PutObjectOutput, S3Error> {
        let metadata = parse_metadata(headers);

        let params = PutObjectParams {
            bucket: req_info.bucket_name.clone(),
            object: req_info.object_name.clone(),
            payload,
            size: content_length,
            header: metadata,
        };

        let stored = match self.layer.put_object(params).await {
            Ok(info) => info,
            Err(err) => {
                error!(
                    request_id = %req_info.request_id,
                    bucket_name = %req_info.bucket_name,
                    object_name = %req_info.object_name,
                    error = %err,
                    "could not upload object"
                );
                return Err(S3Error::internal(err.to_string()));
            }
        };

        self.notifier.send(SendNotificationParams {
            event: EventName::ObjectCreatedPut,
            info: NotificationInfo::from_object(&stored),
            bucket_name: &req_info.bucket_name,
            req_info,
        });

        Ok(PutObjectOutput {
            e_tag: stored.hash_sum,
        })
    }

    /// Head an object, honoring the read-conditional headers.
    ///
    /// # Errors
    ///
    /// Returns the classified layer error, `PreconditionFailed`, or
    /// `NotModified`.
    pub async fn handle_head_object(
        &self,
        req_info: &ReqInfo,
        headers: &HeaderMap,
        version_id: &str,
    ) -> Result<HeadObjectOutput, S3Error> {
        let bucket = self
            .get_bucket_and_check_owner(headers, &req_info.bucket_name, AMZ_EXPECTED_BUCKET_OWNER)
            .await?;

        let info = self
            .layer
            .get_object_info(HeadObjectParams {
                bucket,
                object: req_info.object_name.clone(),
                version_id: version_id.to_owned(),
            })
            .await
            .map_err(S3Error::from)?;

        check_read_preconditions(&info, headers)?;

        Ok(HeadObjectOutput { info })
    }

    /// Copy an object, the most intricate pipeline of the gateway.
    ///
    /// Post-copy steps (ACL, tagging, notification) observe the
    /// descriptor returned by the copy call and are not rolled back when
    /// a later step fails; the client sees the later error.
    ///
    /// # Errors
    ///
    /// Per-step taxonomy errors as described in the operation contract.
    #[allow(clippy::too_many_lines)]
    pub async fn handle_copy_object(
        &self,
        req_info: &ReqInfo,
        headers: &HeaderMap,
    ) -> Result<CopyObjectOutput, S3Error> {
        let contains_acl = contains_acl_headers(headers);

        let (src_bucket_name, src_object, version_id) = parse_copy_source(headers)?;

        let src_bucket = self
            .get_bucket_and_check_owner(
                headers,
                &src_bucket_name,
                AMZ_SOURCE_EXPECTED_BUCKET_OWNER,
            )
            .await?;
        let dst_bucket = self
            .get_bucket_and_check_owner(headers, &req_info.bucket_name, AMZ_EXPECTED_BUCKET_OWNER)
            .await?;

        let session_token = if contains_acl {
            Some(req_info.eacl_session_token()?)
        } else {
            None
        };

        let args = parse_copy_object_args(headers)?;

        let src_info = self
            .layer
            .get_object_info(HeadObjectParams {
                bucket: src_bucket.clone(),
                object: src_object.clone(),
                version_id: version_id.clone(),
            })
            .await
            .map_err(S3Error::from)?;

        let replaced_metadata = match args.metadata_directive {
            Some(Directive::Replace) => Some(parse_metadata(headers)),
            _ => None,
        };

        let tag_set = match args.tagging_directive {
            Some(Directive::Replace) => parse_tagging_header(headers)?,
            _ => {
                let version = ObjectVersion {
                    bucket: src_bucket.clone(),
                    object: src_object.clone(),
                    version_id: src_info.version().to_owned(),
                };
                let (_, tags) = self
                    .layer
                    .get_object_tagging(&version)
                    .await
                    .map_err(S3Error::from)?;
                Some(tags)
            }
        };

        let encryption = form_encryption_params(headers)?;
        encryption
            .matches_object_encryption(&EncryptionInfo::from_object_headers(&src_info.headers))?;

        check_preconditions(&src_info, &args.conditional)?;

        let metadata = match replaced_metadata {
            Some(mut metadata) => {
                if let Some(content_type) = header_str(headers, http::header::CONTENT_TYPE.as_str())
                {
                    if !content_type.is_empty() {
                        metadata.insert(CONTENT_TYPE_ATTR.to_owned(), content_type.to_owned());
                    }
                }
                metadata
            }
            None => {
                let mut metadata = src_info.headers.clone();
                if !src_info.content_type.is_empty() {
                    metadata.insert(CONTENT_TYPE_ATTR.to_owned(), src_info.content_type.clone());
                }
                metadata
            }
        };

        let copies_number = get_copies_number_or_default(&metadata, &self.config.copies_number)?;

        let settings = self
            .layer
            .get_bucket_settings(&dst_bucket)
            .await
            .map_err(S3Error::from)?;
        let lock = form_object_lock(settings.lock_configuration.as_ref(), headers)?;

        let params = CopyObjectParams {
            src_size: src_info.size,
            src_object: src_info,
            src_bucket,
            dst_bucket: dst_bucket.clone(),
            dst_object: req_info.object_name.clone(),
            header: metadata,
            encryption: encryption.clone(),
            copies_number,
            lock,
        };

        let dst_info = match self.layer.copy_object(params).await {
            Ok(info) => info,
            Err(err) => {
                error!(
                    request_id = %req_info.request_id,
                    bucket_name = %req_info.bucket_name,
                    object_name = %req_info.object_name,
                    src_bucket_name = %src_bucket_name,
                    src_object_name = %src_object,
                    error = %err,
                    "couldn't copy object"
                );
                return Err(err.into());
            }
        };

        let result = CopyObjectResult {
            last_modified: dst_info.created,
            e_tag: dst_info.hash_sum.clone(),
        };

        if contains_acl {
            let eacl = build_eacl_table(headers, &dst_info)?;
            self.layer
                .put_bucket_acl(PutBucketAclParams {
                    bucket: dst_bucket.clone(),
                    eacl,
                    session_token,
                })
                .await
                .map_err(S3Error::from)?;
        }

        if let Some(tags) = tag_set {
            let version = ObjectVersion {
                bucket: dst_bucket.clone(),
                object: req_info.object_name.clone(),
                version_id: dst_info.version().to_owned(),
            };
            self.layer
                .put_object_tagging(&version, tags)
                .await
                .map_err(S3Error::from)?;
        }

        info!(
            bucket_name = %dst_info.bucket,
            object_name = %dst_info.name,
            object_id = %dst_info.id,
            "object is copied"
        );

        self.notifier.send(SendNotificationParams {
            event: EventName::ObjectCreatedCopy,
            info: NotificationInfo::from_object(&dst_info),
            bucket_name: &dst_bucket.name,
            req_info,
        });

        let sse_echo = if encryption.enabled() {
            Some(SseEcho {
                algorithm: encryption.algorithm().to_owned(),
                key_md5: encryption.key_md5().to_owned(),
            })
        } else {
            None
        };

        Ok(CopyObjectOutput {
            result,
            version_id: dst_info.version().to_owned(),
            sse_echo,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::notifications::Notifier;
    use crate::ops::testing::{MockLayer, sample_object};
    use bytes::Bytes;
    use http::HeaderValue;
    use silo_s3_model::error::S3ErrorCode;
    use silo_s3_model::types::{AccessBox, GateData, SessionToken};
    use std::sync::Arc;

    fn gateway(layer: Arc<MockLayer>) -> Gateway {
        Gateway::new(layer, Notifier::default(), GatewayConfig::default())
    }

    fn frame(bucket: &str, object: &str) -> ReqInfo {
        ReqInfo {
            request_id: "req-test".to_owned(),
            bucket_name: bucket.to_owned(),
            object_name: object.to_owned(),
            access_box: None,
        }
    }

    fn frame_with_token(bucket: &str, object: &str) -> ReqInfo {
        ReqInfo {
            access_box: Some(Arc::new(AccessBox {
                gate: GateData {
                    eacl_session_token: Some(SessionToken("tok-eacl".to_owned())),
                },
                policies: Vec::new(),
            })),
            ..frame(bucket, object)
        }
    }

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                http::header::HeaderName::from_bytes(name.as_bytes()).expect("valid name"),
                HeaderValue::from_str(value).expect("valid value"),
            );
        }
        map
    }

    #[tokio::test]
    async fn test_should_put_object_and_report_etag() {
        let layer = Arc::new(MockLayer::default());
        let gw = gateway(Arc::clone(&layer));

        let headers = headers(&[("x-amz-meta-foo", "bar")]);
        let payload = PayloadStream::from_bytes(Bytes::from_static(b"hello"));
        let output = gw
            .handle_put_object(&frame("b", "o"), &headers, payload, 5)
            .await
            .expect("put succeeds");

        assert_eq!(output.e_tag, "d41d8cd98f");

        let (bucket, object, size, metadata, payload) =
            layer.last_put.lock().expect("put lock").clone().expect("recorded");
        assert_eq!(bucket, "b");
        assert_eq!(object, "o");
        assert_eq!(size, 5);
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata["Foo"], "bar");
        assert_eq!(payload, b"hello");
    }

    #[tokio::test]
    async fn test_should_wrap_put_failure_as_internal_error() {
        let layer = Arc::new(MockLayer::default());
        *layer.fail_put.lock().expect("flag lock") = true;
        let gw = gateway(Arc::clone(&layer));

        let err = gw
            .handle_put_object(
                &frame("b", "o"),
                &HeaderMap::new(),
                PayloadStream::empty(),
                -1,
            )
            .await
            .expect_err("put fails");

        assert_eq!(err.code, S3ErrorCode::InternalError);
        assert!(err.message.contains("node unavailable"));
    }

    #[tokio::test]
    async fn test_should_head_object() {
        let layer = Arc::new(
            MockLayer::default()
                .with_bucket("b", "owner-1")
                .with_object("b", "o", sample_object("b", "o", "abc")),
        );
        let gw = gateway(Arc::clone(&layer));

        let output = gw
            .handle_head_object(&frame("b", "o"), &HeaderMap::new(), "")
            .await
            .expect("head succeeds");
        assert_eq!(output.info.hash_sum, "abc");
        assert_eq!(output.info.content_type, "text/plain");
    }

    #[tokio::test]
    async fn test_should_reject_head_for_wrong_expected_owner() {
        let layer = Arc::new(
            MockLayer::default()
                .with_bucket("b", "owner-1")
                .with_object("b", "o", sample_object("b", "o", "abc")),
        );
        let gw = gateway(Arc::clone(&layer));

        let headers = headers(&[("x-amz-expected-bucket-owner", "owner-2")]);
        let err = gw
            .handle_head_object(&frame("b", "o"), &headers, "")
            .await
            .expect_err("owner mismatch");
        assert_eq!(err.code, S3ErrorCode::AccessDenied);
    }

    #[tokio::test]
    async fn test_should_return_not_modified_on_matching_if_none_match() {
        let layer = Arc::new(
            MockLayer::default()
                .with_bucket("b", "owner-1")
                .with_object("b", "o", sample_object("b", "o", "abc")),
        );
        let gw = gateway(Arc::clone(&layer));

        let headers = headers(&[("if-none-match", "abc")]);
        let err = gw
            .handle_head_object(&frame("b", "o"), &headers, "")
            .await
            .expect_err("not modified");
        assert_eq!(err.code, S3ErrorCode::NotModified);
    }

    #[tokio::test]
    async fn test_should_copy_object_inheriting_metadata_and_tags() {
        let mut src = sample_object("src", "key", "abc");
        src.headers.insert("Color".to_owned(), "blue".to_owned());

        let layer = Arc::new(
            MockLayer::default()
                .with_bucket("src", "owner-1")
                .with_bucket("dst", "owner-1")
                .with_object("src", "key", src),
        );
        layer.tags.lock().expect("tags lock").insert(
            ("src".to_owned(), "key".to_owned()),
            [("env".to_owned(), "prod".to_owned())].into_iter().collect(),
        );
        let gw = gateway(Arc::clone(&layer));

        let headers = headers(&[("x-amz-copy-source", "/src/key")]);
        let output = gw
            .handle_copy_object(&frame("dst", "new-key"), &headers)
            .await
            .expect("copy succeeds");

        assert_eq!(output.result.e_tag, "abc");
        assert!(output.sse_echo.is_none());

        let params = layer.last_copy.lock().expect("copy lock").take().expect("recorded");
        assert_eq!(params.dst_object, "new-key");
        assert_eq!(params.header["Color"], "blue");
        assert_eq!(params.header["Content-Type"], "text/plain");

        let (version, tags) = layer
            .last_tagging
            .lock()
            .expect("tagging lock")
            .take()
            .expect("tags copied");
        assert_eq!(version.bucket.name, "dst");
        assert_eq!(version.object, "new-key");
        assert_eq!(tags["env"], "prod");
    }

    #[tokio::test]
    async fn test_should_replace_metadata_on_replace_directive() {
        let layer = Arc::new(
            MockLayer::default()
                .with_bucket("src", "owner-1")
                .with_bucket("dst", "owner-1")
                .with_object("src", "key", sample_object("src", "key", "abc")),
        );
        let gw = gateway(Arc::clone(&layer));

        let headers = headers(&[
            ("x-amz-copy-source", "/src/key"),
            ("x-amz-metadata-directive", "REPLACE"),
            ("x-amz-meta-x", "Y"),
            ("content-type", "application/json"),
        ]);
        gw.handle_copy_object(&frame("dst", "new-key"), &headers)
            .await
            .expect("copy succeeds");

        let params = layer.last_copy.lock().expect("copy lock").take().expect("recorded");
        assert_eq!(params.header.len(), 2);
        assert_eq!(params.header["X"], "Y");
        assert_eq!(params.header["Content-Type"], "application/json");
    }

    #[tokio::test]
    async fn test_should_fail_precondition_without_copy_call() {
        let layer = Arc::new(
            MockLayer::default()
                .with_bucket("src", "owner-1")
                .with_bucket("dst", "owner-1")
                .with_object("src", "key", sample_object("src", "key", "abc")),
        );
        let gw = gateway(Arc::clone(&layer));

        let headers = headers(&[
            ("x-amz-copy-source", "/src/key"),
            ("x-amz-copy-source-if-none-match", "abc"),
        ]);
        let err = gw
            .handle_copy_object(&frame("dst", "new-key"), &headers)
            .await
            .expect_err("precondition fails");

        assert_eq!(err.code, S3ErrorCode::PreconditionFailed);
        assert!(!layer.calls().contains(&"copy_object"));
    }

    #[tokio::test]
    async fn test_should_reject_invalid_directive_before_head() {
        let layer = Arc::new(
            MockLayer::default()
                .with_bucket("src", "owner-1")
                .with_bucket("dst", "owner-1")
                .with_object("src", "key", sample_object("src", "key", "abc")),
        );
        let gw = gateway(Arc::clone(&layer));

        let headers = headers(&[
            ("x-amz-copy-source", "/src/key"),
            ("x-amz-metadata-directive", "MERGE"),
        ]);
        let err = gw
            .handle_copy_object(&frame("dst", "new-key"), &headers)
            .await
            .expect_err("invalid directive");

        assert_eq!(err.code, S3ErrorCode::InvalidMetadataDirective);
        let calls = layer.calls();
        assert!(!calls.contains(&"get_object_info"));
        assert!(!calls.contains(&"copy_object"));
    }

    #[tokio::test]
    async fn test_should_require_session_token_for_acl_headers() {
        let layer = Arc::new(
            MockLayer::default()
                .with_bucket("src", "owner-1")
                .with_bucket("dst", "owner-1")
                .with_object("src", "key", sample_object("src", "key", "abc")),
        );
        let gw = gateway(Arc::clone(&layer));

        let headers = headers(&[
            ("x-amz-copy-source", "/src/key"),
            ("x-amz-acl", "public-read"),
        ]);
        let err = gw
            .handle_copy_object(&frame("dst", "new-key"), &headers)
            .await
            .expect_err("no box installed");
        assert_eq!(err.code, S3ErrorCode::InternalError);
    }

    #[tokio::test]
    async fn test_should_rebuild_eacl_after_copy() {
        let layer = Arc::new(
            MockLayer::default()
                .with_bucket("src", "owner-1")
                .with_bucket("dst", "owner-1")
                .with_object("src", "key", sample_object("src", "key", "abc")),
        );
        let gw = gateway(Arc::clone(&layer));

        let headers = headers(&[
            ("x-amz-copy-source", "/src/key"),
            ("x-amz-acl", "public-read"),
        ]);
        gw.handle_copy_object(&frame_with_token("dst", "new-key"), &headers)
            .await
            .expect("copy succeeds");

        let params = layer.last_acl.lock().expect("acl lock").take().expect("acl installed");
        assert_eq!(params.bucket.name, "dst");
        assert!(!params.eacl.records.is_empty());
        assert_eq!(
            params.session_token,
            Some(SessionToken("tok-eacl".to_owned()))
        );
    }

    #[tokio::test]
    async fn test_should_read_copies_number_from_metadata() {
        let layer = Arc::new(
            MockLayer::default()
                .with_bucket("src", "owner-1")
                .with_bucket("dst", "owner-1")
                .with_object("src", "key", sample_object("src", "key", "abc")),
        );
        let gw = gateway(Arc::clone(&layer));

        let headers = headers(&[
            ("x-amz-copy-source", "/src/key"),
            ("x-amz-metadata-directive", "REPLACE"),
            ("x-amz-meta-silo-copies-number", "2,1"),
        ]);
        gw.handle_copy_object(&frame("dst", "new-key"), &headers)
            .await
            .expect("copy succeeds");

        let params = layer.last_copy.lock().expect("copy lock").take().expect("recorded");
        assert_eq!(params.copies_number, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_should_reject_copy_source_for_missing_bucket() {
        let layer = Arc::new(MockLayer::default().with_bucket("dst", "owner-1"));
        let gw = gateway(Arc::clone(&layer));

        let headers = headers(&[("x-amz-copy-source", "/missing/key")]);
        let err = gw
            .handle_copy_object(&frame("dst", "new-key"), &headers)
            .await
            .expect_err("source bucket missing");
        assert_eq!(err.code, S3ErrorCode::NoSuchBucket);
    }
}
