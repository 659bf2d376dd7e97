//! Bucket creation coordinator.

use bytes::Bytes;
use http::HeaderMap;
use silo_s3_model::error::S3Error;
use silo_s3_model::s3_error;
use silo_s3_model::types::{ContainerId, CreateBucketConfiguration, PlacementPolicy};
use tracing::info;

use crate::acl::resolve_basic_acl;
use crate::auth::ReqInfo;
use crate::gateway::Gateway;
use crate::headers::{AMZ_BUCKET_OBJECT_LOCK_ENABLED, header_str};
use crate::layer::CreateBucketParams;
use crate::notifications::{EventName, NotificationInfo, SendNotificationParams};

/// Result of a CREATE bucket operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBucketOutput {
    /// Id of the container backing the new bucket.
    pub container_id: ContainerId,
}

impl Gateway {
    /// Create a bucket.
    ///
    /// The placement policy is resolved in order: the access box entry
    /// matching the requested location constraint, then the deployment
    /// default.
    ///
    /// # Errors
    ///
    /// `BadRequest` for an unparsable ACL, `MalformedXML` for a bad body,
    /// `InternalError` when no access box is installed, plus classified
    /// layer errors.
    pub async fn handle_create_bucket(
        &self,
        req_info: &ReqInfo,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<CreateBucketOutput, S3Error> {
        let acl = resolve_basic_acl(headers)?;

        let create_params = parse_location_constraint(&body)?;

        let box_data = req_info.box_data()?;

        let mut policy = None;
        if !create_params.location_constraint.is_empty() {
            policy = box_data
                .placement_policy(&create_params.location_constraint)
                .cloned();
        }
        let policy = match policy {
            Some(policy) => policy,
            None => self
                .config
                .default_placement_policy
                .parse::<PlacementPolicy>()
                .map_err(|err| S3Error::internal(err.to_string()))?,
        };

        let object_lock_enabled = header_str(headers, AMZ_BUCKET_OBJECT_LOCK_ENABLED)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let params = CreateBucketParams {
            name: req_info.bucket_name.clone(),
            acl,
            policy,
            location_constraint: create_params.location_constraint,
            object_lock_enabled,
        };

        let container_id = self
            .layer
            .create_bucket(params, &box_data)
            .await
            .map_err(S3Error::from)?;

        info!(container_id = %container_id, "bucket is created");

        self.notifier.send(SendNotificationParams {
            event: EventName::BucketCreated,
            info: NotificationInfo::default(),
            bucket_name: &req_info.bucket_name,
            req_info,
        });

        Ok(CreateBucketOutput { container_id })
    }
}

/// Parse the optional `CreateBucketConfiguration` body; an empty body is
/// valid and yields defaults.
fn parse_location_constraint(body: &Bytes) -> Result<CreateBucketConfiguration, S3Error> {
    if body.is_empty() {
        return Ok(CreateBucketConfiguration::default());
    }
    silo_s3_xml::from_xml(body).map_err(|err| s3_error!(MalformedXML).with_source(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::notifications::Notifier;
    use crate::ops::testing::MockLayer;
    use silo_s3_model::error::S3ErrorCode;
    use silo_s3_model::types::{AccessBox, ContainerPolicy, GateData};
    use std::sync::Arc;

    fn frame_with_policies(bucket: &str, policies: Vec<ContainerPolicy>) -> ReqInfo {
        ReqInfo {
            request_id: "req-test".to_owned(),
            bucket_name: bucket.to_owned(),
            object_name: String::new(),
            access_box: Some(Arc::new(AccessBox {
                gate: GateData::default(),
                policies,
            })),
        }
    }

    fn gateway(layer: Arc<MockLayer>) -> Gateway {
        Gateway::new(layer, Notifier::default(), GatewayConfig::default())
    }

    fn location_body(constraint: &str) -> Bytes {
        Bytes::from(format!(
            "<CreateBucketConfiguration xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
             <LocationConstraint>{constraint}</LocationConstraint>\
             </CreateBucketConfiguration>"
        ))
    }

    #[tokio::test]
    async fn test_should_adopt_policy_matching_location_constraint() {
        let layer = Arc::new(MockLayer::default());
        let gw = gateway(Arc::clone(&layer));

        let eu_policy: PlacementPolicy = "REP 2".parse().expect("valid policy");
        let frame = frame_with_policies(
            "new-bucket",
            vec![ContainerPolicy {
                location_constraint: "eu".to_owned(),
                policy: eu_policy.clone(),
            }],
        );

        let output = gw
            .handle_create_bucket(&frame, &HeaderMap::new(), location_body("eu"))
            .await
            .expect("create succeeds");
        assert_eq!(output.container_id.0, "cid-new-bucket");

        let (params, _) = layer.last_create.lock().expect("create lock").take().expect("recorded");
        assert_eq!(params.policy, eu_policy);
        assert_eq!(params.location_constraint, "eu");
        assert_eq!(params.acl, crate::acl::OPEN_BASIC_RULE);
    }

    #[tokio::test]
    async fn test_should_fall_back_to_default_policy() {
        let layer = Arc::new(MockLayer::default());
        let gw = gateway(Arc::clone(&layer));

        let frame = frame_with_policies("new-bucket", Vec::new());
        gw.handle_create_bucket(&frame, &HeaderMap::new(), Bytes::new())
            .await
            .expect("create succeeds");

        let (params, _) = layer.last_create.lock().expect("create lock").take().expect("recorded");
        assert_eq!(
            params.policy,
            "REP 3".parse::<PlacementPolicy>().expect("valid policy")
        );
        assert!(params.location_constraint.is_empty());
    }

    #[tokio::test]
    async fn test_should_fall_through_on_unmatched_constraint() {
        let layer = Arc::new(MockLayer::default());
        let gw = gateway(Arc::clone(&layer));

        let frame = frame_with_policies(
            "new-bucket",
            vec![ContainerPolicy {
                location_constraint: "eu".to_owned(),
                policy: "REP 2".parse().expect("valid policy"),
            }],
        );

        gw.handle_create_bucket(&frame, &HeaderMap::new(), location_body("us"))
            .await
            .expect("create succeeds");

        let (params, _) = layer.last_create.lock().expect("create lock").take().expect("recorded");
        assert_eq!(
            params.policy,
            "REP 3".parse::<PlacementPolicy>().expect("valid policy")
        );
    }

    #[tokio::test]
    async fn test_should_parse_acl_header() {
        let layer = Arc::new(MockLayer::default());
        let gw = gateway(Arc::clone(&layer));

        let mut headers = HeaderMap::new();
        headers.insert("x-amz-acl", "private".parse().expect("value"));

        let frame = frame_with_policies("new-bucket", Vec::new());
        gw.handle_create_bucket(&frame, &headers, Bytes::new())
            .await
            .expect("create succeeds");

        let (params, _) = layer.last_create.lock().expect("create lock").take().expect("recorded");
        assert_eq!(params.acl, crate::acl::PRIVATE_BASIC_RULE);
    }

    #[tokio::test]
    async fn test_should_reject_malformed_body() {
        let layer = Arc::new(MockLayer::default());
        let gw = gateway(Arc::clone(&layer));

        let frame = frame_with_policies("new-bucket", Vec::new());
        let err = gw
            .handle_create_bucket(&frame, &HeaderMap::new(), Bytes::from_static(b"<not-xml"))
            .await
            .expect_err("malformed body");
        assert_eq!(err.code, S3ErrorCode::MalformedXML);
    }

    #[tokio::test]
    async fn test_should_require_access_box() {
        let layer = Arc::new(MockLayer::default());
        let gw = gateway(Arc::clone(&layer));

        let frame = ReqInfo {
            bucket_name: "new-bucket".to_owned(),
            ..ReqInfo::default()
        };
        let err = gw
            .handle_create_bucket(&frame, &HeaderMap::new(), Bytes::new())
            .await
            .expect_err("no box");
        assert_eq!(err.code, S3ErrorCode::InternalError);
        assert!(err.message.contains("couldn't get box data"));
    }

    #[tokio::test]
    async fn test_should_pass_object_lock_flag() {
        let layer = Arc::new(MockLayer::default());
        let gw = gateway(Arc::clone(&layer));

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-amz-bucket-object-lock-enabled",
            "true".parse().expect("value"),
        );

        let frame = frame_with_policies("new-bucket", Vec::new());
        gw.handle_create_bucket(&frame, &headers, Bytes::new())
            .await
            .expect("create succeeds");

        let (params, _) = layer.last_create.lock().expect("create lock").take().expect("recorded");
        assert!(params.object_lock_enabled);
    }
}
