//! Event notification dispatch.
//!
//! Coordinators announce completed writes as S3-style events. Delivery is
//! asynchronous and best-effort: publish failures are logged at error
//! level and never reach the client.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use silo_s3_model::types::ObjectInfo;
use tracing::error;

use crate::auth::ReqInfo;

/// Event types emitted by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventName {
    /// A bucket was created.
    BucketCreated,
    /// An object was stored via PUT.
    ObjectCreatedPut,
    /// An object was stored via COPY.
    ObjectCreatedCopy,
    /// An object's tag set was replaced.
    ObjectCreatedPutTagging,
}

impl EventName {
    /// Wire representation, matching the AWS event naming scheme.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BucketCreated => "s3:BucketCreated:*",
            Self::ObjectCreatedPut => "s3:ObjectCreated:Put",
            Self::ObjectCreatedCopy => "s3:ObjectCreated:Copy",
            Self::ObjectCreatedPutTagging => "s3:ObjectCreated:PutTagging",
        }
    }
}

/// Object fields carried inside an event.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct NotificationInfo {
    /// Object name; empty for bucket-level events.
    pub name: String,
    /// Addressed version.
    pub version: String,
    /// Payload size.
    pub size: i64,
    /// Payload hash.
    pub hash_sum: String,
}

impl NotificationInfo {
    /// Build the object fields from a resolved descriptor.
    #[must_use]
    pub fn from_object(info: &ObjectInfo) -> Self {
        Self {
            name: info.name.clone(),
            version: info.version().to_owned(),
            size: info.size,
            hash_sum: info.hash_sum.clone(),
        }
    }
}

/// A fully-formed event handed to notification targets.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Event {
    /// Event type string.
    pub event_name: String,
    /// Bucket the event refers to.
    pub bucket_name: String,
    /// Object fields.
    pub object: NotificationInfo,
    /// Request id of the triggering request.
    pub request_id: String,
    /// When the event was formed.
    pub event_time: DateTime<Utc>,
}

/// Parameters assembled by a coordinator to announce an event.
#[derive(Debug)]
pub struct SendNotificationParams<'a> {
    /// Event type.
    pub event: EventName,
    /// Object fields.
    pub info: NotificationInfo,
    /// Name of the bucket the event refers to.
    pub bucket_name: &'a str,
    /// Request frame of the triggering request.
    pub req_info: &'a ReqInfo,
}

/// A destination events are published to.
#[async_trait::async_trait]
pub trait NotificationTarget: Send + Sync + 'static {
    /// Publish one event.
    async fn publish(&self, event: &Event) -> anyhow::Result<()>;
}

/// Fans events out to the configured targets.
#[derive(Clone, Default)]
pub struct Notifier {
    targets: Vec<Arc<dyn NotificationTarget>>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("targets", &self.targets.len())
            .finish()
    }
}

impl Notifier {
    /// Create a dispatcher over the given targets.
    #[must_use]
    pub fn new(targets: Vec<Arc<dyn NotificationTarget>>) -> Self {
        Self { targets }
    }

    /// Announce an event.
    ///
    /// Publishing runs on detached tasks; failures are logged with the
    /// request id and otherwise dropped.
    pub fn send(&self, params: SendNotificationParams<'_>) {
        if self.targets.is_empty() {
            return;
        }

        let event = Event {
            event_name: params.event.as_str().to_owned(),
            bucket_name: params.bucket_name.to_owned(),
            object: params.info,
            request_id: params.req_info.request_id.clone(),
            event_time: Utc::now(),
        };

        for target in &self.targets {
            let target = Arc::clone(target);
            let event = event.clone();
            tokio::spawn(async move {
                if let Err(err) = target.publish(&event).await {
                    error!(
                        request_id = %event.request_id,
                        bucket_name = %event.bucket_name,
                        event = %event.event_name,
                        error = %err,
                        "couldn't send notification"
                    );
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    struct ChannelTarget {
        sender: mpsc::UnboundedSender<Event>,
    }

    #[async_trait::async_trait]
    impl NotificationTarget for ChannelTarget {
        async fn publish(&self, event: &Event) -> anyhow::Result<()> {
            self.sender.send(event.clone())?;
            Ok(())
        }
    }

    struct FailingTarget;

    #[async_trait::async_trait]
    impl NotificationTarget for FailingTarget {
        async fn publish(&self, _event: &Event) -> anyhow::Result<()> {
            anyhow::bail!("broker unavailable")
        }
    }

    fn object() -> ObjectInfo {
        ObjectInfo {
            bucket: "b".to_owned(),
            name: "o".to_owned(),
            id: "id-1".to_owned(),
            size: 5,
            created: Utc::now(),
            content_type: String::new(),
            headers: HashMap::new(),
            hash_sum: "abc".to_owned(),
            version_id: String::new(),
        }
    }

    #[tokio::test]
    async fn test_should_deliver_event_to_target() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let notifier = Notifier::new(vec![Arc::new(ChannelTarget { sender })]);

        let req_info = ReqInfo {
            request_id: "req-1".to_owned(),
            ..ReqInfo::default()
        };
        notifier.send(SendNotificationParams {
            event: EventName::ObjectCreatedCopy,
            info: NotificationInfo::from_object(&object()),
            bucket_name: "b",
            req_info: &req_info,
        });

        let event = receiver.recv().await.expect("event delivered");
        assert_eq!(event.event_name, "s3:ObjectCreated:Copy");
        assert_eq!(event.bucket_name, "b");
        assert_eq!(event.object.name, "o");
        assert_eq!(event.object.version, "id-1");
        assert_eq!(event.request_id, "req-1");
    }

    #[tokio::test]
    async fn test_should_swallow_publish_failures() {
        let notifier = Notifier::new(vec![Arc::new(FailingTarget)]);

        let req_info = ReqInfo::default();
        notifier.send(SendNotificationParams {
            event: EventName::ObjectCreatedPut,
            info: NotificationInfo::default(),
            bucket_name: "b",
            req_info: &req_info,
        });

        // The detached task logs the failure; nothing to observe here
        // beyond the absence of a panic.
        tokio::task::yield_now().await;
    }

    #[test]
    fn test_should_serialize_event_to_json() {
        let event = Event {
            event_name: EventName::ObjectCreatedPut.as_str().to_owned(),
            bucket_name: "b".to_owned(),
            object: NotificationInfo::from_object(&object()),
            request_id: "req-2".to_owned(),
            event_time: Utc::now(),
        };

        let json = serde_json::to_value(&event).expect("serializable");
        assert_eq!(json["event_name"], "s3:ObjectCreated:Put");
        assert_eq!(json["object"]["hash_sum"], "abc");
    }
}
