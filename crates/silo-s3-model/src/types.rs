//! Core data model shared by the gateway crates.
//!
//! Entities fall into three groups: the per-request credential envelope
//! ([`AccessBox`] and friends), resolved backend handles ([`BucketInfo`],
//! [`ObjectInfo`], [`ObjectVersion`]), and the S3 XML documents the wire
//! codec reads and writes ([`CreateBucketConfiguration`],
//! [`CopyObjectResult`], [`Tagging`], [`ErrorResponse`]).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag set attached to an object version.
pub type TagSet = HashMap<String, String>;

/// Identifier of a backend container (the backend analog of a bucket).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(pub String);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error returned when a placement policy string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("can't parse placement policy: {0}")]
pub struct PolicyParseError(pub String);

/// Declarative placement expression for new containers, e.g. `REP 3`.
///
/// A policy is one or more `REP <n>` clauses; each clause demands `n`
/// replicas of every stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementPolicy {
    /// Replica count per `REP` clause, in declaration order.
    pub replicas: Vec<u32>,
}

impl PlacementPolicy {
    /// Total number of object copies the policy demands.
    #[must_use]
    pub fn copies(&self) -> u32 {
        self.replicas.iter().sum()
    }
}

impl FromStr for PlacementPolicy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut replicas = Vec::new();
        let mut tokens = s.split_whitespace();
        while let Some(token) = tokens.next() {
            if !token.eq_ignore_ascii_case("REP") {
                return Err(PolicyParseError(s.to_owned()));
            }
            let count = tokens
                .next()
                .and_then(|n| n.parse::<u32>().ok())
                .filter(|n| *n > 0)
                .ok_or_else(|| PolicyParseError(s.to_owned()))?;
            replicas.push(count);
        }
        if replicas.is_empty() {
            return Err(PolicyParseError(s.to_owned()));
        }
        Ok(Self { replicas })
    }
}

impl fmt::Display for PlacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clauses: Vec<String> = self.replicas.iter().map(|n| format!("REP {n}")).collect();
        f.write_str(&clauses.join(" "))
    }
}

/// A named placement policy carried inside an access box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPolicy {
    /// The S3 `LocationConstraint` this policy is published under.
    pub location_constraint: String,
    /// The placement policy to apply when the constraint matches.
    pub policy: PlacementPolicy,
}

/// Short-lived authorization token allowing the gateway to act on the
/// user's behalf (e.g. rewrite a container's extended ACL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken(pub String);

/// Gate credentials carried inside an access box.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateData {
    /// Session token permitting extended-ACL modification, if issued.
    pub eacl_session_token: Option<SessionToken>,
}

/// Per-request credential envelope produced by the credential center.
///
/// Attached to the request frame during authentication and read-only for
/// the rest of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessBox {
    /// Gate credentials; an empty value is synthesized when the credential
    /// center returned none.
    pub gate: GateData,
    /// Named placement policies available to this caller.
    pub policies: Vec<ContainerPolicy>,
}

impl AccessBox {
    /// First policy published under the given location constraint, if any.
    #[must_use]
    pub fn placement_policy(&self, location_constraint: &str) -> Option<&PlacementPolicy> {
        self.policies
            .iter()
            .find(|p| p.location_constraint == location_constraint)
            .map(|p| &p.policy)
    }
}

/// Resolved bucket handle.
///
/// Obtained from the object layer with an ownership check; immutable for
/// the rest of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketInfo {
    /// S3 bucket name.
    pub name: String,
    /// Backing container id.
    pub container_id: ContainerId,
    /// Account id of the bucket owner.
    pub owner: String,
    /// Placement policy the container was created with.
    pub placement_policy: PlacementPolicy,
    /// Container creation time.
    pub created: DateTime<Utc>,
}

/// Bucket-level settings resolved from container metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketSettings {
    /// Whether object versioning is enabled.
    pub versioning_enabled: bool,
    /// Object-lock configuration, when the container was created with lock
    /// support.
    pub lock_configuration: Option<LockConfiguration>,
}

/// Object-lock configuration stored on a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockConfiguration {
    /// Whether object lock is enabled for the bucket.
    pub object_lock_enabled: bool,
    /// Default retention applied to new objects when no per-request lock
    /// headers are given.
    pub default_retention: Option<DefaultRetention>,
}

/// Default retention rule inside a lock configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultRetention {
    /// Retention mode.
    pub mode: LockMode,
    /// Retention period in days.
    pub days: Option<u64>,
    /// Retention period in years.
    pub years: Option<u64>,
}

/// Object-lock retention mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Retention cannot be shortened or removed by any account.
    Compliance,
    /// Retention can be overridden by accounts with bypass permission.
    Governance,
}

impl LockMode {
    /// Wire representation used in S3 headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliance => "COMPLIANCE",
            Self::Governance => "GOVERNANCE",
        }
    }
}

impl FromStr for LockMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COMPLIANCE" => Ok(Self::Compliance),
            "GOVERNANCE" => Ok(Self::Governance),
            _ => Err(()),
        }
    }
}

/// Retention applied to a single object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retention {
    /// Retention mode.
    pub mode: LockMode,
    /// Point in time until which the object is retained.
    pub until: DateTime<Utc>,
}

/// Lock state applied to an object on write, derived from the bucket's
/// lock configuration merged with per-request headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectLock {
    /// Retention period, if any.
    pub retention: Option<Retention>,
    /// Whether a legal hold is placed on the object.
    pub legal_hold: bool,
}

impl ObjectLock {
    /// Whether the lock carries any effect at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.retention.is_none() && !self.legal_hold
    }
}

/// Resolved object descriptor returned by head, put, and copy operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Owning bucket name.
    pub bucket: String,
    /// Object name (key).
    pub name: String,
    /// Backend object id.
    pub id: String,
    /// Payload size in bytes.
    pub size: i64,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Content type recorded on the object; empty when none was given.
    pub content_type: String,
    /// Full attribute map; aliases the metadata returned to S3 callers.
    pub headers: HashMap<String, String>,
    /// Payload hash, reported as the `ETag`.
    pub hash_sum: String,
    /// Version id; empty on unversioned buckets.
    pub version_id: String,
}

impl ObjectInfo {
    /// The version addressed by this descriptor: the explicit version id,
    /// or the object id when the bucket is unversioned.
    #[must_use]
    pub fn version(&self) -> &str {
        if self.version_id.is_empty() {
            &self.id
        } else {
            &self.version_id
        }
    }
}

/// Addressing tuple for tags, ACL, and deletes.
///
/// An empty `version_id` addresses the current version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVersion {
    /// Resolved bucket the object lives in.
    pub bucket: BucketInfo,
    /// Object name.
    pub object: String,
    /// Version id; empty means "current".
    pub version_id: String,
}

// ---------------------------------------------------------------------------
// Extended ACL
// ---------------------------------------------------------------------------

/// Object operations an extended-ACL record can match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EaclOperation {
    /// Read object payload.
    Get,
    /// Read object header.
    Head,
    /// Write object.
    Put,
    /// Delete object.
    Delete,
}

/// Verdict of an extended-ACL record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EaclAction {
    /// Permit the operation.
    Allow,
    /// Refuse the operation.
    Deny,
}

/// Subject an extended-ACL record applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EaclTarget {
    /// Any caller that is not the container owner.
    Others,
    /// Callers identified by the given account ids.
    Accounts(Vec<String>),
}

/// One rule of an extended-ACL table, scoped to a single object id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EaclRecord {
    /// Operation the rule matches.
    pub operation: EaclOperation,
    /// Allow or deny.
    pub action: EaclAction,
    /// Who the rule applies to.
    pub targets: Vec<EaclTarget>,
    /// Object id the rule is scoped to.
    pub object_id: String,
}

/// Extended-ACL table applied per object on top of the basic ACL mask.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EaclTable {
    /// Rules in evaluation order.
    pub records: Vec<EaclRecord>,
}

// ---------------------------------------------------------------------------
// S3 XML documents
// ---------------------------------------------------------------------------

/// Request body of CreateBucket; an empty body is represented by default
/// values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateBucketConfiguration {
    /// Requested location constraint; empty when absent.
    pub location_constraint: String,
}

/// Response body of CopyObject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyObjectResult {
    /// Creation time of the destination object.
    pub last_modified: DateTime<Utc>,
    /// Hash of the destination object, unquoted.
    pub e_tag: String,
}

/// A single tag inside a [`Tagging`] document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

/// The `Tagging` document used by the object-tagging subresource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tagging {
    /// The tag set.
    pub tag_set: Vec<Tag>,
}

impl Tagging {
    /// Convert the document into the map form used by the object layer.
    #[must_use]
    pub fn into_tag_set(self) -> TagSet {
        self.tag_set.into_iter().map(|t| (t.key, t.value)).collect()
    }

    /// Build a document from the map form, with deterministic key order.
    #[must_use]
    pub fn from_tag_set(tags: &TagSet) -> Self {
        let mut keys: Vec<&String> = tags.keys().collect();
        keys.sort();
        Self {
            tag_set: keys
                .into_iter()
                .map(|k| Tag {
                    key: k.clone(),
                    value: tags[k].clone(),
                })
                .collect(),
        }
    }
}

/// The XML error document written for every failed request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Taxonomy code string.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Request path the error refers to.
    pub resource: String,
    /// Request id assigned by the service.
    pub request_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_single_rep_policy() {
        let policy: PlacementPolicy = "REP 3".parse().expect("valid policy");
        assert_eq!(policy.replicas, vec![3]);
        assert_eq!(policy.copies(), 3);
        assert_eq!(policy.to_string(), "REP 3");
    }

    #[test]
    fn test_should_parse_multi_clause_policy() {
        let policy: PlacementPolicy = "REP 2 REP 1".parse().expect("valid policy");
        assert_eq!(policy.replicas, vec![2, 1]);
        assert_eq!(policy.copies(), 3);
    }

    #[test]
    fn test_should_reject_malformed_policy() {
        assert!("".parse::<PlacementPolicy>().is_err());
        assert!("REP".parse::<PlacementPolicy>().is_err());
        assert!("REP zero".parse::<PlacementPolicy>().is_err());
        assert!("REP 0".parse::<PlacementPolicy>().is_err());
        assert!("SELECT 2".parse::<PlacementPolicy>().is_err());
    }

    #[test]
    fn test_should_find_policy_by_location_constraint() {
        let eu: PlacementPolicy = "REP 2".parse().expect("valid policy");
        let boxed = AccessBox {
            gate: GateData::default(),
            policies: vec![ContainerPolicy {
                location_constraint: "eu".to_owned(),
                policy: eu.clone(),
            }],
        };
        assert_eq!(boxed.placement_policy("eu"), Some(&eu));
        assert_eq!(boxed.placement_policy("us"), None);
    }

    #[test]
    fn test_should_fall_back_to_object_id_for_version() {
        let mut info = sample_object_info();
        info.version_id = String::new();
        assert_eq!(info.version(), "obj-1");
        info.version_id = "v7".to_owned();
        assert_eq!(info.version(), "v7");
    }

    #[test]
    fn test_should_round_trip_tagging_document() {
        let mut tags = TagSet::new();
        tags.insert("env".to_owned(), "prod".to_owned());
        tags.insert("app".to_owned(), "gw".to_owned());

        let doc = Tagging::from_tag_set(&tags);
        assert_eq!(doc.tag_set[0].key, "app");
        assert_eq!(doc.tag_set[1].key, "env");
        assert_eq!(doc.into_tag_set(), tags);
    }

    fn sample_object_info() -> ObjectInfo {
        ObjectInfo {
            bucket: "b".to_owned(),
            name: "o".to_owned(),
            id: "obj-1".to_owned(),
            size: 5,
            created: Utc::now(),
            content_type: String::new(),
            headers: HashMap::new(),
            hash_sum: "abc".to_owned(),
            version_id: String::new(),
        }
    }
}
