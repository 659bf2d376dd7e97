//! Request coordinators and the object-layer façade of the Silo S3
//! gateway.
//!
//! The crate translates S3 semantics into object-layer calls: header
//! interpreters parse the AWS dialect, the [`gateway::Gateway`]
//! coordinators orchestrate the backend, and [`layer::ObjectLayer`] is the
//! narrow interface a concrete backend implements.

pub mod acl;
pub mod auth;
pub mod config;
pub mod encryption;
pub mod gateway;
pub mod headers;
pub mod layer;
pub mod lock;
pub mod notifications;
pub mod ops;

pub use auth::{AuthCenter, AuthError, ReqInfo};
pub use config::GatewayConfig;
pub use gateway::Gateway;
pub use layer::{LayerError, ObjectLayer, SharedObjectLayer};
pub use notifications::{NotificationTarget, Notifier};
