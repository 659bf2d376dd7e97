//! Hyper service, router, responder, and metrics surface of the Silo S3
//! gateway.

pub mod metrics;
pub mod response;
pub mod router;
pub mod service;

pub use response::ResponseBody;
pub use router::{GatewayOperation, Router, RoutingContext};
pub use service::S3HttpService;
