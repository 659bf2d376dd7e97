//! Data model and S3 error taxonomy for the Silo S3 gateway.

pub mod error;
pub mod request;
pub mod types;

pub use error::{S3Error, S3ErrorCode};
pub use request::PayloadStream;
