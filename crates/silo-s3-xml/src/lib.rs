//! S3 XML wire codec for the Silo S3 gateway.

pub mod deserialize;
pub mod error;
pub mod serialize;

pub use deserialize::{S3Deserialize, from_xml};
pub use error::XmlError;
pub use serialize::{S3Serialize, S3_NAMESPACE, to_xml, to_xml_plain};
