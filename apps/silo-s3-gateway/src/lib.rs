//! Development wiring for the Silo S3 gateway binary: an in-memory
//! object layer and a trusting credential center. The production backend
//! and credential center plug into the same interfaces.

pub mod devauth;
pub mod devstore;

pub use devauth::DevAuthCenter;
pub use devstore::MemoryObjectLayer;
