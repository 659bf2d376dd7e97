//! Server-side encryption (SSE-C) parameter handling.
//!
//! The gateway does not encrypt payloads itself; it validates the
//! customer-provided key material and reconciles it with what is recorded
//! on the stored object, so a copy cannot silently mix keys.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use http::HeaderMap;
use md5::{Digest, Md5};
use silo_s3_model::error::S3Error;
use silo_s3_model::s3_error;
use std::collections::HashMap;

use crate::headers::header_str;

/// `x-amz-server-side-encryption-customer-algorithm`.
pub const AMZ_SSE_CUSTOMER_ALGORITHM: &str = "x-amz-server-side-encryption-customer-algorithm";
/// `x-amz-server-side-encryption-customer-key`.
pub const AMZ_SSE_CUSTOMER_KEY: &str = "x-amz-server-side-encryption-customer-key";
/// `x-amz-server-side-encryption-customer-key-MD5`.
pub const AMZ_SSE_CUSTOMER_KEY_MD5: &str = "x-amz-server-side-encryption-customer-key-md5";

/// Object attribute recording the encryption algorithm.
pub const ATTR_SSE_ALGORITHM: &str = "S3-Algorithm";
/// Object attribute recording the MD5 of the customer key.
pub const ATTR_SSE_KEY_MD5: &str = "S3-Key-MD5";

const AES256: &str = "AES256";
const CUSTOMER_KEY_LEN: usize = 32;

/// SSE-C parameters supplied with a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptionParams {
    enabled: bool,
    algorithm: String,
    key: Vec<u8>,
    key_md5: String,
}

/// Encryption state recorded on a stored object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptionInfo {
    /// Whether the object payload is encrypted.
    pub enabled: bool,
    /// Recorded algorithm.
    pub algorithm: String,
    /// Recorded MD5 of the customer key, base64.
    pub key_md5: String,
}

impl EncryptionInfo {
    /// Read the recorded encryption state from an object's attribute map.
    #[must_use]
    pub fn from_object_headers(headers: &HashMap<String, String>) -> Self {
        match headers.get(ATTR_SSE_ALGORITHM) {
            Some(algorithm) => Self {
                enabled: true,
                algorithm: algorithm.clone(),
                key_md5: headers.get(ATTR_SSE_KEY_MD5).cloned().unwrap_or_default(),
            },
            None => Self::default(),
        }
    }
}

impl EncryptionParams {
    /// Whether SSE-C is requested.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// The requested algorithm; empty when disabled.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Base64 MD5 of the customer key; empty when disabled.
    #[must_use]
    pub fn key_md5(&self) -> &str {
        &self.key_md5
    }

    /// The raw customer key for the object layer.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Check the parameters against the encryption state recorded on a
    /// stored object.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` when one side is encrypted and the other is
    /// not, or when the key material differs.
    pub fn matches_object_encryption(&self, recorded: &EncryptionInfo) -> Result<(), S3Error> {
        if recorded.enabled && !self.enabled {
            return Err(s3_error!(
                BadRequest,
                "object is encrypted, but encryption headers are missing"
            ));
        }
        if !recorded.enabled && self.enabled {
            return Err(s3_error!(BadRequest, "object is not encrypted"));
        }
        if self.enabled && self.key_md5 != recorded.key_md5 {
            return Err(s3_error!(
                BadRequest,
                "provided SSE-C key does not match the object key"
            ));
        }
        Ok(())
    }
}

/// Build [`EncryptionParams`] from request headers.
///
/// Absent headers yield disabled params. When present, the algorithm must
/// be `AES256`, the key must be 32 base64-decoded bytes, and the supplied
/// key MD5 must match the key.
///
/// # Errors
///
/// Returns `BadRequest` for any malformed or inconsistent SSE header.
pub fn form_encryption_params(headers: &HeaderMap) -> Result<EncryptionParams, S3Error> {
    let algorithm = header_str(headers, AMZ_SSE_CUSTOMER_ALGORITHM);
    let key = header_str(headers, AMZ_SSE_CUSTOMER_KEY);
    let key_md5 = header_str(headers, AMZ_SSE_CUSTOMER_KEY_MD5);

    let (Some(algorithm), Some(key), Some(key_md5)) = (algorithm, key, key_md5) else {
        if headers.contains_key(AMZ_SSE_CUSTOMER_ALGORITHM)
            || headers.contains_key(AMZ_SSE_CUSTOMER_KEY)
            || headers.contains_key(AMZ_SSE_CUSTOMER_KEY_MD5)
        {
            return Err(s3_error!(
                BadRequest,
                "all three SSE-C headers must be provided together"
            ));
        }
        return Ok(EncryptionParams::default());
    };

    if algorithm != AES256 {
        return Err(s3_error!(
            BadRequest,
            format!("invalid encryption algorithm: {algorithm}")
        ));
    }

    let key_bytes = BASE64
        .decode(key)
        .map_err(|_| s3_error!(BadRequest, "invalid SSE-C key encoding"))?;
    if key_bytes.len() != CUSTOMER_KEY_LEN {
        return Err(s3_error!(BadRequest, "invalid SSE-C key length"));
    }

    let computed_md5 = BASE64.encode(Md5::digest(&key_bytes));
    if computed_md5 != key_md5 {
        return Err(s3_error!(BadRequest, "SSE-C key MD5 mismatch"));
    }

    Ok(EncryptionParams {
        enabled: true,
        algorithm: algorithm.to_owned(),
        key: key_bytes,
        key_md5: key_md5.to_owned(),
    })
}
