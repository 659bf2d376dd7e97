//! Basic-ACL and extended-ACL handling.
//!
//! Buckets carry a 32-bit basic ACL mask chosen at creation; objects can
//! additionally be guarded by an extended-ACL table. Canned S3 tokens map
//! to fixed masks, anything else is read as a hex mask.

use http::HeaderMap;
use silo_s3_model::error::S3Error;
use silo_s3_model::s3_error;
use silo_s3_model::types::{
    EaclAction, EaclOperation, EaclRecord, EaclTable, EaclTarget, ObjectInfo,
};

use crate::headers::header_str;

/// Basic mask for the canned `private` token.
pub const PRIVATE_BASIC_RULE: u32 = 0x1C8C_8CCC;
/// Basic mask for the canned `public-read` token.
pub const READ_ONLY_BASIC_RULE: u32 = 0x1FBF_8CFF;
/// Basic mask for the canned `public-read-write` token.
pub const PUBLIC_BASIC_RULE: u32 = 0x1FBF_BFFF;
/// Mask applied when no `x-amz-acl` header is present (open bucket).
pub const OPEN_BASIC_RULE: u32 = 0x0FFF_FFFF;

/// `x-amz-acl`.
pub const AMZ_ACL: &str = "x-amz-acl";
/// `x-amz-grant-read`.
pub const AMZ_GRANT_READ: &str = "x-amz-grant-read";
/// `x-amz-grant-write`.
pub const AMZ_GRANT_WRITE: &str = "x-amz-grant-write";
/// `x-amz-grant-full-control`.
pub const AMZ_GRANT_FULL_CONTROL: &str = "x-amz-grant-full-control";

const ACL_PRIVATE: &str = "private";
const ACL_PUBLIC_READ: &str = "public-read";
const ACL_PUBLIC_READ_WRITE: &str = "public-read-write";

const READ_OPERATIONS: [EaclOperation; 2] = [EaclOperation::Get, EaclOperation::Head];
const WRITE_OPERATIONS: [EaclOperation; 2] = [EaclOperation::Put, EaclOperation::Delete];

/// Parse an `x-amz-acl` value into a basic ACL mask.
///
/// Canned tokens map to fixed masks; any other value is parsed as a
/// 32-bit hex mask, case-insensitively and with an optional `0x` prefix.
///
/// # Errors
///
/// Returns `BadRequest` when the value is neither canned nor valid hex.
pub fn parse_basic_acl(value: &str) -> Result<u32, S3Error> {
    match value {
        ACL_PRIVATE => Ok(PRIVATE_BASIC_RULE),
        ACL_PUBLIC_READ => Ok(READ_ONLY_BASIC_RULE),
        ACL_PUBLIC_READ_WRITE => Ok(PUBLIC_BASIC_RULE),
        other => {
            let lowered = other.to_ascii_lowercase();
            let digits = lowered.strip_prefix("0x").unwrap_or(&lowered);
            u32::from_str_radix(digits, 16)
                .map_err(|_| s3_error!(BadRequest, format!("can't parse basic ACL: {other}")))
        }
    }
}

/// Basic ACL from the request, or the open default when the header is
/// absent.
///
/// # Errors
///
/// Returns `BadRequest` when the header value cannot be parsed.
pub fn resolve_basic_acl(headers: &HeaderMap) -> Result<u32, S3Error> {
    match header_str(headers, AMZ_ACL) {
        Some(value) => parse_basic_acl(value),
        None => Ok(OPEN_BASIC_RULE),
    }
}

/// Whether the request carries any ACL header.
#[must_use]
pub fn contains_acl_headers(headers: &HeaderMap) -> bool {
    [AMZ_ACL, AMZ_GRANT_READ, AMZ_GRANT_WRITE, AMZ_GRANT_FULL_CONTROL]
        .iter()
        .any(|name| headers.contains_key(*name))
}

/// Rebuild the extended-ACL table for an object from the request's ACL
/// headers.
///
/// The canned `x-amz-acl` token yields rules for anonymous callers;
/// `x-amz-grant-*` headers yield rules for explicit account ids.
///
/// # Errors
///
/// Returns `BadRequest` for unknown canned tokens and `InvalidRequest`
/// for unsupported grantee forms.
pub fn build_eacl_table(headers: &HeaderMap, object: &ObjectInfo) -> Result<EaclTable, S3Error> {
    let mut table = EaclTable::default();

    if let Some(canned) = header_str(headers, AMZ_ACL) {
        append_canned_records(&mut table, canned, object)?;
    }

    if let Some(grant) = header_str(headers, AMZ_GRANT_READ) {
        let accounts = parse_grantees(grant)?;
        append_records(&mut table, &READ_OPERATIONS, EaclAction::Allow, EaclTarget::Accounts(accounts), object);
    }
    if let Some(grant) = header_str(headers, AMZ_GRANT_WRITE) {
        let accounts = parse_grantees(grant)?;
        append_records(&mut table, &WRITE_OPERATIONS, EaclAction::Allow, EaclTarget::Accounts(accounts), object);
    }
    if let Some(grant) = header_str(headers, AMZ_GRANT_FULL_CONTROL) {
        let accounts = parse_grantees(grant)?;
        append_records(&mut table, &READ_OPERATIONS, EaclAction::Allow, EaclTarget::Accounts(accounts.clone()), object);
        append_records(&mut table, &WRITE_OPERATIONS, EaclAction::Allow, EaclTarget::Accounts(accounts), object);
    }

    Ok(table)
}

fn append_canned_records(
    table: &mut EaclTable,
    canned: &str,
    object: &ObjectInfo,
) -> Result<(), S3Error> {
    match canned {
        ACL_PRIVATE => {
            append_records(table, &READ_OPERATIONS, EaclAction::Deny, EaclTarget::Others, object);
            append_records(table, &WRITE_OPERATIONS, EaclAction::Deny, EaclTarget::Others, object);
        }
        ACL_PUBLIC_READ => {
            append_records(table, &READ_OPERATIONS, EaclAction::Allow, EaclTarget::Others, object);
            append_records(table, &WRITE_OPERATIONS, EaclAction::Deny, EaclTarget::Others, object);
        }
        ACL_PUBLIC_READ_WRITE => {
            append_records(table, &READ_OPERATIONS, EaclAction::Allow, EaclTarget::Others, object);
            append_records(table, &WRITE_OPERATIONS, EaclAction::Allow, EaclTarget::Others, object);
        }
        other => {
            return Err(s3_error!(
                BadRequest,
                format!("unsupported canned object ACL: {other}")
            ));
        }
    }
    Ok(())
}

fn append_records(
    table: &mut EaclTable,
    operations: &[EaclOperation],
    action: EaclAction,
    target: EaclTarget,
    object: &ObjectInfo,
) {
    for operation in operations {
        table.records.push(EaclRecord {
            operation: *operation,
            action,
            targets: vec![target.clone()],
            object_id: object.id.clone(),
        });
    }
}

/// Parse a grant header of the form `id=account[,id=account...]`.
fn parse_grantees(value: &str) -> Result<Vec<String>, S3Error> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|grantee| {
            grantee
                .strip_prefix("id=")
                .map(|id| id.trim_matches('"').to_owned())
                .ok_or_else(|| {
                    s3_error!(InvalidRequest, format!("unsupported grantee: {grantee}"))
                })
        })
        .collect()
}
