//! Interpreters for the S3-specific request headers.
//!
//! Everything here is pure: headers in, typed values or taxonomy errors
//! out. The coordinators compose these into their pipelines.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use http::HeaderMap;
use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;
use silo_s3_model::error::S3Error;
use silo_s3_model::s3_error;
use silo_s3_model::types::{ObjectInfo, TagSet};

/// Prefix of user metadata headers.
pub const METADATA_PREFIX: &str = "x-amz-meta-";

/// Metadata key (after prefix stripping) carrying the copies-number
/// override for the Silo backend.
pub const COPIES_NUMBER_META_KEY: &str = "Silo-Copies-Number";

/// Attribute key under which the content type is stored on an object.
pub const CONTENT_TYPE_ATTR: &str = "Content-Type";

/// `x-amz-copy-source`.
pub const AMZ_COPY_SOURCE: &str = "x-amz-copy-source";
/// `x-amz-metadata-directive`.
pub const AMZ_METADATA_DIRECTIVE: &str = "x-amz-metadata-directive";
/// `x-amz-tagging-directive`.
pub const AMZ_TAGGING_DIRECTIVE: &str = "x-amz-tagging-directive";
/// `x-amz-tagging`.
pub const AMZ_TAGGING: &str = "x-amz-tagging";
/// `x-amz-copy-source-if-match`.
pub const AMZ_COPY_IF_MATCH: &str = "x-amz-copy-source-if-match";
/// `x-amz-copy-source-if-none-match`.
pub const AMZ_COPY_IF_NONE_MATCH: &str = "x-amz-copy-source-if-none-match";
/// `x-amz-copy-source-if-modified-since`.
pub const AMZ_COPY_IF_MODIFIED_SINCE: &str = "x-amz-copy-source-if-modified-since";
/// `x-amz-copy-source-if-unmodified-since`.
pub const AMZ_COPY_IF_UNMODIFIED_SINCE: &str = "x-amz-copy-source-if-unmodified-since";
/// `x-amz-expected-bucket-owner`.
pub const AMZ_EXPECTED_BUCKET_OWNER: &str = "x-amz-expected-bucket-owner";
/// `x-amz-source-expected-bucket-owner`.
pub const AMZ_SOURCE_EXPECTED_BUCKET_OWNER: &str = "x-amz-source-expected-bucket-owner";
/// `x-amz-bucket-object-lock-enabled`.
pub const AMZ_BUCKET_OBJECT_LOCK_ENABLED: &str = "x-amz-bucket-object-lock-enabled";
/// Query parameter addressing a specific object version.
pub const QUERY_VERSION_ID: &str = "versionId";

/// Directive value requesting replacement of metadata or tags.
const REPLACE_DIRECTIVE: &str = "REPLACE";
/// Directive value requesting inheritance from the copy source.
const COPY_DIRECTIVE: &str = "COPY";

lazy_static! {
    static ref COPY_SOURCE_MATCHER: Regex =
        Regex::new(r"^/?(?P<bucket>[a-z0-9.\-]{3,63})/(?P<object>.+)$")
            .expect("copy source regex is valid");
}

/// First value of a header, when present and valid UTF-8.
#[must_use]
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Collect user metadata from `x-amz-meta-*` headers.
///
/// Keys are the canonical-cased remainder after the prefix
/// (`x-amz-meta-foo-bar` becomes `Foo-Bar`); values are the first value
/// of each header.
#[must_use]
pub fn parse_metadata(headers: &HeaderMap) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    for name in headers.keys() {
        let Some(rest) = name.as_str().strip_prefix(METADATA_PREFIX) else {
            continue;
        };
        let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) else {
            continue;
        };
        metadata.insert(canonical_metadata_key(rest), value.to_owned());
    }
    metadata
}

/// Canonical-case a metadata key the way MIME headers are canonicalized:
/// the first letter of every dash-separated segment is uppercased.
#[must_use]
pub fn canonical_metadata_key(key: &str) -> String {
    key.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Split a copy-source path into bucket and object names.
///
/// # Errors
///
/// Returns `InvalidRequest` when the path does not match the fixed
/// bucket/object pattern.
pub fn path_to_bucket_object(path: &str) -> Result<(String, String), S3Error> {
    let captures = COPY_SOURCE_MATCHER
        .captures(path)
        .ok_or_else(|| s3_error!(InvalidRequest))?;
    Ok((captures["bucket"].to_owned(), captures["object"].to_owned()))
}

/// Parse the `x-amz-copy-source` header into bucket, object, and version.
///
/// A `?versionId=<id>` query is extracted first; the remaining path is
/// percent-decoded and split by [`path_to_bucket_object`].
///
/// # Errors
///
/// Returns `InvalidRequest` when the header is absent or malformed.
pub fn parse_copy_source(headers: &HeaderMap) -> Result<(String, String, String), S3Error> {
    let source = header_str(headers, AMZ_COPY_SOURCE)
        .ok_or_else(|| s3_error!(InvalidRequest, "missing copy source"))?;

    let (path, query) = match source.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (source, None),
    };

    let version_id = query
        .map(|q| query_value(q, QUERY_VERSION_ID))
        .unwrap_or_default();

    let path = percent_decode_str(path)
        .decode_utf8()
        .map_err(|_| s3_error!(InvalidRequest))?;

    let (bucket, object) = path_to_bucket_object(&path)?;
    Ok((bucket, object, version_id))
}

/// Look up a single value in a raw query string.
fn query_value(query: &str, name: &str) -> String {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_owned())
        .unwrap_or_default()
}

/// A metadata or tagging directive on COPY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Inherit from the copy source.
    Copy,
    /// Re-derive from the request.
    Replace,
}

/// Parse `x-amz-metadata-directive`; absence means inherit.
///
/// # Errors
///
/// Returns `InvalidMetadataDirective` for any other value.
pub fn parse_metadata_directive(headers: &HeaderMap) -> Result<Option<Directive>, S3Error> {
    parse_directive(headers, AMZ_METADATA_DIRECTIVE)
        .map_err(|()| s3_error!(InvalidMetadataDirective))
}

/// Parse `x-amz-tagging-directive`; absence means inherit.
///
/// # Errors
///
/// Returns `InvalidTaggingDirective` for any other value.
pub fn parse_tagging_directive(headers: &HeaderMap) -> Result<Option<Directive>, S3Error> {
    parse_directive(headers, AMZ_TAGGING_DIRECTIVE).map_err(|()| s3_error!(InvalidTaggingDirective))
}

fn parse_directive(headers: &HeaderMap, name: &str) -> Result<Option<Directive>, ()> {
    match header_str(headers, name) {
        None | Some("") => Ok(None),
        Some(COPY_DIRECTIVE) => Ok(Some(Directive::Copy)),
        Some(REPLACE_DIRECTIVE) => Ok(Some(Directive::Replace)),
        Some(_) => Err(()),
    }
}

/// Parse an HTTP date in RFC 1123, RFC 850, or ANSI C asctime form.
///
/// # Errors
///
/// Returns `BadRequest` when the value matches none of the formats.
pub fn parse_http_time(value: &str) -> Result<DateTime<Utc>, S3Error> {
    const FORMATS: [&str; 3] = [
        "%a, %d %b %Y %H:%M:%S GMT", // RFC 1123
        "%A, %d-%b-%y %H:%M:%S GMT", // RFC 850
        "%a %b %e %H:%M:%S %Y",      // ANSI C asctime
    ];

    for format in FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed.and_utc());
        }
    }
    Err(s3_error!(
        BadRequest,
        format!("can't parse http time: {value}")
    ))
}

/// The four copy-conditional headers, parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalArgs {
    /// Required source ETag.
    pub if_match: String,
    /// Forbidden source ETag.
    pub if_none_match: String,
    /// The source must have been modified after this time.
    pub if_modified_since: Option<DateTime<Utc>>,
    /// The source must not have been modified after this time.
    pub if_unmodified_since: Option<DateTime<Utc>>,
}

impl ConditionalArgs {
    /// Parse the copy-source conditional headers.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` when a time-based header carries a malformed
    /// date.
    pub fn parse(headers: &HeaderMap) -> Result<Self, S3Error> {
        let mut args = Self {
            if_match: header_str(headers, AMZ_COPY_IF_MATCH)
                .unwrap_or_default()
                .to_owned(),
            if_none_match: header_str(headers, AMZ_COPY_IF_NONE_MATCH)
                .unwrap_or_default()
                .to_owned(),
            ..Self::default()
        };

        if let Some(value) = header_str(headers, AMZ_COPY_IF_MODIFIED_SINCE) {
            args.if_modified_since = Some(parse_http_time(value)?);
        }
        if let Some(value) = header_str(headers, AMZ_COPY_IF_UNMODIFIED_SINCE) {
            args.if_unmodified_since = Some(parse_http_time(value)?);
        }
        Ok(args)
    }
}

/// Evaluate copy preconditions against the source object.
///
/// # Errors
///
/// Returns `PreconditionFailed` when any condition does not hold.
pub fn check_preconditions(info: &ObjectInfo, args: &ConditionalArgs) -> Result<(), S3Error> {
    if !args.if_match.is_empty() && args.if_match != info.hash_sum {
        return Err(s3_error!(PreconditionFailed));
    }
    if !args.if_none_match.is_empty() && args.if_none_match == info.hash_sum {
        return Err(s3_error!(PreconditionFailed));
    }
    if let Some(since) = args.if_modified_since {
        if since >= info.created {
            return Err(s3_error!(PreconditionFailed));
        }
    }
    if let Some(until) = args.if_unmodified_since {
        if until < info.created {
            return Err(s3_error!(PreconditionFailed));
        }
    }
    Ok(())
}

/// Evaluate read preconditions (`If-Match`, `If-None-Match`,
/// `If-Modified-Since`, `If-Unmodified-Since`) for HEAD.
///
/// # Errors
///
/// Returns `PreconditionFailed` or `NotModified` per the usual HTTP
/// semantics.
pub fn check_read_preconditions(info: &ObjectInfo, headers: &HeaderMap) -> Result<(), S3Error> {
    if let Some(if_match) = header_str(headers, "if-match") {
        if if_match != info.hash_sum {
            return Err(s3_error!(PreconditionFailed));
        }
    }
    if let Some(value) = header_str(headers, "if-unmodified-since") {
        if parse_http_time(value)? < info.created {
            return Err(s3_error!(PreconditionFailed));
        }
    }
    if let Some(if_none_match) = header_str(headers, "if-none-match") {
        if if_none_match == info.hash_sum {
            return Err(s3_error!(NotModified));
        }
    }
    if let Some(value) = header_str(headers, "if-modified-since") {
        if parse_http_time(value)? >= info.created {
            return Err(s3_error!(NotModified));
        }
    }
    Ok(())
}

/// Parse the URL-encoded `x-amz-tagging` header into a tag set.
///
/// Returns `None` when the header is absent.
///
/// # Errors
///
/// Returns `InvalidRequest` when a pair cannot be percent-decoded.
pub fn parse_tagging_header(headers: &HeaderMap) -> Result<Option<TagSet>, S3Error> {
    let Some(raw) = header_str(headers, AMZ_TAGGING) else {
        return Ok(None);
    };

    let mut tags = TagSet::new();
    for pair in raw.split('&').filter(|s| !s.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_tag_component(key)?;
        let value = decode_tag_component(value)?;
        tags.insert(key, value);
    }
    Ok(Some(tags))
}

fn decode_tag_component(raw: &str) -> Result<String, S3Error> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| s3_error!(InvalidRequest, format!("can't decode tagging pair: {raw}")))
}

/// Copies-number override from metadata, or the deployment default.
///
/// The metadata value is a comma-separated list of positive integers.
///
/// # Errors
///
/// Returns `InvalidRequest` when the value does not parse.
pub fn get_copies_number_or_default(
    metadata: &HashMap<String, String>,
    default: &[u32],
) -> Result<Vec<u32>, S3Error> {
    let Some(raw) = metadata.get(COPIES_NUMBER_META_KEY) else {
        return Ok(default.to_vec());
    };

    raw.split(',')
        .map(str::trim)
        .map(|s| {
            s.parse::<u32>()
                .map_err(|_| s3_error!(InvalidRequest, format!("can't parse copies number: {raw}")))
        })
        .collect()
}
