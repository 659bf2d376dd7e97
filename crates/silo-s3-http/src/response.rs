//! Shaping coordinator outputs into HTTP responses.
//!
//! Write operations answer header-only; COPY and the tagging getter carry
//! small XML bodies. Every failure becomes the XML error document with
//! the request id and resource filled in.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::HeaderValue;
use http_body_util::Full;
use silo_s3_core::encryption::{ATTR_SSE_ALGORITHM, ATTR_SSE_KEY_MD5};
use silo_s3_core::headers::{CONTENT_TYPE_ATTR, METADATA_PREFIX};
use silo_s3_core::ops::bucket::CreateBucketOutput;
use silo_s3_core::ops::object::{CopyObjectOutput, HeadObjectOutput, PutObjectOutput};
use silo_s3_core::ops::tagging::{GetObjectTaggingOutput, PutObjectTaggingOutput};
use silo_s3_model::error::S3Error;
use silo_s3_model::types::ErrorResponse;
use silo_s3_xml::{to_xml, to_xml_plain};
use tracing::error;

/// Response body type of the gateway.
pub type ResponseBody = Full<Bytes>;

const APPLICATION_XML: &str = "application/xml";

/// `x-amz-version-id`.
const AMZ_VERSION_ID: &str = "x-amz-version-id";
/// `x-amz-server-side-encryption-customer-algorithm`.
const AMZ_SSE_CUSTOMER_ALGORITHM: &str = "x-amz-server-side-encryption-customer-algorithm";
/// `x-amz-server-side-encryption-customer-key-MD5`.
const AMZ_SSE_CUSTOMER_KEY_MD5: &str = "x-amz-server-side-encryption-customer-key-md5";

/// Render an error as the S3 XML error document.
#[must_use]
pub fn error_to_response(
    err: &S3Error,
    request_id: &str,
    resource: &str,
) -> http::Response<ResponseBody> {
    let document = ErrorResponse {
        code: err.code.as_str().to_owned(),
        message: err.message.clone(),
        resource: err.resource.clone().unwrap_or_else(|| resource.to_owned()),
        request_id: err
            .request_id
            .clone()
            .unwrap_or_else(|| request_id.to_owned()),
    };

    let body = match to_xml_plain("Error", &document) {
        Ok(xml) => Bytes::from(xml),
        Err(encode_err) => {
            error!(error = %encode_err, "failed to encode error document");
            Bytes::from(document.message)
        }
    };

    http::Response::builder()
        .status(err.status_code)
        .header(http::header::CONTENT_TYPE, APPLICATION_XML)
        .body(Full::new(body))
        .unwrap_or_else(|_| fallback_response())
}

/// `200 OK` with an empty body.
#[must_use]
pub fn empty_ok_response() -> http::Response<ResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|_| fallback_response())
}

/// `200 OK` carrying an XML body.
fn xml_response(xml: Vec<u8>) -> http::Response<ResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, APPLICATION_XML)
        .body(Full::new(Bytes::from(xml)))
        .unwrap_or_else(|_| fallback_response())
}

/// Response for PUT object: header-only with the `ETag`.
#[must_use]
pub fn put_object_response(output: &PutObjectOutput) -> http::Response<ResponseBody> {
    let mut response = empty_ok_response();
    if let Ok(value) = HeaderValue::from_str(&output.e_tag) {
        response.headers_mut().insert(http::header::ETAG, value);
    }
    response
}

/// Response for CREATE bucket: header-only.
#[must_use]
pub fn create_bucket_response(_output: &CreateBucketOutput) -> http::Response<ResponseBody> {
    empty_ok_response()
}

/// Response for COPY object: `CopyObjectResult` XML plus version and
/// SSE-C echo headers.
///
/// # Errors
///
/// Returns `InternalError` when the result document cannot be encoded.
pub fn copy_object_response(
    output: &CopyObjectOutput,
) -> Result<http::Response<ResponseBody>, S3Error> {
    let xml = to_xml("CopyObjectResult", &output.result)
        .map_err(|err| S3Error::internal(err.to_string()))?;

    let mut response = xml_response(xml);
    set_header(&mut response, AMZ_VERSION_ID, &output.version_id);
    if let Some(sse) = &output.sse_echo {
        set_header(&mut response, AMZ_SSE_CUSTOMER_ALGORITHM, &sse.algorithm);
        set_header(&mut response, AMZ_SSE_CUSTOMER_KEY_MD5, &sse.key_md5);
    }
    Ok(response)
}

/// Response for HEAD object: the descriptor rendered as headers.
#[must_use]
pub fn head_object_response(output: &HeadObjectOutput) -> http::Response<ResponseBody> {
    let info = &output.info;
    let mut response = empty_ok_response();

    set_header(&mut response, http::header::ETAG.as_str(), &info.hash_sum);
    set_header(
        &mut response,
        http::header::CONTENT_LENGTH.as_str(),
        &info.size.to_string(),
    );
    if !info.content_type.is_empty() {
        set_header(
            &mut response,
            http::header::CONTENT_TYPE.as_str(),
            &info.content_type,
        );
    }
    set_header(
        &mut response,
        http::header::LAST_MODIFIED.as_str(),
        &format_http_date(&info.created),
    );
    if !info.version_id.is_empty() {
        set_header(&mut response, AMZ_VERSION_ID, &info.version_id);
    }

    for (key, value) in &info.headers {
        match key.as_str() {
            CONTENT_TYPE_ATTR => {}
            ATTR_SSE_ALGORITHM => {
                set_header(&mut response, AMZ_SSE_CUSTOMER_ALGORITHM, value);
            }
            ATTR_SSE_KEY_MD5 => {
                set_header(&mut response, AMZ_SSE_CUSTOMER_KEY_MD5, value);
            }
            _ => set_header(&mut response, &format!("{METADATA_PREFIX}{key}"), value),
        }
    }

    response
}

/// Response for GET object tagging: `Tagging` XML plus the version.
///
/// # Errors
///
/// Returns `InternalError` when the document cannot be encoded.
pub fn get_object_tagging_response(
    output: &GetObjectTaggingOutput,
) -> Result<http::Response<ResponseBody>, S3Error> {
    let xml =
        to_xml("Tagging", &output.tagging).map_err(|err| S3Error::internal(err.to_string()))?;

    let mut response = xml_response(xml);
    if !output.version_id.is_empty() {
        set_header(&mut response, AMZ_VERSION_ID, &output.version_id);
    }
    Ok(response)
}

/// Response for PUT object tagging: header-only with the version.
#[must_use]
pub fn put_object_tagging_response(
    output: &PutObjectTaggingOutput,
) -> http::Response<ResponseBody> {
    let mut response = empty_ok_response();
    if !output.version_id.is_empty() {
        set_header(&mut response, AMZ_VERSION_ID, &output.version_id);
    }
    response
}

fn set_header(response: &mut http::Response<ResponseBody>, name: &str, value: &str) {
    let Ok(name) = http::header::HeaderName::from_bytes(name.as_bytes()) else {
        return;
    };
    if let Ok(value) = HeaderValue::from_str(value) {
        response.headers_mut().insert(name, value);
    }
}

fn format_http_date(ts: &DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn fallback_response() -> http::Response<ResponseBody> {
    let mut response = http::Response::new(Full::new(Bytes::new()));
    *response.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use silo_s3_model::s3_error;
    use silo_s3_model::types::{CopyObjectResult, ObjectInfo};
    use std::collections::HashMap;

    #[test]
    fn test_should_render_error_document() {
        let err = s3_error!(NoSuchBucket);
        let response = error_to_response(&err, "req-1", "/missing");

        assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
        assert_eq!(
            response
                .headers()
                .get(http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some(APPLICATION_XML)
        );
    }

    #[test]
    fn test_should_set_etag_on_put_response() {
        let response = put_object_response(&PutObjectOutput {
            e_tag: "abc123".to_owned(),
        });
        assert_eq!(response.status(), http::StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(http::header::ETAG)
                .and_then(|v| v.to_str().ok()),
            Some("abc123")
        );
    }

    #[test]
    fn test_should_render_copy_result_with_sse_echo() {
        let output = CopyObjectOutput {
            result: CopyObjectResult {
                last_modified: Utc
                    .with_ymd_and_hms(2024, 3, 1, 0, 0, 0)
                    .single()
                    .expect("ts"),
                e_tag: "abc".to_owned(),
            },
            version_id: "v1".to_owned(),
            sse_echo: Some(silo_s3_core::ops::object::SseEcho {
                algorithm: "AES256".to_owned(),
                key_md5: "md5==".to_owned(),
            }),
        };

        let response = copy_object_response(&output).expect("encodable");
        assert_eq!(
            response
                .headers()
                .get(AMZ_SSE_CUSTOMER_ALGORITHM)
                .and_then(|v| v.to_str().ok()),
            Some("AES256")
        );
        assert_eq!(
            response
                .headers()
                .get(AMZ_VERSION_ID)
                .and_then(|v| v.to_str().ok()),
            Some("v1")
        );
    }

    #[test]
    fn test_should_render_head_response_headers() {
        let mut headers = HashMap::new();
        headers.insert("Color".to_owned(), "blue".to_owned());
        headers.insert(CONTENT_TYPE_ATTR.to_owned(), "text/plain".to_owned());

        let output = HeadObjectOutput {
            info: ObjectInfo {
                bucket: "b".to_owned(),
                name: "o".to_owned(),
                id: "id-1".to_owned(),
                size: 42,
                created: Utc
                    .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
                    .single()
                    .expect("ts"),
                content_type: "text/plain".to_owned(),
                headers,
                hash_sum: "abc".to_owned(),
                version_id: "v9".to_owned(),
            },
        };

        let response = head_object_response(&output);
        let headers = response.headers();
        assert_eq!(
            headers.get(http::header::ETAG).and_then(|v| v.to_str().ok()),
            Some("abc")
        );
        assert_eq!(
            headers
                .get(http::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok()),
            Some("42")
        );
        assert_eq!(
            headers
                .get(http::header::LAST_MODIFIED)
                .and_then(|v| v.to_str().ok()),
            Some("Fri, 01 Mar 2024 12:00:00 GMT")
        );
        assert_eq!(
            headers.get("x-amz-meta-Color").and_then(|v| v.to_str().ok()),
            Some("blue")
        );
        assert!(!headers.contains_key("x-amz-meta-Content-Type"));
        assert_eq!(
            headers.get(AMZ_VERSION_ID).and_then(|v| v.to_str().ok()),
            Some("v9")
        );
    }
}
