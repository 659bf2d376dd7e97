//! Request routing: method, path, and discriminating headers to a gateway
//! operation.
//!
//! Both path-style (`/bucket/key`) and virtual-hosted-style
//! (`bucket.domain/key`) addressing are supported; the latter only when a
//! domain is configured.

use std::fmt;

use percent_encoding::percent_decode_str;
use silo_s3_model::error::S3Error;
use silo_s3_model::s3_error;

use silo_s3_core::headers::AMZ_COPY_SOURCE;

/// The S3 operations served by this gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayOperation {
    /// `PUT /{bucket}`.
    CreateBucket,
    /// `PUT /{bucket}/{key}`.
    PutObject,
    /// `PUT /{bucket}/{key}` with `x-amz-copy-source`.
    CopyObject,
    /// `HEAD /{bucket}/{key}`.
    HeadObject,
    /// `GET /{bucket}/{key}?tagging`.
    GetObjectTagging,
    /// `PUT /{bucket}/{key}?tagging`.
    PutObjectTagging,
}

impl GatewayOperation {
    /// Stable operation name used for metrics labels and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateBucket => "create_bucket",
            Self::PutObject => "put_object",
            Self::CopyObject => "copy_object",
            Self::HeadObject => "head_object",
            Self::GetObjectTagging => "get_object_tagging",
            Self::PutObjectTagging => "put_object_tagging",
        }
    }
}

impl fmt::Display for GatewayOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of routing one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingContext {
    /// The resolved operation.
    pub operation: GatewayOperation,
    /// Addressed bucket.
    pub bucket: String,
    /// Addressed object key; empty for bucket operations.
    pub key: String,
    /// Decoded query parameters in order of appearance.
    pub query_params: Vec<(String, String)>,
}

impl RoutingContext {
    /// First value of a query parameter, when present.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Resolves requests to gateway operations.
#[derive(Debug, Clone, Default)]
pub struct Router {
    domain: Option<String>,
}

impl Router {
    /// Create a router; a non-empty domain enables virtual-hosted-style
    /// addressing.
    #[must_use]
    pub fn new(domain: &str) -> Self {
        Self {
            domain: (!domain.is_empty()).then(|| domain.to_owned()),
        }
    }

    /// Route a request from its head.
    ///
    /// # Errors
    ///
    /// `NotImplemented` for recognized-but-unsupported routes,
    /// `MethodNotAllowed` for unknown methods, `InvalidRequest` for
    /// undecodable paths.
    pub fn resolve<B>(&self, req: &http::Request<B>) -> Result<RoutingContext, S3Error> {
        let (bucket, key) = self.split_address(req)?;
        if bucket.is_empty() {
            return Err(s3_error!(NotImplemented, "service-level routes are not provided"));
        }

        let query_params = parse_query(req.uri().query().unwrap_or_default())?;
        let has_tagging = query_params.iter().any(|(k, _)| k == "tagging");

        let method = req.method();
        let operation = if *method == http::Method::PUT {
            if key.is_empty() {
                GatewayOperation::CreateBucket
            } else if has_tagging {
                GatewayOperation::PutObjectTagging
            } else if req.headers().contains_key(AMZ_COPY_SOURCE) {
                GatewayOperation::CopyObject
            } else {
                GatewayOperation::PutObject
            }
        } else if *method == http::Method::HEAD && !key.is_empty() {
            GatewayOperation::HeadObject
        } else if *method == http::Method::GET && !key.is_empty() && has_tagging {
            GatewayOperation::GetObjectTagging
        } else if *method == http::Method::GET || *method == http::Method::HEAD {
            return Err(s3_error!(NotImplemented));
        } else {
            return Err(s3_error!(MethodNotAllowed));
        };

        Ok(RoutingContext {
            operation,
            bucket,
            key,
            query_params,
        })
    }

    /// Extract bucket and key from host and path.
    fn split_address<B>(&self, req: &http::Request<B>) -> Result<(String, String), S3Error> {
        let path = req.uri().path().trim_start_matches('/');

        if let Some(bucket) = self.bucket_from_host(req) {
            return Ok((bucket, decode_path(path)?));
        }

        match path.split_once('/') {
            Some((bucket, key)) => Ok((decode_path(bucket)?, decode_path(key)?)),
            None => Ok((decode_path(path)?, String::new())),
        }
    }

    /// The bucket encoded in the `Host` header, for virtual-hosted-style
    /// requests.
    fn bucket_from_host<B>(&self, req: &http::Request<B>) -> Option<String> {
        let domain = self.domain.as_deref()?;
        let host = req
            .headers()
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())?;
        let host = host.split(':').next()?;

        host.strip_suffix(domain)
            .and_then(|prefix| prefix.strip_suffix('.'))
            .filter(|bucket| !bucket.is_empty())
            .map(ToOwned::to_owned)
    }
}

fn decode_path(raw: &str) -> Result<String, S3Error> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| s3_error!(InvalidRequest, "request path is not valid UTF-8"))
}

fn parse_query(raw: &str) -> Result<Vec<(String, String)>, S3Error> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            Ok((decode_path(name)?, decode_path(value)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, uri: &str, headers: &[(&str, &str)]) -> http::Request<()> {
        let mut builder = http::Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).expect("valid request")
    }

    #[test]
    fn test_should_route_create_bucket() {
        let router = Router::default();
        let ctx = router
            .resolve(&request("PUT", "/new-bucket", &[]))
            .expect("routed");
        assert_eq!(ctx.operation, GatewayOperation::CreateBucket);
        assert_eq!(ctx.bucket, "new-bucket");
        assert!(ctx.key.is_empty());
    }

    #[test]
    fn test_should_route_put_object() {
        let router = Router::default();
        let ctx = router
            .resolve(&request("PUT", "/b/path/to/key", &[]))
            .expect("routed");
        assert_eq!(ctx.operation, GatewayOperation::PutObject);
        assert_eq!(ctx.bucket, "b");
        assert_eq!(ctx.key, "path/to/key");
    }

    #[test]
    fn test_should_route_copy_object_on_copy_source_header() {
        let router = Router::default();
        let ctx = router
            .resolve(&request(
                "PUT",
                "/b/key",
                &[("x-amz-copy-source", "/src/key")],
            ))
            .expect("routed");
        assert_eq!(ctx.operation, GatewayOperation::CopyObject);
    }

    #[test]
    fn test_should_route_tagging_subresource() {
        let router = Router::default();

        let ctx = router
            .resolve(&request("PUT", "/b/key?tagging", &[]))
            .expect("routed");
        assert_eq!(ctx.operation, GatewayOperation::PutObjectTagging);

        let ctx = router
            .resolve(&request("GET", "/b/key?tagging&versionId=v1", &[]))
            .expect("routed");
        assert_eq!(ctx.operation, GatewayOperation::GetObjectTagging);
        assert_eq!(ctx.query("versionId"), Some("v1"));
    }

    #[test]
    fn test_should_route_head_object() {
        let router = Router::default();
        let ctx = router
            .resolve(&request("HEAD", "/b/key", &[]))
            .expect("routed");
        assert_eq!(ctx.operation, GatewayOperation::HeadObject);
    }

    #[test]
    fn test_should_decode_path_segments() {
        let router = Router::default();
        let ctx = router
            .resolve(&request("PUT", "/b/path%20with/space", &[]))
            .expect("routed");
        assert_eq!(ctx.key, "path with/space");
    }

    #[test]
    fn test_should_resolve_bucket_from_virtual_host() {
        let router = Router::new("s3.silo.internal");
        let ctx = router
            .resolve(&request(
                "PUT",
                "/key",
                &[("host", "my-bucket.s3.silo.internal:8080")],
            ))
            .expect("routed");
        assert_eq!(ctx.bucket, "my-bucket");
        assert_eq!(ctx.key, "key");
        assert_eq!(ctx.operation, GatewayOperation::PutObject);
    }

    #[test]
    fn test_should_keep_path_style_on_bare_domain() {
        let router = Router::new("s3.silo.internal");
        let ctx = router
            .resolve(&request(
                "PUT",
                "/my-bucket/key",
                &[("host", "s3.silo.internal")],
            ))
            .expect("routed");
        assert_eq!(ctx.bucket, "my-bucket");
        assert_eq!(ctx.key, "key");
    }

    #[test]
    fn test_should_reject_unknown_routes() {
        let router = Router::default();
        assert!(router.resolve(&request("GET", "/b/key", &[])).is_err());
        assert!(router.resolve(&request("DELETE", "/b/key", &[])).is_err());
        assert!(router.resolve(&request("PUT", "/", &[])).is_err());
    }
}
