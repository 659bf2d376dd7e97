//! The S3 error taxonomy spoken on the wire.
//!
//! Every failure the gateway reports to a client is one of the
//! [`S3ErrorCode`] entries below, each carrying a fixed code string, HTTP
//! status, and canned description. [`S3Error`] is the concrete error value:
//! a taxonomy entry plus the per-request context (message, resource,
//! request id) that ends up in the XML error document.

use std::fmt;

/// Well-known S3 error codes produced by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum S3ErrorCode {
    /// The caller is not allowed to perform the operation.
    AccessDenied,
    /// The request is malformed (bad copy source, bad header value).
    InvalidRequest,
    /// `x-amz-metadata-directive` is not empty, `COPY`, or `REPLACE`.
    InvalidMetadataDirective,
    /// `x-amz-tagging-directive` is not empty, `COPY`, or `REPLACE`.
    InvalidTaggingDirective,
    /// A conditional header did not hold against the source object.
    PreconditionFailed,
    /// Generic client error (encryption mismatch, bad lock headers).
    BadRequest,
    /// The bucket does not exist.
    NoSuchBucket,
    /// The object does not exist.
    NoSuchKey,
    /// An XML request body failed to parse.
    MalformedXML,
    /// `If-None-Match` matched on a read operation.
    NotModified,
    /// The method is not allowed against this resource.
    MethodNotAllowed,
    /// The operation is recognized but not provided by this gateway.
    NotImplemented,
    /// Default catch-all; the original message is preserved for debugging.
    #[default]
    InternalError,
}

impl S3ErrorCode {
    /// The `Code` string written into the XML error document.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::InvalidRequest => "InvalidRequest",
            Self::InvalidMetadataDirective => "InvalidMetadataDirective",
            Self::InvalidTaggingDirective => "InvalidTaggingDirective",
            Self::PreconditionFailed => "PreconditionFailed",
            Self::BadRequest => "BadRequest",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchKey => "NoSuchKey",
            Self::MalformedXML => "MalformedXML",
            Self::NotModified => "NotModified",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::NotImplemented => "NotImplemented",
            Self::InternalError => "InternalError",
        }
    }

    /// The HTTP status recorded for this taxonomy entry.
    #[must_use]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::AccessDenied => http::StatusCode::FORBIDDEN,
            Self::InvalidRequest
            | Self::InvalidMetadataDirective
            | Self::InvalidTaggingDirective
            | Self::BadRequest
            | Self::MalformedXML => http::StatusCode::BAD_REQUEST,
            Self::PreconditionFailed => http::StatusCode::PRECONDITION_FAILED,
            Self::NoSuchBucket | Self::NoSuchKey => http::StatusCode::NOT_FOUND,
            Self::NotModified => http::StatusCode::NOT_MODIFIED,
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
            Self::NotImplemented => http::StatusCode::NOT_IMPLEMENTED,
            Self::InternalError => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The canned human description for this taxonomy entry.
    #[must_use]
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::AccessDenied => "Access Denied.",
            Self::InvalidRequest => "Invalid Request.",
            Self::InvalidMetadataDirective => "Unknown metadata directive.",
            Self::InvalidTaggingDirective => "Unknown tagging directive.",
            Self::PreconditionFailed => {
                "At least one of the preconditions you specified did not hold."
            }
            Self::BadRequest => "400 BadRequest.",
            Self::NoSuchBucket => "The specified bucket does not exist.",
            Self::NoSuchKey => "The specified key does not exist.",
            Self::MalformedXML => {
                "The XML you provided was not well-formed or did not validate against our published schema."
            }
            Self::NotModified => "Not Modified.",
            Self::MethodNotAllowed => {
                "The specified method is not allowed against this resource."
            }
            Self::NotImplemented => {
                "A header you provided implies functionality that is not implemented."
            }
            Self::InternalError => "We encountered an internal error, please try again.",
        }
    }
}

impl fmt::Display for S3ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete S3 error response.
#[derive(Debug)]
pub struct S3Error {
    /// The taxonomy entry.
    pub code: S3ErrorCode,
    /// Human-readable message; the canned description unless overridden.
    pub message: String,
    /// The resource (request path) that caused the error.
    pub resource: Option<String>,
    /// The request id assigned by the service.
    pub request_id: Option<String>,
    /// The HTTP status to respond with.
    pub status_code: http::StatusCode,
    /// The underlying cause, kept for logging only.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for S3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for S3Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl S3Error {
    /// Create an error carrying the entry's canned description.
    #[must_use]
    pub fn new(code: S3ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_owned(),
            resource: None,
            request_id: None,
            status_code: code.default_status_code(),
            source: None,
        }
    }

    /// Create an error with a custom message.
    #[must_use]
    pub fn with_message(code: S3ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: message.into(),
            code,
            resource: None,
            request_id: None,
            source: None,
        }
    }

    /// Attach the resource (request path) the error refers to.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Attach the request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attach the underlying cause for logging.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Wrap an opaque error as `InternalError`, preserving its message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::InternalError, message)
    }
}

/// Create an [`S3Error`] from a taxonomy entry.
///
/// # Examples
///
/// ```
/// use silo_s3_model::s3_error;
/// use silo_s3_model::error::S3ErrorCode;
///
/// let err = s3_error!(NoSuchBucket);
/// assert_eq!(err.code, S3ErrorCode::NoSuchBucket);
///
/// let err = s3_error!(InvalidRequest, "copy source does not match bucket/object");
/// assert!(err.message.contains("copy source"));
/// ```
#[macro_export]
macro_rules! s3_error {
    ($code:ident) => {
        $crate::error::S3Error::new($crate::error::S3ErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::S3Error::with_message($crate::error::S3ErrorCode::$code, $msg)
    };
}
