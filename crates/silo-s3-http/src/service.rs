//! The S3 HTTP service.
//!
//! Ties together routing, the auth middleware, coordinator dispatch, and
//! response shaping into one hyper-compatible [`Service`]:
//!
//! 1. Health and metrics endpoint interception
//! 2. Routing via [`Router`]
//! 3. Authentication; the resolved access box lands on the request frame
//! 4. Dispatch to the [`Gateway`] coordinators
//! 5. Error formatting and common response headers
//! 6. Per-handler request counters

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use http_body_util::{BodyExt, BodyStream, Full};
use hyper::service::Service;
use silo_s3_core::auth::{AuthCenter, AuthError, ReqInfo};
use silo_s3_core::gateway::Gateway;
use silo_s3_core::headers::QUERY_VERSION_ID;
use silo_s3_model::PayloadStream;
use silo_s3_model::error::S3Error;
use silo_s3_model::s3_error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::metrics;
use crate::response::{
    ResponseBody, copy_object_response, create_bucket_response, error_to_response,
    get_object_tagging_response, head_object_response, put_object_response,
    put_object_tagging_response,
};
use crate::router::{GatewayOperation, Router, RoutingContext};

/// The gateway's HTTP entry point.
#[derive(Clone)]
pub struct S3HttpService {
    gateway: Arc<Gateway>,
    auth: Arc<dyn AuthCenter>,
    router: Router,
}

impl S3HttpService {
    /// Create the service; the router picks up the configured domain.
    #[must_use]
    pub fn new(gateway: Gateway, auth: Arc<dyn AuthCenter>) -> Self {
        let router = Router::new(&gateway.config().domain);
        Self {
            gateway: Arc::new(gateway),
            auth,
            router,
        }
    }
}

impl<B> Service<http::Request<B>> for S3HttpService
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Response = http::Response<ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<B>) -> Self::Future {
        let gateway = Arc::clone(&self.gateway);
        let auth = Arc::clone(&self.auth);
        let router = self.router.clone();

        Box::pin(async move {
            let request_id = Uuid::new_v4().to_string();
            let response = process_request(req, &gateway, auth.as_ref(), &router, &request_id).await;
            Ok(add_common_headers(response, &request_id))
        })
    }
}

async fn process_request<B>(
    req: http::Request<B>,
    gateway: &Gateway,
    auth: &dyn AuthCenter,
    router: &Router,
    request_id: &str,
) -> http::Response<ResponseBody>
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    // Probe endpoints bypass routing, auth, and metrics.
    if req.method() == http::Method::GET {
        match req.uri().path() {
            "/health" => return health_response(),
            "/metrics" => return metrics_response(),
            _ => {}
        }
    }

    let resource = req.uri().path().to_owned();

    let ctx = match router.resolve(&req) {
        Ok(ctx) => ctx,
        Err(err) => {
            debug!(request_id, resource, error = %err, "failed to route request");
            metrics::observe_request("unknown", err.status_code);
            return error_to_response(&err, request_id, &resource);
        }
    };

    info!(
        request_id,
        handler = %ctx.operation,
        bucket_name = %ctx.bucket,
        object_name = %ctx.key,
        "processing request"
    );

    let (parts, body) = req.into_parts();

    let access_box = match auth.authenticate(&parts).await {
        Ok(boxed) => Some(Arc::new(boxed)),
        Err(AuthError::NoAuthorizationHeader) => {
            debug!(request_id, "no authorization header, falling back to the node key");
            None
        }
        Err(err) => {
            error!(request_id, error = %err, "failed to pass authentication");
            let err = s3_error!(AccessDenied);
            metrics::observe_request(ctx.operation.as_str(), err.status_code);
            return error_to_response(&err, request_id, &resource);
        }
    };

    let req_info = ReqInfo {
        request_id: request_id.to_owned(),
        bucket_name: ctx.bucket.clone(),
        object_name: ctx.key.clone(),
        access_box,
    };

    let response = match dispatch(gateway, &req_info, parts, body, &ctx).await {
        Ok(response) => response,
        Err(err) => {
            error!(
                request_id,
                bucket_name = %req_info.bucket_name,
                object_name = %req_info.object_name,
                error = %err,
                "request failed"
            );
            error_to_response(&err, request_id, &resource)
        }
    };

    metrics::observe_request(ctx.operation.as_str(), response.status());
    response
}

async fn dispatch<B>(
    gateway: &Gateway,
    req_info: &ReqInfo,
    parts: http::request::Parts,
    body: B,
    ctx: &RoutingContext,
) -> Result<http::Response<ResponseBody>, S3Error>
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let version_id = ctx.query(QUERY_VERSION_ID).unwrap_or_default().to_owned();

    match ctx.operation {
        GatewayOperation::PutObject => {
            let size = declared_content_length(&parts);
            let payload = payload_stream(body);
            let output = gateway
                .handle_put_object(req_info, &parts.headers, payload, size)
                .await?;
            Ok(put_object_response(&output))
        }
        GatewayOperation::CopyObject => {
            let output = gateway.handle_copy_object(req_info, &parts.headers).await?;
            copy_object_response(&output)
        }
        GatewayOperation::CreateBucket => {
            let bytes = collect_body(body).await?;
            let output = gateway
                .handle_create_bucket(req_info, &parts.headers, bytes)
                .await?;
            Ok(create_bucket_response(&output))
        }
        GatewayOperation::HeadObject => {
            let output = gateway
                .handle_head_object(req_info, &parts.headers, &version_id)
                .await?;
            Ok(head_object_response(&output))
        }
        GatewayOperation::GetObjectTagging => {
            let output = gateway
                .handle_get_object_tagging(req_info, &parts.headers, &version_id)
                .await?;
            get_object_tagging_response(&output)
        }
        GatewayOperation::PutObjectTagging => {
            let bytes = collect_body(body).await?;
            let output = gateway
                .handle_put_object_tagging(req_info, &parts.headers, &version_id, bytes)
                .await?;
            Ok(put_object_tagging_response(&output))
        }
    }
}

/// Wrap a request body as a once-consumable payload stream.
///
/// Frames stream through untouched; trailers are dropped. The coordinator
/// hands the stream to the object layer without buffering.
fn payload_stream<B>(body: B) -> PayloadStream
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let stream = BodyStream::new(body).filter_map(|result| {
        futures::future::ready(match result {
            Ok(frame) => frame.into_data().ok().map(Ok),
            Err(err) => Some(Err(io::Error::other(err.into()))),
        })
    });
    PayloadStream::new(stream)
}

/// Collect a small (XML) request body.
async fn collect_body<B>(body: B) -> Result<Bytes, S3Error>
where
    B: hyper::body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match body.collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) => Err(S3Error::internal(format!(
            "failed to read request body: {}",
            err.into()
        ))),
    }
}

/// The declared `Content-Length`, `-1` when absent or unparsable.
fn declared_content_length(parts: &http::request::Parts) -> i64 {
    parts
        .headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(-1)
}

fn health_response() -> http::Response<ResponseBody> {
    let (status, body) = if metrics::is_healthy() {
        (http::StatusCode::OK, r#"{"status":"healthy"}"#)
    } else {
        (
            http::StatusCode::SERVICE_UNAVAILABLE,
            r#"{"status":"unavailable"}"#,
        )
    };

    http::Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .expect("static health response is valid")
}

fn metrics_response() -> http::Response<ResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Full::new(Bytes::from(metrics::gather())))
        .expect("metrics response is valid")
}

fn add_common_headers(
    mut response: http::Response<ResponseBody>,
    request_id: &str,
) -> http::Response<ResponseBody> {
    let headers = response.headers_mut();
    if let Ok(value) = http::HeaderValue::from_str(request_id) {
        headers.insert("x-amz-request-id", value);
    }
    headers.insert("Server", http::HeaderValue::from_static("SiloS3GW"));
    response
}
