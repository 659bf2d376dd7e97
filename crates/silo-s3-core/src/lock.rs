//! Object-lock derivation.
//!
//! On write, a bucket's lock configuration and the per-request lock
//! headers merge into a single [`ObjectLock`] that the object layer stores
//! alongside the payload.

use chrono::{DateTime, Duration, Utc};
use http::HeaderMap;
use silo_s3_model::error::S3Error;
use silo_s3_model::s3_error;
use silo_s3_model::types::{LockConfiguration, LockMode, ObjectLock, Retention};

use crate::headers::header_str;

/// `x-amz-object-lock-mode`.
pub const AMZ_OBJECT_LOCK_MODE: &str = "x-amz-object-lock-mode";
/// `x-amz-object-lock-retain-until-date`.
pub const AMZ_OBJECT_LOCK_RETAIN_UNTIL_DATE: &str = "x-amz-object-lock-retain-until-date";
/// `x-amz-object-lock-legal-hold`.
pub const AMZ_OBJECT_LOCK_LEGAL_HOLD: &str = "x-amz-object-lock-legal-hold";

const LEGAL_HOLD_ON: &str = "ON";
const LEGAL_HOLD_OFF: &str = "OFF";

/// Derive the lock to apply to a new object.
///
/// Returns `None` when the bucket has no lock support and the request
/// carries no lock headers. When the bucket is lock-enabled, the
/// configuration's default retention applies unless overridden by
/// headers.
///
/// # Errors
///
/// Returns `BadRequest` when lock headers are sent to a bucket without
/// lock support, or when a header value is malformed.
pub fn form_object_lock(
    lock_configuration: Option<&LockConfiguration>,
    headers: &HeaderMap,
) -> Result<Option<ObjectLock>, S3Error> {
    let enabled = lock_configuration.is_some_and(|c| c.object_lock_enabled);
    if !enabled {
        if contains_lock_headers(headers) {
            return Err(s3_error!(
                BadRequest,
                "object lock is not enabled on this bucket"
            ));
        }
        return Ok(None);
    }

    let mut lock = ObjectLock::default();

    if let Some(default_retention) = lock_configuration.and_then(|c| c.default_retention.as_ref()) {
        lock.retention = Some(Retention {
            mode: default_retention.mode,
            until: default_retention_until(
                Utc::now(),
                default_retention.days,
                default_retention.years,
            ),
        });
    }

    let mode = header_str(headers, AMZ_OBJECT_LOCK_MODE);
    let until = header_str(headers, AMZ_OBJECT_LOCK_RETAIN_UNTIL_DATE);
    match (mode, until) {
        (Some(mode), Some(until)) => {
            let mode: LockMode = mode
                .parse()
                .map_err(|()| s3_error!(BadRequest, format!("invalid lock mode: {mode}")))?;
            let until = DateTime::parse_from_rfc3339(until)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| s3_error!(BadRequest, format!("invalid retention date: {until}")))?;
            lock.retention = Some(Retention { mode, until });
        }
        (None, None) => {}
        _ => {
            return Err(s3_error!(
                BadRequest,
                "lock mode and retention date must be provided together"
            ));
        }
    }

    if let Some(hold) = header_str(headers, AMZ_OBJECT_LOCK_LEGAL_HOLD) {
        lock.legal_hold = match hold {
            LEGAL_HOLD_ON => true,
            LEGAL_HOLD_OFF => false,
            other => {
                return Err(s3_error!(
                    BadRequest,
                    format!("invalid legal hold status: {other}")
                ));
            }
        };
    }

    Ok(Some(lock))
}

fn contains_lock_headers(headers: &HeaderMap) -> bool {
    [
        AMZ_OBJECT_LOCK_MODE,
        AMZ_OBJECT_LOCK_RETAIN_UNTIL_DATE,
        AMZ_OBJECT_LOCK_LEGAL_HOLD,
    ]
    .iter()
    .any(|name| headers.contains_key(*name))
}

fn default_retention_until(
    from: DateTime<Utc>,
    days: Option<u64>,
    years: Option<u64>,
) -> DateTime<Utc> {
    let mut total_days: i64 = 0;
    if let Some(days) = days {
        total_days += days as i64;
    }
    if let Some(years) = years {
        total_days += years as i64 * 365;
    }
    from + Duration::days(total_days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use silo_s3_model::error::S3ErrorCode;
    use silo_s3_model::types::DefaultRetention;

    fn lock_config(default_retention: Option<DefaultRetention>) -> LockConfiguration {
        LockConfiguration {
            object_lock_enabled: true,
            default_retention,
        }
    }

    #[test]
    fn test_should_return_none_without_lock_support() {
        let lock = form_object_lock(None, &HeaderMap::new()).expect("valid");
        assert!(lock.is_none());
    }

    #[test]
    fn test_should_reject_lock_headers_on_plain_bucket() {
        let mut headers = HeaderMap::new();
        headers.insert(AMZ_OBJECT_LOCK_LEGAL_HOLD, HeaderValue::from_static("ON"));

        let err = form_object_lock(None, &headers).expect_err("no lock support");
        assert_eq!(err.code, S3ErrorCode::BadRequest);
    }

    #[test]
    fn test_should_apply_default_retention() {
        let config = lock_config(Some(DefaultRetention {
            mode: LockMode::Governance,
            days: Some(30),
            years: None,
        }));

        let lock = form_object_lock(Some(&config), &HeaderMap::new())
            .expect("valid")
            .expect("lock present");
        let retention = lock.retention.expect("retention");
        assert_eq!(retention.mode, LockMode::Governance);
        assert!(retention.until > Utc::now() + Duration::days(29));
        assert!(!lock.legal_hold);
    }

    #[test]
    fn test_should_override_default_with_headers() {
        let config = lock_config(Some(DefaultRetention {
            mode: LockMode::Governance,
            days: Some(30),
            years: None,
        }));

        let mut headers = HeaderMap::new();
        headers.insert(AMZ_OBJECT_LOCK_MODE, HeaderValue::from_static("COMPLIANCE"));
        headers.insert(
            AMZ_OBJECT_LOCK_RETAIN_UNTIL_DATE,
            HeaderValue::from_static("2030-01-01T00:00:00Z"),
        );
        headers.insert(AMZ_OBJECT_LOCK_LEGAL_HOLD, HeaderValue::from_static("ON"));

        let lock = form_object_lock(Some(&config), &headers)
            .expect("valid")
            .expect("lock present");
        let retention = lock.retention.expect("retention");
        assert_eq!(retention.mode, LockMode::Compliance);
        assert_eq!(retention.until.to_rfc3339(), "2030-01-01T00:00:00+00:00");
        assert!(lock.legal_hold);
    }

    #[test]
    fn test_should_reject_mode_without_date() {
        let config = lock_config(None);
        let mut headers = HeaderMap::new();
        headers.insert(AMZ_OBJECT_LOCK_MODE, HeaderValue::from_static("GOVERNANCE"));

        let err = form_object_lock(Some(&config), &headers).expect_err("incomplete");
        assert!(err.message.contains("together"));
    }

    #[test]
    fn test_should_reject_bad_mode_and_date() {
        let config = lock_config(None);

        let mut headers = HeaderMap::new();
        headers.insert(AMZ_OBJECT_LOCK_MODE, HeaderValue::from_static("FOREVER"));
        headers.insert(
            AMZ_OBJECT_LOCK_RETAIN_UNTIL_DATE,
            HeaderValue::from_static("2030-01-01T00:00:00Z"),
        );
        assert!(form_object_lock(Some(&config), &headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert(AMZ_OBJECT_LOCK_MODE, HeaderValue::from_static("GOVERNANCE"));
        headers.insert(
            AMZ_OBJECT_LOCK_RETAIN_UNTIL_DATE,
            HeaderValue::from_static("tomorrow"),
        );
        assert!(form_object_lock(Some(&config), &headers).is_err());
    }

    #[test]
    fn test_should_compute_retention_from_years() {
        let from = Utc::now();
        let until = default_retention_until(from, Some(5), Some(1));
        assert_eq!(until, from + Duration::days(370));
    }
}
