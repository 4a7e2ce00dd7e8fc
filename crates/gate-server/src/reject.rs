//! Admission rejections and their HTTP rendering.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gate_auth::IdentityError;
use gate_core::{ERROR_CREDENTIAL, ERROR_QUOTA, ERROR_RATE_LIMIT, ERROR_STORE};
use serde_json::{Value, json};

use crate::rate_limit::{RateAxis, RateLimitRejection};

/// Why a request was not admitted.
///
/// Every variant is terminal for the request.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// The store is not configured or could not be read.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The credential header is absent or empty.
    #[error("missing credential, sign in before using the API")]
    MissingCredential,

    #[error("credential rejected: {0}")]
    Identity(#[from] IdentityError),

    #[error("monthly quota for channel \"{channel_name}\" is used up ({used}/{total})")]
    QuotaExceeded {
        channel_id: Option<i64>,
        channel_name: String,
        used: u64,
        total: u64,
    },

    #[error(transparent)]
    RateLimited(#[from] RateLimitRejection),
}

impl AdmissionError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::MissingCredential | Self::Identity(_) => StatusCode::UNAUTHORIZED,
            Self::QuotaExceeded { .. } | Self::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Rejection class, one of `service_unavailable`, `unauthenticated`,
    /// `quota_exceeded`, `rate_limited`.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::MissingCredential | Self::Identity(_) => "unauthenticated",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::RateLimited(_) => "rate_limited",
        }
    }

    /// Specific reason within the class.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable(_) => "store_unavailable",
            Self::MissingCredential => "missing_credential",
            Self::Identity(e) => e.code(),
            Self::QuotaExceeded { .. } => "monthly_quota_exhausted",
            Self::RateLimited(r) => match r.axis {
                RateAxis::Minute => "rpm_limit_reached",
                RateAxis::Day => "rpd_limit_reached",
            },
        }
    }

    /// Metric label.
    pub const fn metric_reason(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable(_) => ERROR_STORE,
            Self::MissingCredential | Self::Identity(_) => ERROR_CREDENTIAL,
            Self::QuotaExceeded { .. } => ERROR_QUOTA,
            Self::RateLimited(_) => ERROR_RATE_LIMIT,
        }
    }

    /// JSON body: `{"error": {"message", "type", "code", ...details}}`.
    pub fn body(&self) -> Value {
        let mut error = json!({
            "message": self.to_string(),
            "type": self.kind(),
            "code": self.code(),
        });
        let details = match self {
            Self::QuotaExceeded {
                channel_id,
                channel_name,
                used,
                total,
            } => json!({
                "channel_id": channel_id,
                "channel_name": channel_name,
                "used": used,
                "total": total,
            }),
            Self::RateLimited(r) => json!({
                "channel_id": r.channel_id,
                "key_slot": r.key_slot,
                "axis": r.axis.as_str(),
                "count": r.count,
                "limit": r.limit,
            }),
            _ => Value::Null,
        };
        if let (Some(error), Value::Object(details)) = (error.as_object_mut(), details) {
            error.extend(details);
        }
        json!({ "error": error })
    }
}

impl IntoResponse for AdmissionError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AdmissionError::ServiceUnavailable("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AdmissionError::MissingCredential.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AdmissionError::Identity(IdentityError::ExpiredCredential).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AdmissionError::QuotaExceeded {
                channel_id: None,
                channel_name: String::new(),
                used: 1,
                total: 1,
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_quota_body_carries_counts() {
        let body = AdmissionError::QuotaExceeded {
            channel_id: Some(3),
            channel_name: "gpt".into(),
            used: 30,
            total: 30,
        }
        .body();
        assert_eq!(body["error"]["type"], "quota_exceeded");
        assert_eq!(body["error"]["used"], 30);
        assert_eq!(body["error"]["total"], 30);
        assert_eq!(body["error"]["channel_name"], "gpt");
        assert_eq!(body["error"]["channel_id"], 3);
    }

    #[test]
    fn test_identity_body_distinguishes_reason() {
        let body = AdmissionError::from(IdentityError::ExpiredCredential).body();
        assert_eq!(body["error"]["type"], "unauthenticated");
        assert_eq!(body["error"]["code"], "expired_credential");
        assert!(body["error"].get("used").is_none());
    }

    #[test]
    fn test_rate_limited_body() {
        let err = AdmissionError::from(RateLimitRejection {
            channel_id: 5,
            key_slot: 2,
            axis: RateAxis::Day,
            count: 100,
            limit: 100,
        });
        assert_eq!(err.code(), "rpd_limit_reached");
        let body = err.body();
        assert_eq!(body["error"]["axis"], "per-day");
        assert_eq!(body["error"]["key_slot"], 2);
    }
}
