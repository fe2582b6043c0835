//! Accrual Client
//!
//! Thin request helper for the external grading service. One operation:
//! fetch the grade for an order, returning the HTTP status code plus the
//! decoded body when the service answered 200.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccrualError {
    #[error("accrual request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Grade states reported by the accrual service. REGISTERED means the
/// order is known but not yet queued for grading on the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

/// Body of a 200 response.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderGrade {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub accrual: Option<Decimal>,
}

/// Status code plus body; non-200 replies carry no body.
#[derive(Debug, Clone)]
pub struct AccrualReply {
    pub status_code: StatusCode,
    pub grade: Option<OrderGrade>,
}

pub struct AccrualClient {
    base_url: String,
    http: Client,
}

impl AccrualClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, AccrualError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// `GET {base}/api/orders/{order_id}`. Network and timeout failures
    /// surface as errors; the pipeline treats them as transient.
    pub async fn order_grade(&self, order_id: &str) -> Result<AccrualReply, AccrualError> {
        let url = format!("{}/api/orders/{}", self.base_url, order_id);
        let response = self.http.get(&url).send().await?;
        let status_code = response.status();

        let grade = if status_code == StatusCode::OK {
            Some(response.json::<OrderGrade>().await?)
        } else {
            None
        };

        Ok(AccrualReply { status_code, grade })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn grade_with_accrual_deserializes() {
        let grade: OrderGrade = serde_json::from_str(
            r#"{"order":"12345678903","status":"PROCESSED","accrual":42.5}"#,
        )
        .unwrap();
        assert_eq!(grade.order, "12345678903");
        assert_eq!(grade.status, AccrualStatus::Processed);
        assert_eq!(grade.accrual, Some(dec!(42.5)));
    }

    #[test]
    fn grade_without_accrual_deserializes() {
        let grade: OrderGrade =
            serde_json::from_str(r#"{"order":"12345678903","status":"REGISTERED"}"#).unwrap();
        assert_eq!(grade.status, AccrualStatus::Registered);
        assert_eq!(grade.accrual, None);
    }

    #[test]
    fn all_statuses_parse() {
        for (text, status) in [
            ("REGISTERED", AccrualStatus::Registered),
            ("PROCESSING", AccrualStatus::Processing),
            ("INVALID", AccrualStatus::Invalid),
            ("PROCESSED", AccrualStatus::Processed),
        ] {
            let json = format!(r#"{{"order":"1","status":"{}"}}"#, text);
            let grade: OrderGrade = serde_json::from_str(&json).unwrap();
            assert_eq!(grade.status, status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        let result: Result<OrderGrade, _> =
            serde_json::from_str(r#"{"order":"1","status":"GRADED"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = AccrualClient::new("http://localhost:8080/", 5).unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }
}
