//! Orders, withdrawals, and the grading task exchanged with the pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order lifecycle. `Processed` and `Invalid` are terminal: once reached,
/// the row never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Processing,
    Invalid,
    Processed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Processed | OrderStatus::Invalid)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Invalid => "INVALID",
            OrderStatus::Processed => "PROCESSED",
        };
        f.write_str(s)
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(OrderStatus::New),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "INVALID" => Ok(OrderStatus::Invalid),
            "PROCESSED" => Ok(OrderStatus::Processed),
            _ => Err(format!("unknown order status: {}", s)),
        }
    }
}

/// One order row as returned to its owner. `accrual` is present only once
/// the grading pipeline has credited points.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRecord {
    pub number: String,
    pub status: OrderStatus,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub accrual: Option<Decimal>,
    pub uploaded_at: DateTime<Utc>,
}

/// One completed withdrawal as returned to its owner.
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalRecord {
    pub order: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
    pub processed_at: DateTime<Utc>,
}

/// Withdrawal request body.
#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
}

/// In-memory work item: "poll the grading service for this order". Lives
/// only on the task channel; order rows themselves are durable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingTask {
    pub user_id: i64,
    pub order_id: String,
}
