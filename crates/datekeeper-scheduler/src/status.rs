//! Expiry status classification — pure, no I/O.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time-to-expiry bucket, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Expired,
    ExpiringSoon,
    ExpiringThisMonth,
    Valid,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::ExpiringSoon => "expiring_soon",
            Self::ExpiringThisMonth => "expiring_this_month",
            Self::Valid => "valid",
        }
    }

    /// Bucket for a signed day count. The four ranges partition all integers.
    pub fn from_days_left(days_left: i64) -> Self {
        match days_left {
            d if d < 0 => Self::Expired,
            0..=7 => Self::ExpiringSoon,
            8..=30 => Self::ExpiringThisMonth,
            _ => Self::Valid,
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub use datekeeper_core::types::days_left;

/// Classify an expiry date relative to `today`.
pub fn classify(expiry_date: NaiveDate, today: NaiveDate) -> DocumentStatus {
    DocumentStatus::from_days_left(days_left(expiry_date, today))
}
