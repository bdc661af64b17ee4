//! The fixed catalogue of reminder lead intervals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DateKeeperError, Result};

/// A named lead time before expiry at which a reminder fires.
///
/// Variants are declared in descending lead-time order, so the derived `Ord`
/// sorts the longest lead first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReminderInterval {
    #[serde(rename = "6_months")]
    SixMonths,
    #[serde(rename = "3_months")]
    ThreeMonths,
    #[serde(rename = "1_month")]
    OneMonth,
    #[serde(rename = "7_days")]
    SevenDays,
    /// Final notice on the expiry day itself. Opt-in.
    #[serde(rename = "on_expiry")]
    OnExpiry,
}

impl ReminderInterval {
    /// Every interval in the catalogue, longest lead first.
    pub const ALL: [ReminderInterval; 5] = [
        ReminderInterval::SixMonths,
        ReminderInterval::ThreeMonths,
        ReminderInterval::OneMonth,
        ReminderInterval::SevenDays,
        ReminderInterval::OnExpiry,
    ];

    /// Intervals enabled for a freshly created account.
    pub const DEFAULTS: [ReminderInterval; 4] = [
        ReminderInterval::SixMonths,
        ReminderInterval::ThreeMonths,
        ReminderInterval::OneMonth,
        ReminderInterval::SevenDays,
    ];

    /// Stable identifier used in settings payloads and the ledger.
    pub fn id(&self) -> &'static str {
        match self {
            Self::SixMonths => "6_months",
            Self::ThreeMonths => "3_months",
            Self::OneMonth => "1_month",
            Self::SevenDays => "7_days",
            Self::OnExpiry => "on_expiry",
        }
    }

    /// Lead time in days.
    pub fn days(&self) -> i64 {
        match self {
            Self::SixMonths => 180,
            Self::ThreeMonths => 90,
            Self::OneMonth => 30,
            Self::SevenDays => 7,
            Self::OnExpiry => 0,
        }
    }

    /// Human-readable label for notifications.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SixMonths => "6 months",
            Self::ThreeMonths => "3 months",
            Self::OneMonth => "1 month",
            Self::SevenDays => "7 days",
            Self::OnExpiry => "day of expiry",
        }
    }

    /// Look up a catalogue entry by id. Unknown ids are a validation error.
    pub fn from_id(id: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|i| i.id() == id.trim())
            .ok_or_else(|| DateKeeperError::Validation(format!("unknown reminder interval '{id}'")))
    }
}

impl fmt::Display for ReminderInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ReminderInterval {
    type Err = DateKeeperError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_id(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_ids_roundtrip() {
        for interval in ReminderInterval::ALL {
            assert_eq!(ReminderInterval::from_id(interval.id()).unwrap(), interval);
        }
    }

    #[test]
    fn test_unknown_id_rejected() {
        let err = ReminderInterval::from_id("2_weeks").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_ordering_is_longest_lead_first() {
        let mut shuffled = vec![
            ReminderInterval::SevenDays,
            ReminderInterval::OnExpiry,
            ReminderInterval::SixMonths,
            ReminderInterval::OneMonth,
        ];
        shuffled.sort();
        let days: Vec<i64> = shuffled.iter().map(|i| i.days()).collect();
        assert_eq!(days, vec![180, 30, 7, 0]);
    }

    #[test]
    fn test_serde_uses_ids() {
        let json = serde_json::to_string(&ReminderInterval::OneMonth).unwrap();
        assert_eq!(json, "\"1_month\"");
        let back: ReminderInterval = serde_json::from_str("\"7_days\"").unwrap();
        assert_eq!(back, ReminderInterval::SevenDays);
    }
}
