//! Document model and the boundary types used to create and edit documents.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{DateKeeperError, Result};

/// Document category. Unknown categories collapse into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Passport,
    DrivingLicense,
    NationalId,
    VehicleInsurance,
    PollutionCertificate,
    HealthInsurance,
    Visa,
    #[serde(other)]
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passport => "passport",
            Self::DrivingLicense => "driving_license",
            Self::NationalId => "national_id",
            Self::VehicleInsurance => "vehicle_insurance",
            Self::PollutionCertificate => "pollution_certificate",
            Self::HealthInsurance => "health_insurance",
            Self::Visa => "visa",
            Self::Other => "other",
        }
    }

    /// Title-cased name for notification bodies ("Driving License").
    pub fn label(&self) -> &'static str {
        match self {
            Self::Passport => "Passport",
            Self::DrivingLicense => "Driving License",
            Self::NationalId => "National ID",
            Self::VehicleInsurance => "Vehicle Insurance",
            Self::PollutionCertificate => "Pollution Certificate",
            Self::HealthInsurance => "Health Insurance",
            Self::Visa => "Visa",
            Self::Other => "Document",
        }
    }

    /// Parse a category string. Never fails: anything unrecognised is `Other`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "passport" => Self::Passport,
            "driving_license" | "drivers_license" | "driver_license" => Self::DrivingLicense,
            "national_id" => Self::NationalId,
            "vehicle_insurance" => Self::VehicleInsurance,
            "pollution_certificate" => Self::PollutionCertificate,
            "health_insurance" => Self::HealthInsurance,
            "visa" => Self::Visa,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked document. Only the expiry date matters to the scheduler;
/// the image it may have been scanned from is never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub doc_type: DocumentType,
    pub expiry_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Create a document with a fresh, never-reused id.
    pub fn new(owner_id: &str, name: &str, doc_type: DocumentType, expiry_date: NaiveDate) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            doc_type,
            expiry_date,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Signed whole days from `today` to `expiry_date`. Negative once expired.
pub fn days_left(expiry_date: NaiveDate, today: NaiveDate) -> i64 {
    (expiry_date - today).num_days()
}

/// Notification medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Email, Channel::Sms];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "email" => Some(Self::Email),
            "sms" => Some(Self::Sms),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the external OCR collaborator, consumed verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrSuggestion {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Input for creating a document. A manual `expiry_date` overrides the OCR one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentDraft {
    pub name: String,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(default)]
    pub ocr: Option<OcrSuggestion>,
}

impl DocumentDraft {
    /// Validate the draft and resolve the final type and expiry date.
    pub fn resolve(&self) -> Result<(String, DocumentType, NaiveDate)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DateKeeperError::Validation("document name is required".into()));
        }

        let ocr = self.ocr.as_ref().filter(|o| o.success);

        let expiry_date = match (self.expiry_date.as_deref(), ocr.and_then(|o| o.expiry_date.as_deref())) {
            (Some(manual), _) => parse_date(manual)?,
            (None, Some(scanned)) => {
                tracing::debug!(
                    "🔎 Using OCR expiry date {scanned} (confidence {:?})",
                    ocr.and_then(|o| o.confidence)
                );
                parse_date(scanned)?
            }
            (None, None) => {
                return Err(DateKeeperError::Validation(
                    "expiry_date is required when no OCR suggestion is available".into(),
                ));
            }
        };

        let doc_type = self
            .document_type
            .as_deref()
            .or_else(|| ocr.and_then(|o| o.document_type.as_deref()))
            .map(DocumentType::parse)
            .unwrap_or(DocumentType::Other);

        Ok((name.to_string(), doc_type, expiry_date))
    }
}

/// Partial edit of a document. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
}

/// Parse a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| DateKeeperError::Validation(format!("malformed date '{s}': {e}")))
}
