//! Reminder payload and its per-channel renderings.
//! Urgency tiers: ≤7 days urgent, ≤30 important, ≤90 reminder, else advance notice.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::interval::ReminderInterval;
use crate::types::{Document, DocumentType, days_left};

/// Everything a channel needs to tell the user about one expiring document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderPayload {
    pub document_id: String,
    pub document_name: String,
    pub document_type: DocumentType,
    pub expiry_date: NaiveDate,
    pub days_remaining: i64,
    pub interval: ReminderInterval,
}

/// How loudly a reminder should speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Urgent,
    Important,
    Reminder,
    AdvanceNotice,
}

impl Urgency {
    pub fn for_days(days_remaining: i64) -> Self {
        match days_remaining {
            d if d <= 7 => Self::Urgent,
            d if d <= 30 => Self::Important,
            d if d <= 90 => Self::Reminder,
            _ => Self::AdvanceNotice,
        }
    }

    fn emoji(&self) -> &'static str {
        match self {
            Self::Urgent => "🚨",
            Self::Important => "⚠️",
            Self::Reminder => "⏰",
            Self::AdvanceNotice => "📅",
        }
    }

    fn color(&self) -> &'static str {
        match self {
            Self::Urgent => "#ef4444",
            Self::Important => "#f59e0b",
            Self::Reminder => "#eab308",
            Self::AdvanceNotice => "#10b981",
        }
    }
}

impl ReminderPayload {
    pub fn new(document: &Document, interval: ReminderInterval, today: NaiveDate) -> Self {
        Self {
            document_id: document.id.clone(),
            document_name: document.name.clone(),
            document_type: document.doc_type,
            expiry_date: document.expiry_date,
            days_remaining: days_left(document.expiry_date, today),
            interval,
        }
    }

    pub fn urgency(&self) -> Urgency {
        Urgency::for_days(self.days_remaining)
    }

    fn remaining_phrase(&self) -> String {
        match self.days_remaining {
            0 => "today".to_string(),
            1 => "in 1 day".to_string(),
            d => format!("in {d} days"),
        }
    }

    pub fn email_subject(&self) -> String {
        let urgency = self.urgency();
        let prefix = match urgency {
            Urgency::Urgent => "URGENT",
            _ => "Reminder",
        };
        format!(
            "{} {prefix}: {} expires {}",
            urgency.emoji(),
            self.document_name,
            self.remaining_phrase()
        )
    }

    fn headline(&self) -> String {
        let urgency = self.urgency();
        let lead = match urgency {
            Urgency::Urgent => "URGENT",
            Urgency::Important => "Important",
            Urgency::Reminder => "Reminder",
            Urgency::AdvanceNotice => "Advance Notice",
        };
        format!(
            "{} {lead}: Your document expires {}",
            urgency.emoji(),
            self.remaining_phrase()
        )
    }

    pub fn email_text(&self) -> String {
        format!(
            "Hello,\n\n{headline}\n\nDocument Details:\n- Name: {name}\n- Type: {kind}\n- Expiry Date: {expiry}\n- Days Remaining: {days}\n- Reminder: {label} before expiry\n\nPlease renew your {kind_lower} before it expires.\n\n--\nThis is an automated reminder from DateKeeper.\nWe only store expiry dates, never document images.\n",
            headline = self.headline(),
            name = self.document_name,
            kind = self.document_type.label(),
            expiry = self.expiry_date,
            days = self.days_remaining,
            label = self.interval.label(),
            kind_lower = self.document_type.label().to_lowercase(),
        )
    }

    pub fn email_html(&self) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #333;">
  <h1>DateKeeper</h1>
  <p style="background: {color}; color: white; padding: 15px; font-weight: bold;">{headline}</p>
  <table>
    <tr><td><b>Document Name:</b></td><td>{name}</td></tr>
    <tr><td><b>Document Type:</b></td><td>{kind}</td></tr>
    <tr><td><b>Expiry Date:</b></td><td>{expiry}</td></tr>
    <tr><td><b>Days Remaining:</b></td><td>{days} days</td></tr>
  </table>
  <p>Please renew your {kind_lower} before it expires.</p>
  <p style="color: #999; font-size: 12px;">We only store expiry dates, never document images.</p>
</body>
</html>
"#,
            color = self.urgency().color(),
            headline = escape_html(&self.headline()),
            name = escape_html(&self.document_name),
            kind = self.document_type.label(),
            expiry = self.expiry_date,
            days = self.days_remaining,
            kind_lower = self.document_type.label().to_lowercase(),
        )
    }

    /// Single-line SMS body.
    pub fn sms_text(&self) -> String {
        let emoji = if self.days_remaining <= 7 { "🚨" } else { "⏰" };
        format!(
            "{emoji} DateKeeper: Your {} '{}' expires on {} ({} days). Please renew soon!",
            self.document_type.label().to_lowercase(),
            self.document_name,
            self.expiry_date,
            self.days_remaining
        )
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
