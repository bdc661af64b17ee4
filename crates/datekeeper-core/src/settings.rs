//! Per-user notification settings.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{DateKeeperError, Result};
use crate::interval::ReminderInterval;
use crate::types::Channel;

/// Stored notification preferences for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub owner_id: String,
    /// Primary login email.
    pub email: Option<String>,
    /// Phone number in E.164 form, required for SMS.
    pub phone: Option<String>,
    /// Used instead of `email` when present.
    pub alternate_email: Option<String>,
    pub notify_email: bool,
    pub notify_sms: bool,
    pub enabled_intervals: BTreeSet<ReminderInterval>,
}

/// A channel the dispatcher must deliver to, with its resolved recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRequirement {
    pub channel: Channel,
    pub recipient: String,
}

impl NotificationSettings {
    /// Account-creation defaults: email on, SMS off, the four lead intervals.
    pub fn defaults_for(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            email: None,
            phone: None,
            alternate_email: None,
            notify_email: true,
            notify_sms: false,
            enabled_intervals: ReminderInterval::DEFAULTS.into_iter().collect(),
        }
    }

    pub fn is_enabled(&self, interval: ReminderInterval) -> bool {
        self.enabled_intervals.contains(&interval)
    }

    /// Address reminders are emailed to. The alternate address wins.
    pub fn email_recipient(&self) -> Option<&str> {
        self.alternate_email
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.email.as_deref().filter(|s| !s.trim().is_empty()))
    }

    pub fn sms_recipient(&self) -> Option<&str> {
        self.phone.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Channels every due interval must be delivered to. Each channel is
    /// evaluated on its own: enabled and addressable, or not required.
    pub fn required_channels(&self) -> Vec<ChannelRequirement> {
        let mut required = Vec::with_capacity(2);
        if self.notify_email {
            match self.email_recipient() {
                Some(to) => required.push(ChannelRequirement {
                    channel: Channel::Email,
                    recipient: to.to_string(),
                }),
                None => tracing::debug!("📭 {} has email enabled but no address", self.owner_id),
            }
        }
        if self.notify_sms {
            match self.sms_recipient() {
                Some(to) => required.push(ChannelRequirement {
                    channel: Channel::Sms,
                    recipient: to.to_string(),
                }),
                None => tracing::debug!("📵 {} has SMS enabled but no phone number", self.owner_id),
            }
        }
        required
    }

    /// Settings payload shape for the API (intervals as an id → bool map).
    pub fn to_json(&self) -> serde_json::Value {
        let intervals: BTreeMap<&str, bool> = ReminderInterval::ALL
            .iter()
            .map(|i| (i.id(), self.is_enabled(*i)))
            .collect();
        serde_json::json!({
            "owner_id": self.owner_id,
            "email": self.email,
            "phone": self.phone,
            "alternate_email": self.alternate_email,
            "notify_email": self.notify_email,
            "notify_sms": self.notify_sms,
            "reminder_intervals": intervals,
        })
    }
}

fn default_true() -> bool {
    true
}

fn default_intervals() -> BTreeMap<String, bool> {
    ReminderInterval::DEFAULTS
        .iter()
        .map(|i| (i.id().to_string(), true))
        .collect()
}

/// Settings as submitted by the user. Replaces the stored record wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub alternate_email: Option<String>,
    #[serde(default = "default_true")]
    pub notify_email: bool,
    #[serde(default)]
    pub notify_sms: bool,
    /// Interval id → enabled.
    #[serde(default = "default_intervals")]
    pub reminder_intervals: BTreeMap<String, bool>,
}

impl Default for SettingsUpdate {
    fn default() -> Self {
        Self {
            email: None,
            phone: None,
            alternate_email: None,
            notify_email: true,
            notify_sms: false,
            reminder_intervals: default_intervals(),
        }
    }
}

impl SettingsUpdate {
    /// Validate and build the replacement settings record.
    pub fn into_settings(self, owner_id: &str) -> Result<NotificationSettings> {
        let mut enabled_intervals = BTreeSet::new();
        for (id, enabled) in &self.reminder_intervals {
            let interval = ReminderInterval::from_id(id)?;
            if *enabled {
                enabled_intervals.insert(interval);
            }
        }

        let email = non_empty(self.email);
        let alternate_email = non_empty(self.alternate_email);
        for address in email.iter().chain(alternate_email.iter()) {
            validate_email(address)?;
        }
        let phone = non_empty(self.phone);
        if let Some(phone) = &phone {
            validate_phone(phone)?;
        }

        Ok(NotificationSettings {
            owner_id: owner_id.to_string(),
            email,
            phone,
            alternate_email,
            notify_email: self.notify_email,
            notify_sms: self.notify_sms,
            enabled_intervals,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn validate_email(address: &str) -> Result<()> {
    match address.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(DateKeeperError::Validation(format!("invalid email address '{address}'"))),
    }
}

fn validate_phone(phone: &str) -> Result<()> {
    let digits = phone.strip_prefix('+').unwrap_or("");
    if (8..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(DateKeeperError::Validation(format!(
            "phone number '{phone}' must be in E.164 form (+ and 8-15 digits)"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = NotificationSettings::defaults_for("u1");
        assert!(s.notify_email);
        assert!(!s.notify_sms);
        assert_eq!(s.enabled_intervals.len(), 4);
        assert!(!s.is_enabled(ReminderInterval::OnExpiry));
    }

    #[test]
    fn test_alternate_email_wins() {
        let mut s = NotificationSettings::defaults_for("u1");
        s.email = Some("primary@example.com".into());
        assert_eq!(s.email_recipient(), Some("primary@example.com"));
        s.alternate_email = Some("alt@example.com".into());
        assert_eq!(s.email_recipient(), Some("alt@example.com"));
    }

    #[test]
    fn test_required_channels() {
        let mut s = NotificationSettings::defaults_for("u1");
        // Email on but no address: nothing required.
        assert!(s.required_channels().is_empty());

        s.email = Some("a@example.com".into());
        s.notify_sms = true;
        // SMS on but no phone: email only.
        let req = s.required_channels();
        assert_eq!(req.len(), 1);
        assert_eq!(req[0].channel, Channel::Email);

        s.phone = Some("+14155550100".into());
        let channels: Vec<Channel> = s.required_channels().iter().map(|r| r.channel).collect();
        assert_eq!(channels, vec![Channel::Email, Channel::Sms]);

        s.notify_email = false;
        let channels: Vec<Channel> = s.required_channels().iter().map(|r| r.channel).collect();
        assert_eq!(channels, vec![Channel::Sms]);
    }

    #[test]
    fn test_update_rejects_unknown_interval() {
        let mut update = SettingsUpdate::default();
        update.reminder_intervals.insert("2_weeks".into(), true);
        assert!(update.into_settings("u1").unwrap_err().is_validation());
    }

    #[test]
    fn test_update_replaces_interval_set() {
        let update: SettingsUpdate = serde_json::from_value(serde_json::json!({
            "reminder_intervals": {"1_month": true, "7_days": false, "on_expiry": true}
        }))
        .unwrap();
        let s = update.into_settings("u1").unwrap();
        let enabled: Vec<ReminderInterval> = s.enabled_intervals.into_iter().collect();
        assert_eq!(enabled, vec![ReminderInterval::OneMonth, ReminderInterval::OnExpiry]);
        assert!(s.notify_email);
    }

    #[test]
    fn test_update_validates_contacts() {
        let bad_phone = SettingsUpdate {
            phone: Some("555-0100".into()),
            ..Default::default()
        };
        assert!(bad_phone.into_settings("u1").is_err());

        let bad_email = SettingsUpdate {
            alternate_email: Some("nobody".into()),
            ..Default::default()
        };
        assert!(bad_email.into_settings("u1").is_err());

        let blank = SettingsUpdate {
            alternate_email: Some("  ".into()),
            phone: Some("".into()),
            ..Default::default()
        };
        let s = blank.into_settings("u1").unwrap();
        assert!(s.alternate_email.is_none());
        assert!(s.phone.is_none());
    }
}
