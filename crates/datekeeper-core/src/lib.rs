//! # DateKeeper Core
//!
//! Shared types, traits, configuration and errors for the DateKeeper
//! reminder engine. No I/O beyond reading and writing the config file.

pub mod config;
pub mod error;
pub mod interval;
pub mod notification;
pub mod settings;
pub mod traits;
pub mod types;

pub use config::DateKeeperConfig;
pub use error::{DateKeeperError, Result};
pub use interval::ReminderInterval;
pub use notification::{ReminderPayload, Urgency};
pub use settings::{ChannelRequirement, NotificationSettings, SettingsUpdate};
pub use traits::{DocumentStore, NotificationSender, SettingsStore};
pub use types::{Channel, Document, DocumentDraft, DocumentPatch, DocumentType, OcrSuggestion};
