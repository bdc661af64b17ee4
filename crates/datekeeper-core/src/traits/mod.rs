//! Seams to the collaborators the engine does not own.

pub mod sender;
pub mod store;

pub use sender::NotificationSender;
pub use store::{DocumentStore, SettingsStore};
