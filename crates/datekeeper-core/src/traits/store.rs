//! Storage interfaces for documents and user settings.

use crate::error::Result;
use crate::settings::NotificationSettings;
use crate::types::Document;

/// Document persistence. Implementations only store; ledger invalidation on
/// date changes and deletes is handled by the caller.
pub trait DocumentStore: Send + Sync {
    /// All documents, or only those owned by `owner_id`.
    fn list_documents(&self, owner_id: Option<&str>) -> Result<Vec<Document>>;

    fn get_document(&self, id: &str) -> Result<Option<Document>>;

    fn insert_document(&self, document: &Document) -> Result<()>;

    /// Replace the stored record with the same id. Returns `false` if absent.
    fn update_document(&self, document: &Document) -> Result<bool>;

    /// Returns `false` if the document did not exist.
    fn delete_document(&self, id: &str) -> Result<bool>;
}

/// Per-user notification settings persistence.
pub trait SettingsStore: Send + Sync {
    /// Stored settings, or account-creation defaults when none exist.
    fn get_settings(&self, owner_id: &str) -> Result<NotificationSettings>;

    /// Replace the user's settings wholesale.
    fn put_settings(&self, settings: &NotificationSettings) -> Result<()>;
}
