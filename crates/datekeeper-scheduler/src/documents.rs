//! Document lifecycle hooks.
//!
//! Every create, edit and delete goes through [`DocumentService`] so the
//! reminder ledger stays consistent: changing a document's expiry date or
//! deleting it clears its ledger entries, which lets the reminders for the
//! new date fire.

use chrono::{NaiveDate, Utc};
use datekeeper_core::{
    DateKeeperError, Document, DocumentDraft, DocumentPatch, DocumentStore, DocumentType, Result,
    types::parse_date,
};
use serde::Serialize;
use std::sync::Arc;

use crate::ledger::{LedgerEntry, ReminderLedger};
use crate::status::{DocumentStatus, classify, days_left};

/// A document with its status as of some day.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    #[serde(flatten)]
    pub document: Document,
    pub status: DocumentStatus,
    pub days_left: i64,
}

impl DocumentView {
    pub fn new(document: Document, today: NaiveDate) -> Self {
        Self {
            status: classify(document.expiry_date, today),
            days_left: days_left(document.expiry_date, today),
            document,
        }
    }
}

#[derive(Clone)]
pub struct DocumentService {
    documents: Arc<dyn DocumentStore>,
    ledger: Arc<dyn ReminderLedger>,
}

impl DocumentService {
    pub fn new(documents: Arc<dyn DocumentStore>, ledger: Arc<dyn ReminderLedger>) -> Self {
        Self { documents, ledger }
    }

    pub fn create(&self, owner_id: &str, draft: &DocumentDraft) -> Result<Document> {
        let (name, doc_type, expiry_date) = draft.resolve()?;
        let document = Document::new(owner_id, &name, doc_type, expiry_date);
        self.documents.insert_document(&document)?;
        tracing::info!("📄 Document added: '{}' expires {}", document.name, document.expiry_date);
        Ok(document)
    }

    /// Fetch a document owned by `owner_id`. Other users' documents are
    /// reported as missing.
    pub fn get(&self, owner_id: &str, id: &str) -> Result<Document> {
        self.documents
            .get_document(id)?
            .filter(|d| d.owner_id == owner_id)
            .ok_or_else(|| DateKeeperError::NotFound(format!("document {id}")))
    }

    /// The owner's documents, soonest expiry first.
    pub fn list(&self, owner_id: &str) -> Result<Vec<Document>> {
        self.documents.list_documents(Some(owner_id))
    }

    pub fn update(&self, owner_id: &str, id: &str, patch: &DocumentPatch) -> Result<Document> {
        let mut document = self.get(owner_id, id)?;
        let previous_expiry = document.expiry_date;

        if let Some(name) = &patch.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(DateKeeperError::Validation("document name cannot be empty".into()));
            }
            document.name = name.to_string();
        }
        if let Some(doc_type) = &patch.document_type {
            document.doc_type = DocumentType::parse(doc_type);
        }
        if let Some(expiry) = &patch.expiry_date {
            document.expiry_date = parse_date(expiry)?;
        }
        document.updated_at = Utc::now();

        if document.expiry_date == previous_expiry {
            if !self.documents.update_document(&document)? {
                return Err(DateKeeperError::NotFound(format!("document {id}")));
            }
        } else {
            let cleared = self
                .ledger
                .reschedule(&document)?
                .ok_or_else(|| DateKeeperError::NotFound(format!("document {id}")))?;
            tracing::info!(
                "📅 '{}' expiry moved {} → {}, {} reminder record(s) cleared",
                document.name,
                previous_expiry,
                document.expiry_date,
                cleared
            );
        }
        Ok(document)
    }

    pub fn delete(&self, owner_id: &str, id: &str) -> Result<()> {
        let document = self.get(owner_id, id)?;
        if !self.documents.delete_document(id)? {
            return Err(DateKeeperError::NotFound(format!("document {id}")));
        }
        self.ledger.invalidate(id)?;
        tracing::info!("🗑️ Document deleted: '{}'", document.name);
        Ok(())
    }

    /// Reminder history for one of the owner's documents.
    pub fn reminders(&self, owner_id: &str, id: &str) -> Result<Vec<LedgerEntry>> {
        self.get(owner_id, id)?;
        self.ledger.entries(id)
    }
}
