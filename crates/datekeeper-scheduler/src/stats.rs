//! Per-status document counts for the dashboard summary.

use chrono::NaiveDate;
use datekeeper_core::Document;
use serde::{Deserialize, Serialize};

use crate::status::{DocumentStatus, classify};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub total: usize,
    pub valid: usize,
    pub expiring_this_month: usize,
    pub expiring_soon: usize,
    pub expired: usize,
}

impl DocumentStats {
    pub fn add(&mut self, status: DocumentStatus) {
        self.total += 1;
        match status {
            DocumentStatus::Valid => self.valid += 1,
            DocumentStatus::ExpiringThisMonth => self.expiring_this_month += 1,
            DocumentStatus::ExpiringSoon => self.expiring_soon += 1,
            DocumentStatus::Expired => self.expired += 1,
        }
    }
}

/// Tally `documents` by status as of `today`.
pub fn aggregate<'a, I>(documents: I, today: NaiveDate) -> DocumentStats
where
    I: IntoIterator<Item = &'a Document>,
{
    documents.into_iter().fold(DocumentStats::default(), |mut stats, doc| {
        stats.add(classify(doc.expiry_date, today));
        stats
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use datekeeper_core::DocumentType;

    #[test]
    fn test_aggregate() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 22).unwrap();
        let docs: Vec<Document> = [-5, 0, 3, 10, 30, 31, 400]
            .iter()
            .map(|d| Document::new("u1", "doc", DocumentType::Other, today + Duration::days(*d)))
            .collect();
        let stats = aggregate(&docs, today);
        assert_eq!(
            stats,
            DocumentStats {
                total: 7,
                valid: 2,
                expiring_this_month: 2,
                expiring_soon: 2,
                expired: 1,
            }
        );
    }

    #[test]
    fn test_empty() {
        let today = NaiveDate::from_ymd_opt(2026, 2, 22).unwrap();
        assert_eq!(aggregate(&Vec::new(), today), DocumentStats::default());
    }
}
