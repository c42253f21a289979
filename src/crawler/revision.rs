use super::document::Document;
use crate::repository::RevisionInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Documents produced by one revision, with the revision's log metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub number: u64,
    /// Repository location the revision was read from
    pub location: String,
    pub author: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub documents: Vec<Document>,
}

impl Revision {
    pub fn new(location: impl Into<String>, info: RevisionInfo, documents: Vec<Document>) -> Self {
        Self {
            number: info.revision,
            location: location.into(),
            author: info.author,
            date: info.date,
            message: info.message,
            documents,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// One flat record per document, each carrying the revision metadata
    pub fn records(&self) -> impl Iterator<Item = DocumentRecord<'_>> {
        self.documents.iter().map(move |document| DocumentRecord {
            document,
            location: &self.location,
            author: self.author.as_deref(),
            date: self.date,
            message: self.message.as_deref(),
        })
    }
}

/// Flat per-document record handed to the indexing sink
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord<'a> {
    #[serde(flatten)]
    pub document: &'a Document,
    pub location: &'a str,
    pub author: Option<&'a str>,
    pub date: Option<DateTime<Utc>>,
    pub message: Option<&'a str>,
}

impl DocumentRecord<'_> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Total number of documents across revisions
pub fn document_count(revisions: &[Revision]) -> usize {
    revisions.iter().map(|revision| revision.documents.len()).sum()
}
