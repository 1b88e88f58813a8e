use chrono::NaiveDateTime;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

pub type VocabId = i64;
pub type DocumentId = i64;

/// One saved word or phrase, as returned by the vocabulary server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VocabRecord {
    pub id: VocabId,
    pub original: String,
    pub translation: String,
    #[serde(default)]
    pub context: String,
    #[serde(rename = "bookId")]
    pub document_id: DocumentId,
    #[serde(rename = "bookTitle", default)]
    pub book_title: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
}

impl VocabRecord {
    /// Parse the server timestamp for display. The server emits SQLite's
    /// `YYYY-MM-DD HH:MM:SS`; tolerate RFC 3339 as well. `None` on anything else.
    pub fn created_date(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%dT%H:%M:%S%.fZ"))
            .ok()
    }
}

/// Payload for saving a new record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VocabDraft {
    pub original: String,
    pub translation: String,
    pub context: String,
    #[serde(rename = "bookId")]
    pub document_id: DocumentId,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server returned {0}")]
    Status(reqwest::StatusCode),
}

/// External vocabulary collaborator. The server has no per-document filter,
/// so `list` always returns every record; filtering happens client-side.
pub trait VocabStore {
    fn list(&self) -> Result<Vec<VocabRecord>, StoreError>;
    fn save(&self, draft: &VocabDraft) -> Result<VocabId, StoreError>;
    fn delete(&self, id: VocabId) -> Result<(), StoreError>;

    /// Signal bumped after any successful mutation, so views know to reload.
    fn change_signal(&self) -> ChangeSignal;
}

/// Shared generation counter; replaces the window-scoped "vocabulary changed"
/// event of the old client with an explicit subscription handle.
#[derive(Debug, Clone, Default)]
pub struct ChangeSignal(Arc<AtomicU64>);

impl ChangeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}

#[derive(Serialize)]
struct SaveRequest<'a> {
    original: &'a str,
    translation: &'a str,
    context: &'a str,
    #[serde(rename = "bookId")]
    book_id: DocumentId,
}

#[derive(Deserialize)]
struct SaveResponse {
    id: VocabId,
}

/// HTTP-backed store against the reading server's `/api/vocab` endpoints.
pub struct HttpVocabStore {
    client: reqwest::blocking::Client,
    base_url: String,
    signal: ChangeSignal,
}

impl HttpVocabStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.into(),
            signal: ChangeSignal::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

impl VocabStore for HttpVocabStore {
    fn list(&self) -> Result<Vec<VocabRecord>, StoreError> {
        let response = self.client.get(self.url("/api/vocab")).send()?;
        if !response.status().is_success() {
            return Err(StoreError::Status(response.status()));
        }
        Ok(response.json()?)
    }

    fn save(&self, draft: &VocabDraft) -> Result<VocabId, StoreError> {
        let request = SaveRequest {
            original: &draft.original,
            translation: &draft.translation,
            context: &draft.context,
            book_id: draft.document_id,
        };
        let response = self
            .client
            .post(self.url("/api/vocab"))
            .json(&request)
            .send()?;
        if !response.status().is_success() {
            return Err(StoreError::Status(response.status()));
        }
        let saved: SaveResponse = response.json()?;
        self.signal.bump();
        Ok(saved.id)
    }

    fn delete(&self, id: VocabId) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(self.url(&format!("/api/vocab/{id}")))
            .send()?;
        let status = response.status();
        // 404 means the record is already gone, which is what we wanted.
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::Status(status));
        }
        self.signal.bump();
        Ok(())
    }

    fn change_signal(&self) -> ChangeSignal {
        self.signal.clone()
    }
}

/// The deduplicated, match-ordered term set for one document.
///
/// One record per distinct case-insensitive `original`; the lowest id wins a
/// tie so rebuilding from the same rows is deterministic regardless of fetch
/// order. Terms are pre-sorted longest-first so multi-word phrases are
/// matched before the shorter terms they contain.
#[derive(Debug, Default, Clone)]
pub struct TermSet {
    terms: Vec<VocabRecord>,
    by_id: HashMap<VocabId, usize>,
    generation: u64,
}

impl TermSet {
    pub fn build(records: Vec<VocabRecord>, document_id: DocumentId) -> Self {
        let mut winners: HashMap<String, VocabRecord> = HashMap::new();
        for record in records {
            if record.document_id != document_id {
                continue;
            }
            let key = record.original.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            match winners.get(&key) {
                Some(existing) if existing.id <= record.id => {}
                _ => {
                    winners.insert(key, record);
                }
            }
        }

        let mut terms: Vec<VocabRecord> = winners.into_values().collect();
        terms.sort_by(|a, b| {
            b.original
                .chars()
                .count()
                .cmp(&a.original.chars().count())
                .then_with(|| a.original.to_lowercase().cmp(&b.original.to_lowercase()))
        });

        let by_id = terms
            .iter()
            .enumerate()
            .map(|(idx, record)| (record.id, idx))
            .collect();

        Self {
            terms,
            by_id,
            generation: 0,
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Terms in matching order: longest first.
    pub fn iter(&self) -> impl Iterator<Item = &VocabRecord> {
        self.terms.iter()
    }

    /// Stale-id-tolerant lookup: a record deleted between fetch and use
    /// simply resolves to `None`.
    pub fn get(&self, id: VocabId) -> Option<&VocabRecord> {
        self.by_id.get(&id).map(|&idx| &self.terms[idx])
    }
}

/// Fetch and build the term set for a document. A fetch failure degrades to
/// "no highlighting", never an error: the reader must keep rendering.
pub fn load_terms(store: &dyn VocabStore, document_id: DocumentId) -> TermSet {
    let generation = store.change_signal().generation();
    match store.list() {
        Ok(records) => {
            let set = TermSet::build(records, document_id).with_generation(generation);
            debug!(
                "loaded {} terms for document {document_id} (generation {generation})",
                set.len()
            );
            set
        }
        Err(e) => {
            warn!("vocabulary fetch failed, highlighting disabled: {e}");
            TermSet::default().with_generation(generation)
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{FakeVocabStore, record};
    use super::*;

    #[test]
    fn term_set_filters_by_document() {
        let records = vec![record(1, "apple", 7), record(2, "pear", 8)];
        let set = TermSet::build(records, 7);
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().original, "apple");
    }

    #[test]
    fn dedup_is_case_insensitive_and_lowest_id_wins() {
        let records = vec![
            record(5, "Run", 1),
            record(2, "run", 1),
            record(9, "RUN", 1),
        ];
        let set = TermSet::build(records, 1);
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().id, 2);
    }

    #[test]
    fn dedup_is_deterministic_across_fetch_order() {
        let a = vec![record(5, "Run", 1), record(2, "run", 1)];
        let b = vec![record(2, "run", 1), record(5, "Run", 1)];
        let set_a = TermSet::build(a, 1);
        let set_b = TermSet::build(b, 1);
        assert_eq!(
            set_a.iter().map(|r| r.id).collect::<Vec<_>>(),
            set_b.iter().map(|r| r.id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn terms_sorted_longest_first() {
        let records = vec![
            record(1, "take", 1),
            record(2, "take off", 1),
            record(3, "off", 1),
        ];
        let set = TermSet::build(records, 1);
        let originals: Vec<_> = set.iter().map(|r| r.original.as_str()).collect();
        assert_eq!(originals, vec!["take off", "take", "off"]);
    }

    #[test]
    fn blank_originals_are_dropped() {
        let records = vec![record(1, "   ", 1), record(2, "word", 1)];
        let set = TermSet::build(records, 1);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn get_by_id_and_stale_lookup() {
        let set = TermSet::build(vec![record(4, "word", 1)], 1);
        assert!(set.get(4).is_some());
        assert!(set.get(99).is_none());
    }

    #[test]
    fn load_terms_degrades_to_empty_on_failure() {
        let store = FakeVocabStore::new(vec![record(1, "word", 1)]);
        *store.fail_list.lock().unwrap() = true;
        let set = load_terms(&store, 1);
        assert!(set.is_empty());
    }

    #[test]
    fn save_bumps_change_signal() {
        let store = FakeVocabStore::new(vec![]);
        let signal = store.change_signal();
        let before = signal.generation();
        store
            .save(&VocabDraft {
                original: "word".into(),
                translation: "mot".into(),
                context: String::new(),
                document_id: 1,
            })
            .unwrap();
        assert!(signal.generation() > before);
    }

    #[test]
    fn created_date_parses_sqlite_timestamp() {
        let r = record(1, "word", 1);
        assert!(r.created_date().is_some());
        let mut bad = r.clone();
        bad.created_at = "not a date".into();
        assert!(bad.created_date().is_none());
    }

    #[test]
    fn record_deserializes_server_shape() {
        let json = r#"{
            "id": 3,
            "original": "take off",
            "translation": "despegar",
            "context": "please take off your shoes",
            "bookId": 12,
            "bookTitle": "Short Stories",
            "createdAt": "2024-03-01 09:30:00"
        }"#;
        let record: VocabRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.document_id, 12);
        assert_eq!(record.book_title.as_deref(), Some("Short Stories"));
    }
}
