use crate::vocab_store::{DocumentId, StoreError};
use serde::Deserialize;

/// Metadata row from the document server.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DocumentMeta {
    pub id: DocumentId,
    pub title: String,
}

/// External document collaborator: list the shelf, fetch raw text bodies.
/// The body endpoint serves plain text, not JSON; the core never mutates it.
pub trait DocumentStore {
    fn list(&self) -> Result<Vec<DocumentMeta>, StoreError>;
    fn content(&self, id: DocumentId) -> Result<String, StoreError>;
}

pub struct HttpDocumentStore {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpDocumentStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

impl DocumentStore for HttpDocumentStore {
    fn list(&self) -> Result<Vec<DocumentMeta>, StoreError> {
        let response = self.client.get(self.url("/api/books")).send()?;
        if !response.status().is_success() {
            return Err(StoreError::Status(response.status()));
        }
        Ok(response.json()?)
    }

    fn content(&self, id: DocumentId) -> Result<String, StoreError> {
        let response = self
            .client
            .get(self.url(&format!("/api/books/{id}/content")))
            .send()?;
        if !response.status().is_success() {
            return Err(StoreError::Status(response.status()));
        }
        Ok(response.text()?)
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::collections::HashMap;

    pub struct FakeDocumentStore {
        pub documents: Vec<DocumentMeta>,
        pub contents: HashMap<DocumentId, String>,
    }

    impl FakeDocumentStore {
        pub fn new(documents: Vec<(DocumentId, &str, &str)>) -> Self {
            let metas = documents
                .iter()
                .map(|(id, title, _)| DocumentMeta {
                    id: *id,
                    title: title.to_string(),
                })
                .collect();
            let contents = documents
                .into_iter()
                .map(|(id, _, body)| (id, body.to_string()))
                .collect();
            Self {
                documents: metas,
                contents,
            }
        }
    }

    impl DocumentStore for FakeDocumentStore {
        fn list(&self) -> Result<Vec<DocumentMeta>, StoreError> {
            Ok(self.documents.clone())
        }

        fn content(&self, id: DocumentId) -> Result<String, StoreError> {
            self.contents
                .get(&id)
                .cloned()
                .ok_or(StoreError::Status(reqwest::StatusCode::NOT_FOUND))
        }
    }
}
