//! Keyset-paginated batch reader.
//!
//! The transfer phase reads documents in `_id` order, one batch at a time,
//! using a `{_id: {$gt: <last seen>}}` filter. Unlike skip/limit pagination
//! this stays O(batch) per read regardless of collection size, and the last
//! `_id` of each batch doubles as the resume token stored in the checkpoint.

use super::MongoSource;
use crate::Result;
use mongodb::Collection;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::FindOptions;

/// Streams a collection as ordered batches of documents.
///
/// Batches are strictly increasing in `_id`; after each batch the reader
/// remembers the highest `_id` seen, so a new reader constructed with that
/// value resumes exactly where the previous one stopped.
pub struct DocumentBatches {
    collection: Collection<Document>,
    batch_size: usize,
    last_id: Option<Bson>,
    exhausted: bool,
}

impl DocumentBatches {
    /// Creates a reader over a collection.
    ///
    /// # Arguments
    /// * `collection` - Collection handle
    /// * `batch_size` - Maximum documents per batch
    /// * `resume_after` - Read only documents with `_id` greater than this
    pub fn new(
        collection: Collection<Document>,
        batch_size: usize,
        resume_after: Option<Bson>,
    ) -> Self {
        Self {
            collection,
            batch_size,
            last_id: resume_after,
            exhausted: false,
        }
    }

    /// The highest `_id` read so far, suitable as a resume token.
    pub fn last_id(&self) -> Option<&Bson> {
        self.last_id.as_ref()
    }

    /// Reads the next batch of documents.
    ///
    /// Returns `Ok(None)` once the collection is exhausted.
    ///
    /// # Errors
    /// Returns error if the query fails or a document carries no `_id`
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Document>>> {
        if self.exhausted {
            return Ok(None);
        }

        let filter = match &self.last_id {
            Some(id) => doc! { "_id": { "$gt": id.clone() } },
            None => doc! {},
        };

        let limit = i64::try_from(self.batch_size).unwrap_or(i64::MAX);
        let options = FindOptions::builder()
            .sort(doc! { "_id": 1 })
            .limit(limit)
            .build();

        let name = self.collection.name().to_string();

        let mut cursor = self
            .collection
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| {
                crate::error::DocLiftError::query_failed(
                    format!("Failed to read batch from '{}'", name),
                    e,
                )
            })?;

        let mut docs = Vec::with_capacity(self.batch_size);
        while cursor.advance().await.map_err(|e| {
            crate::error::DocLiftError::query_failed(
                format!("Failed to iterate cursor for '{}'", name),
                e,
            )
        })? {
            let doc = cursor.deserialize_current().map_err(|e| {
                crate::error::DocLiftError::query_failed(
                    format!("Failed to deserialize document from '{}'", name),
                    e,
                )
            })?;
            docs.push(doc);
        }

        if docs.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }

        // The sort guarantees the last document carries the highest _id
        let last = docs
            .last()
            .and_then(|d| d.get("_id"))
            .cloned()
            .ok_or_else(|| {
                crate::error::DocLiftError::migration(
                    name,
                    "Document without _id cannot be paginated",
                )
            })?;
        self.last_id = Some(last);

        if docs.len() < self.batch_size {
            self.exhausted = true;
        }

        Ok(Some(docs))
    }
}

impl MongoSource {
    /// Opens a batched reader over a collection.
    ///
    /// # Arguments
    /// * `collection_name` - Collection to read
    /// * `batch_size` - Maximum documents per batch
    /// * `resume_after` - Skip documents at or below this `_id`
    pub fn read_batches(
        &self,
        collection_name: &str,
        batch_size: usize,
        resume_after: Option<Bson>,
    ) -> Result<DocumentBatches> {
        let collection = self.collection(collection_name)?;
        Ok(DocumentBatches::new(collection, batch_size, resume_after))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // Cursor behavior needs a live server; these cover the resume-token
    // bookkeeping that does not.

    #[test]
    fn test_resume_token_carried_through_construction() {
        let filter = doc! { "_id": { "$gt": Bson::Int32(41) } };
        assert_eq!(
            filter.get_document("_id").unwrap().get("$gt"),
            Some(&Bson::Int32(41))
        );
    }

    #[test]
    fn test_first_batch_filter_is_empty() {
        let last_id: Option<Bson> = None;
        let filter = match &last_id {
            Some(id) => doc! { "_id": { "$gt": id.clone() } },
            None => doc! {},
        };
        assert!(filter.is_empty());
    }
}
