//! [`SearchResult`]: the per-document record the processor chain passes from stage to stage.

use crate::{row::RowData, value::RValue};

/// host-assigned document identifier. distinct from the externally visible document key so
/// the pipeline never confuses "which doc" with "what string the client sees".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocId(pub u64);

/// a per-document record: document metadata handle, relevance score, and a typed row.
///
/// lifecycle: allocated empty per `Next` call by the caller, populated by the pipeline,
/// cleared by the caller after serialization via [`SearchResult::clear`].
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub doc_id: DocId,
    /// document key, as seen by clients; absent when the root reader carries no metadata
    /// for this document (e.g. it was deleted between enumeration and read).
    pub key: Option<Vec<u8>>,
    pub score: f64,
    pub payload: Option<Vec<u8>>,
    pub row: RowData,
    /// packed sort-vector backing any `RLookupKeyFlags::SORT_VECTOR_SOURCE` key.
    pub sort_vector: Vec<RValue>,
}

impl Default for DocId {
    fn default() -> Self {
        DocId(0)
    }
}

impl SearchResult {
    pub fn new(doc_id: DocId, key: Option<Vec<u8>>, score: f64) -> Self {
        Self {
            doc_id,
            key,
            score,
            payload: None,
            row: RowData::new(),
            sort_vector: Vec::new(),
        }
    }

    /// reset this result to an empty state so the buffer can be reused for the next `Next`
    /// call without reallocating.
    pub fn clear(&mut self) {
        self.doc_id = DocId(0);
        self.key = None;
        self.score = 0.0;
        self.payload = None;
        self.row.clear();
        self.sort_vector.clear();
    }
}
