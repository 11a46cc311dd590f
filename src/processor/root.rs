use crate::{
    index::{IndexReader, ReaderStep},
    processor::Next,
    result::SearchResult,
};

/// the head of a pipeline: drives an [`IndexReader`] and is the sole source of `total_results`.
pub struct RootProcessor {
    reader: Box<dyn IndexReader>,
}

impl RootProcessor {
    pub fn new(reader: Box<dyn IndexReader>) -> Self {
        Self { reader }
    }

    pub fn total_results(&self) -> u64 {
        self.reader.total_seen()
    }

    pub fn next(&mut self, out: &mut SearchResult) -> Next {
        match self.reader.next_doc() {
            ReaderStep::Doc { doc_id, key, score } => {
                *out = SearchResult::new(doc_id, Some(key), score);
                Next::Ok
            }
            ReaderStep::Paused => Next::Paused,
            ReaderStep::Eof => Next::Eof,
        }
    }
}
