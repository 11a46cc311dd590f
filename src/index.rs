//! [`IndexReader`]: the seam at which the real inverted index would plug in.
//!
//! the index itself, its document metadata store, and score computation are external
//! collaborators per this crate's scope; this module only defines the interface the root
//! processor pulls from, plus an in-memory double used by this crate's own tests.

use crate::result::DocId;

/// one step of document enumeration from the deepest index reader.
#[derive(Debug, Clone)]
pub enum ReaderStep {
    Doc { doc_id: DocId, key: Vec<u8>, score: f64 },
    /// a cooperative yield: some host resource (e.g. a key lock) needed to be released.
    /// the chain is resumable; a later call to `next_doc` continues enumeration.
    Paused,
    Eof,
}

/// the seam between the processor chain and the real inverted index / document store.
///
/// `Send` because a reserved cursor's [`crate::areq::Areq`] (and therefore its reader) may be
/// handed off to the thread handling a later `CURSOR READ` call.
pub trait IndexReader: Send {
    fn next_doc(&mut self) -> ReaderStep;

    /// the reader's own count of matching documents, independent of how many have actually
    /// been pulled through `next_doc` so far.
    ///
    /// a real inverted-index iterator typically knows this cheaply and immediately (posting
    /// list length, or the min/sum of child iterators' estimates for an intersection/union),
    /// without needing to enumerate — it is this value, not a tally of completed `next_doc`
    /// calls, that `sendChunk` reports as `total_results` (§8's S1 and S3 scenarios both
    /// expect the full count on the very first chunk, before most or all rows have been
    /// pulled). implementations that only discover their count by scanning should report their
    /// best current estimate rather than zero.
    fn total_seen(&self) -> u64;
}

/// deterministic in-memory [`IndexReader`] used by this crate's own tests and doctests. not a
/// real index: documents and scores are supplied up front by the test, so its count is exact
/// and known from construction, matching the common case for a simple term iterator.
#[derive(Debug, Clone, Default)]
pub struct VecIndexReader {
    docs: std::collections::VecDeque<(Vec<u8>, f64)>,
    total: u64,
    next_id: u64,
    /// when `Some(n)`, the n-th call to `next_doc` (0-indexed) returns `Paused` instead of
    /// advancing, to exercise the cooperative-yield contract.
    pause_at: Option<usize>,
    calls: usize,
}

impl VecIndexReader {
    pub fn new(docs: impl IntoIterator<Item = (Vec<u8>, f64)>) -> Self {
        let docs: std::collections::VecDeque<_> = docs.into_iter().collect();
        let total = docs.len() as u64;
        Self {
            docs,
            total,
            next_id: 0,
            pause_at: None,
            calls: 0,
        }
    }

    pub fn with_pause_at(mut self, call_index: usize) -> Self {
        self.pause_at = Some(call_index);
        self
    }
}

impl IndexReader for VecIndexReader {
    fn next_doc(&mut self) -> ReaderStep {
        let call = self.calls;
        self.calls += 1;
        if self.pause_at == Some(call) {
            return ReaderStep::Paused;
        }
        match self.docs.pop_front() {
            Some((key, score)) => {
                self.next_id += 1;
                ReaderStep::Doc {
                    doc_id: DocId(self.next_id),
                    key,
                    score,
                }
            }
            None => ReaderStep::Eof,
        }
    }

    fn total_seen(&self) -> u64 {
        self.total
    }
}
