use crate::{
    processor::{Next, Processor},
    result::SearchResult,
};

/// caps the number of results pulled through it, independent of an [`crate::plan::ArrangeStep`]'s
/// own pagination (used by pipelines that limit without sorting, e.g. `LIMIT` with no
/// `SORTBY`). streaming: forwards each upstream result as it arrives, no buffering.
pub struct LimitProcessor {
    pub(crate) upstream: Box<Processor>,
    remaining: usize,
}

impl LimitProcessor {
    pub fn new(upstream: Box<Processor>, n: usize) -> Self {
        Self { upstream, remaining: n }
    }

    pub fn next(&mut self, out: &mut SearchResult) -> Next {
        if self.remaining == 0 {
            return Next::Eof;
        }
        match self.upstream.next(out) {
            Next::Ok => {
                self.remaining -= 1;
                Next::Ok
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::index::VecIndexReader;
    use crate::processor::RootProcessor;

    #[test]
    fn caps_at_n() {
        let docs = VecIndexReader::new([(b"a".to_vec(), 1.0), (b"b".to_vec(), 1.0), (b"c".to_vec(), 1.0)]);
        let root = Box::new(Processor::Root(RootProcessor::new(Box::new(docs))));
        let mut chain = Processor::Limit(LimitProcessor::new(root, 2));
        let mut out = SearchResult::default();
        assert!(matches!(chain.next(&mut out), Next::Ok));
        assert!(matches!(chain.next(&mut out), Next::Ok));
        assert!(matches!(chain.next(&mut out), Next::Eof));
    }

    #[test]
    fn zero_limit_is_immediate_eof() {
        let docs = VecIndexReader::new([(b"a".to_vec(), 1.0)]);
        let root = Box::new(Processor::Root(RootProcessor::new(Box::new(docs))));
        let mut chain = Processor::Limit(LimitProcessor::new(root, 0));
        let mut out = SearchResult::default();
        assert!(matches!(chain.next(&mut out), Next::Eof));
    }
}
