//! the result processor chain: a pull-based stream of [`SearchResult`]s, composed of the
//! stage kinds a compiled [`crate::plan::Plan`] can produce.
//!
//! the distilled contract treats a stage as an opaque `Next` function; this crate closes the
//! union over the concrete stage kinds a search/aggregate pipeline actually needs (§4.1.1) as
//! one sum type rather than a trait object, since a compiled pipeline's shape never changes
//! after it is built (plan.rs's `Plan` is the only thing describing it, and it's immutable
//! once produced by `PlanBuilder::build`).

mod arrange;
mod group;
mod limit;
mod project;
mod root;
mod scorer;

pub use self::{
    arrange::ArrangeProcessor, group::GroupProcessor, limit::LimitProcessor, project::ProjectProcessor,
    root::RootProcessor, scorer::ScorerProcessor,
};

use crate::{error::Error, result::SearchResult};

/// outcome of one pull through a stage. mirrors §4.1's `Next` contract.
pub enum Next {
    /// `out` is populated; caller takes ownership of its inner buffers and must clear them
    /// before the buffer is reused for a later call.
    Ok,
    /// end of stream; no further calls are expected.
    Eof,
    /// a cooperative yield: some host resource needed to be released. the chain is resumable.
    Paused,
    /// a stage failed. carries the error out-of-band; the caller must propagate it.
    Error(Error),
}

/// one stage in a compiled pipeline. variants own their upstream exclusively; `next` on stage
/// N pulls from stage N-1 and transforms.
pub enum Processor {
    Root(RootProcessor),
    Scorer(ScorerProcessor),
    Arrange(ArrangeProcessor),
    Project(ProjectProcessor),
    Group(GroupProcessor),
    Limit(LimitProcessor),
}

impl Processor {
    pub fn next(&mut self, out: &mut SearchResult) -> Next {
        match self {
            Processor::Root(p) => p.next(out),
            Processor::Scorer(p) => p.next(out),
            Processor::Arrange(p) => p.next(out),
            Processor::Project(p) => p.next(out),
            Processor::Group(p) => p.next(out),
            Processor::Limit(p) => p.next(out),
        }
    }

    /// documents encountered by the deepest index reader so far, independent of how many
    /// survive downstream. every non-root variant forwards to its upstream, so this always
    /// resolves to the single `RootProcessor` at the bottom of the chain.
    pub fn total_results(&self) -> u64 {
        match self {
            Processor::Root(p) => p.total_results(),
            Processor::Scorer(p) => p.upstream.total_results(),
            Processor::Arrange(p) => p.upstream.total_results(),
            Processor::Project(p) => p.upstream.total_results(),
            Processor::Group(p) => p.upstream.total_results(),
            Processor::Limit(p) => p.upstream.total_results(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        index::VecIndexReader,
        plan::ScorerKind,
    };

    fn docs() -> VecIndexReader {
        VecIndexReader::new([(b"d1".to_vec(), 1.5), (b"d2".to_vec(), 1.0)])
    }

    #[test]
    fn root_then_eof() {
        let mut chain = Processor::Root(RootProcessor::new(Box::new(docs())));
        let mut out = SearchResult::default();
        assert!(matches!(chain.next(&mut out), Next::Ok));
        assert_eq!(out.score, 1.5);
        assert!(matches!(chain.next(&mut out), Next::Ok));
        assert!(matches!(chain.next(&mut out), Next::Eof));
        assert_eq!(chain.total_results(), 2);
    }

    #[test]
    fn paused_does_not_affect_the_known_total() {
        let reader = docs().with_pause_at(0);
        let mut chain = Processor::Root(RootProcessor::new(Box::new(reader)));
        let mut out = SearchResult::default();
        assert_eq!(chain.total_results(), 2);
        assert!(matches!(chain.next(&mut out), Next::Paused));
        assert_eq!(chain.total_results(), 2);
        assert!(matches!(chain.next(&mut out), Next::Ok));
        assert_eq!(chain.total_results(), 2);
    }

    #[test]
    fn scorer_overwrites_then_passes_through() {
        let root = Box::new(Processor::Root(RootProcessor::new(Box::new(docs()))));
        let mut chain = Processor::Scorer(ScorerProcessor::new(root, ScorerKind::Constant(9.0)));
        let mut out = SearchResult::default();
        assert!(matches!(chain.next(&mut out), Next::Ok));
        assert_eq!(out.score, 9.0);
        assert_eq!(chain.total_results(), 2);
    }
}
