//! [`Areq`]: the per-command execution object (§3's "AREQ") owning the compiled pipeline.

use std::time::Duration;

use crate::{
    flags::{RequestFlags, StateFlags},
    index::IndexReader,
    plan::{ArrangeStep, Plan, PlanBuilder, StageSpec},
    processor::{LimitProcessor, Processor, RootProcessor},
    row::RLookup,
};

/// builder for an [`Areq`]: wraps a [`PlanBuilder`] with the cursor-specific configuration
/// (§3's `chunk_size`/`max_idle_ms`) that lives on the request rather than the plan.
///
/// # Examples
/// ```
/// use ft_query_core::{areq::AreqBuilder, flags::RequestFlags, index::VecIndexReader, row::RLookup};
///
/// let lookup = RLookup::new();
/// let reader = VecIndexReader::new([(b"d1".to_vec(), 1.0)]);
/// let areq = AreqBuilder::new(RequestFlags::IS_SEARCH)
///     .limit(10)
///     .build(lookup, Box::new(reader))
///     .unwrap();
/// assert_eq!(areq.total_results(), 1);
/// ```
pub struct AreqBuilder {
    plan: PlanBuilder,
    chunk_size: Option<u32>,
    max_idle: Option<Duration>,
}

impl AreqBuilder {
    pub fn new(flags: RequestFlags) -> Self {
        Self {
            plan: PlanBuilder::new(flags),
            chunk_size: None,
            max_idle: None,
        }
    }

    pub fn scorer(mut self, kind: crate::plan::ScorerKind) -> Self {
        self.plan = self.plan.scorer(kind);
        self
    }

    pub fn arrange(mut self, sort_keys: Vec<crate::row::RLookupKeyId>, offset: usize, limit: Option<usize>) -> Self {
        self.plan = self.plan.arrange(sort_keys, offset, limit);
        self
    }

    pub fn project(mut self, exprs: Vec<crate::plan::ProjectExpr>) -> Self {
        self.plan = self.plan.project(exprs);
        self
    }

    pub fn group(mut self, spec: crate::plan::GroupSpec) -> Self {
        self.plan = self.plan.group(spec);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.plan = self.plan.limit(n);
        self
    }

    /// per-query chunk size override (`COUNT` on `WITHCURSOR`, or a plain `LIMIT`-less
    /// cursor default); falls back to the registry's configured default when unset.
    pub fn chunk_size(mut self, n: u32) -> Self {
        self.chunk_size = Some(n);
        self
    }

    /// per-cursor idle window (`MAXIDLE`); falls back to the registry's configured default
    /// when unset.
    pub fn max_idle(mut self, d: Duration) -> Self {
        self.max_idle = Some(d);
        self
    }

    /// build protocol steps 5-7: validate lookup references against `lookup` ("apply
    /// context"), then instantiate the processor chain over `reader` ("build pipeline").
    pub fn build(self, lookup: RLookup, reader: Box<dyn IndexReader>) -> Result<Areq, crate::error::Error> {
        let plan = self.plan.build(&lookup)?;
        Ok(Areq::from_plan(plan, lookup, reader, self.chunk_size, self.max_idle))
    }

    /// build protocol step 6 only ("apply context"), without instantiating a pipeline — used
    /// by `FT.EXPLAIN`, which renders the compiled plan and never executes it.
    pub fn build_plan(self, lookup: &RLookup) -> Result<Plan, crate::error::Error> {
        self.plan.build(lookup)
    }
}

/// the per-command execution object: compiled plan remnants needed at serialization time,
/// the built pipeline, request/state flags, and cursor configuration.
///
/// invariant upheld by construction: after [`AreqBuilder::build`] returns `Ok`, the pipeline
/// is valid and `next`-callable; no partially built `Areq` is ever observable.
pub struct Areq {
    flags: RequestFlags,
    state: StateFlags,
    arrange: Option<ArrangeStep>,
    lookup: RLookup,
    pipeline: Processor,
    chunk_size: Option<u32>,
    max_idle: Option<Duration>,
}

impl Areq {
    fn from_plan(
        plan: Plan,
        lookup: RLookup,
        reader: Box<dyn IndexReader>,
        chunk_size: Option<u32>,
        max_idle: Option<Duration>,
    ) -> Self {
        let arrange = plan.arrange().cloned();
        let mut pipeline = Processor::Root(RootProcessor::new(reader));
        for stage in plan.stages {
            pipeline = match stage {
                StageSpec::Scorer(kind) => {
                    Processor::Scorer(crate::processor::ScorerProcessor::new(Box::new(pipeline), kind))
                }
                StageSpec::Arrange(step) => {
                    Processor::Arrange(crate::processor::ArrangeProcessor::new(Box::new(pipeline), step))
                }
                StageSpec::Project(exprs) => {
                    Processor::Project(crate::processor::ProjectProcessor::new(Box::new(pipeline), exprs))
                }
                StageSpec::Group(spec) => Processor::Group(crate::processor::GroupProcessor::new(Box::new(pipeline), spec)),
                StageSpec::Limit(n) => Processor::Limit(LimitProcessor::new(Box::new(pipeline), n)),
            };
        }
        Self {
            flags: plan.flags,
            state: StateFlags::NONE,
            arrange,
            lookup,
            pipeline,
            chunk_size,
            max_idle,
        }
    }

    pub fn flags(&self) -> RequestFlags {
        self.flags
    }

    pub fn state(&self) -> StateFlags {
        self.state
    }

    pub(crate) fn mark(&mut self, flag: StateFlags) {
        self.state.insert(flag);
    }

    pub fn arrange(&self) -> Option<&ArrangeStep> {
        self.arrange.as_ref()
    }

    pub fn lookup(&self) -> &RLookup {
        &self.lookup
    }

    pub fn chunk_size(&self) -> Option<u32> {
        self.chunk_size
    }

    pub fn max_idle(&self) -> Option<Duration> {
        self.max_idle
    }

    pub fn total_results(&self) -> u64 {
        self.pipeline.total_results()
    }

    /// pull one result through the pipeline's tail processor. §3's invariant that
    /// `state.iter_done` is monotonic is the caller's responsibility (the serializer is the
    /// only caller in this crate, and it upholds it).
    pub fn next(&mut self, out: &mut crate::result::SearchResult) -> crate::processor::Next {
        self.pipeline.next(out)
    }
}
