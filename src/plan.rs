//! the compiled plan a query/aggregate pipeline is built from.
//!
//! the real query parser/planner is out of scope (§1); what this module offers instead is a
//! [`PlanBuilder`] a caller (a parser, or a test) uses to describe a *compiled* plan directly,
//! modeled the same way `xitca-postgres`'s `Pipeline`/`TransactionBuilder` build up a
//! description before anything executes.

use crate::{
    error::{ContextError, Error},
    flags::RequestFlags,
    row::{RLookup, RLookupKeyId},
};

/// plan node describing sort and pagination. when present, `sort_keys` is the ordered list of
/// lookup keys the sort is over; the first is the primary sort key used for serialization.
#[derive(Debug, Clone)]
pub struct ArrangeStep {
    pub sort_keys: Vec<RLookupKeyId>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl ArrangeStep {
    pub fn primary_sort_key(&self) -> Option<RLookupKeyId> {
        self.sort_keys.first().copied()
    }
}

/// how the `Scorer` stage assigns a result's score. stands in for the real scoring function,
/// which is out of scope.
#[derive(Debug, Clone, Copy)]
pub enum ScorerKind {
    /// leave whatever score the root processor assigned (the common case for aggregate
    /// pipelines, which usually do not score).
    Identity,
    /// overwrite the score with a fixed constant, useful for deterministic tests.
    Constant(f64),
    /// overwrite the score by copying a numeric row value.
    FromField(RLookupKeyId),
}

/// one projection: write a value into `dst`, derived from `src` per `kind`.
#[derive(Debug, Clone)]
pub struct ProjectExpr {
    pub dst: RLookupKeyId,
    pub kind: ProjectKind,
}

/// stands in for the real expression evaluator, which is out of scope. covers the two shapes
/// common to a simple projection: copying an existing field under a new name, and computing a
/// constant (used by tests and by `APPLY`-style literal expressions).
#[derive(Debug, Clone)]
pub enum ProjectKind {
    CopyField(RLookupKeyId),
    Constant(crate::value::RValue),
}

/// one reducer applied within a group.
#[derive(Debug, Clone)]
pub enum Reducer {
    Count,
    Sum(RLookupKeyId),
    ToList(RLookupKeyId),
}

/// one group-by clause: group upstream results by `by`, writing each reducer's output under
/// its paired destination key.
#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub by: Vec<RLookupKeyId>,
    pub reduce: Vec<(RLookupKeyId, Reducer)>,
}

/// one stage in build order. `Root` is implicit (always first, wrapping the supplied
/// [`crate::index::IndexReader`]) and is not represented here.
#[derive(Debug, Clone)]
pub enum StageSpec {
    Scorer(ScorerKind),
    Arrange(ArrangeStep),
    Project(Vec<ProjectExpr>),
    Group(GroupSpec),
    Limit(usize),
}

/// the compiled plan: request flags plus an ordered stage list.
///
/// kept distinct from the built [`crate::processor::Processor`] chain because the serializer
/// needs direct access to the arrange step independent of how deep it sits in the pipeline
/// (§4.3's sort-key lookup), and because [`crate::command::explain`] renders this structure
/// without ever constructing a pipeline.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub flags: RequestFlags,
    pub stages: Vec<StageSpec>,
}

impl Plan {
    /// the arrange step, if the plan has one, wherever it sits in stage order.
    pub fn arrange(&self) -> Option<&ArrangeStep> {
        self.stages.iter().find_map(|s| match s {
            StageSpec::Arrange(a) => Some(a),
            _ => None,
        })
    }

    /// human-readable rendering of the compiled plan, for `FT.EXPLAIN`-style entry points.
    pub fn explain(&self, lookup: &RLookup) -> String {
        let mut out = String::new();
        out.push_str(if self.flags.contains(RequestFlags::IS_SEARCH) {
            "SEARCH\n"
        } else {
            "AGGREGATE\n"
        });
        out.push_str("  ROOT\n");
        for stage in &self.stages {
            match stage {
                StageSpec::Scorer(kind) => out.push_str(&format!("  SCORER {kind:?}\n")),
                StageSpec::Arrange(a) => {
                    let keys: Vec<&str> = a.sort_keys.iter().map(|k| lookup.name(*k)).collect();
                    out.push_str(&format!(
                        "  ARRANGE sort={:?} offset={} limit={:?}\n",
                        keys, a.offset, a.limit
                    ));
                }
                StageSpec::Project(exprs) => {
                    out.push_str(&format!("  PROJECT {} expr(s)\n", exprs.len()));
                    for e in exprs {
                        out.push_str(&format!("    -> {}\n", lookup.name(e.dst)));
                    }
                }
                StageSpec::Group(g) => {
                    let by: Vec<&str> = g.by.iter().map(|k| lookup.name(*k)).collect();
                    out.push_str(&format!("  GROUP by={:?} reducers={}\n", by, g.reduce.len()));
                }
                StageSpec::Limit(n) => out.push_str(&format!("  LIMIT {n}\n")),
            }
        }
        out
    }
}

/// builder for a compiled [`Plan`], analogous in spirit to `xitca-postgres`'s
/// `Pipeline::new()` / `TransactionBuilder` builders.
///
/// # Examples
/// ```
/// use ft_query_core::{flags::RequestFlags, plan::PlanBuilder, row::RLookup};
///
/// let mut lookup = RLookup::new();
/// let name = lookup.define("name", Default::default());
///
/// let plan = PlanBuilder::new(RequestFlags::IS_SEARCH)
///     .limit(10)
///     .build(&lookup)
///     .unwrap();
/// assert!(plan.arrange().is_none());
/// let _ = name;
/// ```
#[derive(Debug, Default, Clone)]
pub struct PlanBuilder {
    flags: RequestFlags,
    stages: Vec<StageSpec>,
}

impl PlanBuilder {
    pub fn new(flags: RequestFlags) -> Self {
        Self {
            flags,
            stages: Vec::new(),
        }
    }

    pub fn scorer(mut self, kind: ScorerKind) -> Self {
        self.stages.push(StageSpec::Scorer(kind));
        self
    }

    pub fn arrange(mut self, sort_keys: Vec<RLookupKeyId>, offset: usize, limit: Option<usize>) -> Self {
        self.stages.push(StageSpec::Arrange(ArrangeStep {
            sort_keys,
            offset,
            limit,
        }));
        self
    }

    pub fn project(mut self, exprs: Vec<ProjectExpr>) -> Self {
        self.stages.push(StageSpec::Project(exprs));
        self
    }

    pub fn group(mut self, spec: GroupSpec) -> Self {
        self.stages.push(StageSpec::Group(spec));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.stages.push(StageSpec::Limit(n));
        self
    }

    /// validate every lookup key referenced by a stage or arrange step against `lookup`
    /// (build protocol step 6, "apply context": resolve lookup keys, fix up sort key
    /// pointers, validate field references) and produce the compiled [`Plan`].
    pub fn build(self, lookup: &RLookup) -> Result<Plan, Error> {
        for stage in &self.stages {
            match stage {
                StageSpec::Scorer(ScorerKind::FromField(k)) => check(lookup, *k)?,
                StageSpec::Arrange(a) => {
                    for k in &a.sort_keys {
                        check(lookup, *k)?;
                    }
                }
                StageSpec::Project(exprs) => {
                    for e in exprs {
                        check(lookup, e.dst)?;
                        if let ProjectKind::CopyField(src) = &e.kind {
                            check(lookup, *src)?;
                        }
                    }
                }
                StageSpec::Group(g) => {
                    for k in &g.by {
                        check(lookup, *k)?;
                    }
                    for (dst, reducer) in &g.reduce {
                        check(lookup, *dst)?;
                        match reducer {
                            Reducer::Count => {}
                            Reducer::Sum(src) | Reducer::ToList(src) => check(lookup, *src)?,
                        }
                    }
                }
                StageSpec::Scorer(_) | StageSpec::Limit(_) => {}
            }
        }
        Ok(Plan {
            flags: self.flags,
            stages: self.stages,
        })
    }
}

fn check(lookup: &RLookup, key: RLookupKeyId) -> Result<(), Error> {
    if lookup.contains(key) {
        Ok(())
    } else {
        Err(ContextError { key }.into())
    }
}
