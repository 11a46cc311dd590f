use crate::{
    plan::{ProjectExpr, ProjectKind},
    processor::{Next, Processor},
    result::SearchResult,
};

/// evaluates a fixed list of projections against each upstream result's row. stands in for the
/// real expression evaluator, which is out of scope; streaming (one upstream pull per `Next`).
pub struct ProjectProcessor {
    pub(crate) upstream: Box<Processor>,
    exprs: Vec<ProjectExpr>,
}

impl ProjectProcessor {
    pub fn new(upstream: Box<Processor>, exprs: Vec<ProjectExpr>) -> Self {
        Self { upstream, exprs }
    }

    pub fn next(&mut self, out: &mut SearchResult) -> Next {
        match self.upstream.next(out) {
            Next::Ok => {
                for expr in &self.exprs {
                    let value = match &expr.kind {
                        ProjectKind::CopyField(src) => out.row.get(*src).cloned().unwrap_or(crate::value::RValue::Null),
                        ProjectKind::Constant(v) => v.clone(),
                    };
                    out.row.set(expr.dst, value);
                }
                Next::Ok
            }
            other => other,
        }
    }
}
