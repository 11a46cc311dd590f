use crate::{plan::ScorerKind, processor::Next, processor::Processor, result::SearchResult};

/// assigns/overwrites `SearchResult.score`. a no-op passthrough (`ScorerKind::Identity`) is
/// the default for aggregate pipelines, which typically do not score.
pub struct ScorerProcessor {
    pub(crate) upstream: Box<Processor>,
    kind: ScorerKind,
}

impl ScorerProcessor {
    pub fn new(upstream: Box<Processor>, kind: ScorerKind) -> Self {
        Self { upstream, kind }
    }

    pub fn next(&mut self, out: &mut SearchResult) -> Next {
        match self.upstream.next(out) {
            Next::Ok => {
                match self.kind {
                    ScorerKind::Identity => {}
                    ScorerKind::Constant(v) => out.score = v,
                    ScorerKind::FromField(key) => {
                        if let Some(v) = out.row.get(key).and_then(|v| v.as_f64()) {
                            out.score = v;
                        }
                    }
                }
                Next::Ok
            }
            other => other,
        }
    }
}
