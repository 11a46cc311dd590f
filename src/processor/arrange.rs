use std::{cmp::Ordering, collections::VecDeque};

use crate::{
    plan::ArrangeStep,
    processor::{Next, Processor},
    result::SearchResult,
    value::RValue,
};

enum State {
    Collecting(Vec<SearchResult>),
    Draining(VecDeque<SearchResult>),
}

/// buffers upstream results, sorts them by the plan's `ArrangeStep.sort_keys`, then applies
/// `offset`/`limit` pagination. a blocking stage: it must exhaust upstream before it can
/// produce its first output, since the sort order depends on the whole result set.
pub struct ArrangeProcessor {
    pub(crate) upstream: Box<Processor>,
    step: ArrangeStep,
    state: State,
}

impl ArrangeProcessor {
    pub fn new(upstream: Box<Processor>, step: ArrangeStep) -> Self {
        Self {
            upstream,
            step,
            state: State::Collecting(Vec::new()),
        }
    }

    pub fn next(&mut self, out: &mut SearchResult) -> Next {
        loop {
            match &mut self.state {
                State::Collecting(buf) => {
                    let mut scratch = SearchResult::default();
                    match self.upstream.next(&mut scratch) {
                        Next::Ok => {
                            buf.push(scratch);
                            continue;
                        }
                        Next::Paused => return Next::Paused,
                        Next::Error(e) => return Next::Error(e),
                        Next::Eof => {
                            let mut buf = match std::mem::replace(&mut self.state, State::Draining(VecDeque::new()))
                            {
                                State::Collecting(buf) => buf,
                                State::Draining(_) => unreachable!(),
                            };
                            buf.sort_by(|a, b| self.compare(a, b));
                            let page: VecDeque<SearchResult> = buf
                                .into_iter()
                                .skip(self.step.offset)
                                .take(self.step.limit.unwrap_or(usize::MAX))
                                .collect();
                            self.state = State::Draining(page);
                            continue;
                        }
                    }
                }
                State::Draining(queue) => {
                    return match queue.pop_front() {
                        Some(r) => {
                            *out = r;
                            Next::Ok
                        }
                        None => Next::Eof,
                    };
                }
            }
        }
    }

    fn compare(&self, a: &SearchResult, b: &SearchResult) -> Ordering {
        for key in &self.step.sort_keys {
            let (av, bv) = (self.sort_value(a, *key), self.sort_value(b, *key));
            let ord = cmp_rvalue(av.as_ref(), bv.as_ref());
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    fn sort_value<'a>(&self, r: &'a SearchResult, key: crate::row::RLookupKeyId) -> Option<&'a RValue> {
        r.row.get(key)
    }
}

/// numbers order numerically, strings and host strings order by byte value, `Null`/missing
/// sort last regardless of domain. used both for sorting and, indirectly, by the wire
/// encoding's round-trip property (numeric vs. string domains never compare across types in
/// practice because a plan's sort keys are consistently typed per column).
fn cmp_rvalue(a: Option<&RValue>, b: Option<&RValue>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (Some(RValue::Number(a)), Some(RValue::Number(b))) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Some(RValue::String(a)), Some(RValue::String(b))) => a.cmp(b),
        (Some(RValue::HostString(a)), Some(RValue::HostString(b))) => a.as_bytes().cmp(b.as_bytes()),
        (Some(a), Some(b)) => format!("{a:?}").cmp(&format!("{b:?}")),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
