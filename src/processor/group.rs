use std::collections::{HashMap, VecDeque};

use crate::{
    plan::{GroupSpec, Reducer},
    processor::{Next, Processor},
    result::SearchResult,
    value::RValue,
};

#[derive(Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Num(u64),
    Bytes(Vec<u8>),
    Null,
}

fn key_part(v: Option<&RValue>) -> KeyPart {
    match v {
        Some(RValue::Number(n)) => KeyPart::Num(n.to_bits()),
        Some(RValue::String(s)) => KeyPart::Bytes(s.clone()),
        Some(RValue::HostString(s)) => KeyPart::Bytes(s.as_bytes().to_vec()),
        Some(RValue::Array(_)) | Some(RValue::Null) | None => KeyPart::Null,
    }
}

enum ReducerAccum {
    Count(u64),
    Sum(f64),
    List(Vec<RValue>),
}

impl ReducerAccum {
    fn new(r: &Reducer) -> Self {
        match r {
            Reducer::Count => ReducerAccum::Count(0),
            Reducer::Sum(_) => ReducerAccum::Sum(0.0),
            Reducer::ToList(_) => ReducerAccum::List(Vec::new()),
        }
    }

    fn update(&mut self, reducer: &Reducer, result: &SearchResult) {
        match (self, reducer) {
            (ReducerAccum::Count(c), Reducer::Count) => *c += 1,
            (ReducerAccum::Sum(s), Reducer::Sum(k)) => {
                if let Some(v) = result.row.get(*k).and_then(|v| v.as_f64()) {
                    *s += v;
                }
            }
            (ReducerAccum::List(l), Reducer::ToList(k)) => {
                l.push(result.row.get(*k).cloned().unwrap_or(RValue::Null));
            }
            _ => unreachable!("reducer accumulator kind must match its spec"),
        }
    }

    fn finish(self) -> RValue {
        match self {
            ReducerAccum::Count(c) => RValue::Number(c as f64),
            ReducerAccum::Sum(s) => RValue::Number(s),
            ReducerAccum::List(l) => RValue::Array(l),
        }
    }
}

struct GroupEntry {
    by_values: Vec<RValue>,
    reducers: Vec<ReducerAccum>,
}

enum State {
    Collecting {
        index: HashMap<Vec<KeyPart>, usize>,
        groups: Vec<GroupEntry>,
    },
    Draining(VecDeque<SearchResult>),
}

/// groups upstream results by a list of lookup keys, applying one or more reducers per group.
/// a blocking stage: emits one result per group, only once upstream is exhausted.
pub struct GroupProcessor {
    pub(crate) upstream: Box<Processor>,
    spec: GroupSpec,
    state: State,
}

impl GroupProcessor {
    pub fn new(upstream: Box<Processor>, spec: GroupSpec) -> Self {
        Self {
            upstream,
            spec,
            state: State::Collecting {
                index: HashMap::new(),
                groups: Vec::new(),
            },
        }
    }

    pub fn next(&mut self, out: &mut SearchResult) -> Next {
        loop {
            match &mut self.state {
                State::Collecting { index, groups } => {
                    let mut scratch = SearchResult::default();
                    match self.upstream.next(&mut scratch) {
                        Next::Ok => {
                            let key: Vec<KeyPart> = self.spec.by.iter().map(|k| key_part(scratch.row.get(*k))).collect();
                            let slot = *index.entry(key).or_insert_with(|| {
                                let by_values = self
                                    .spec
                                    .by
                                    .iter()
                                    .map(|k| scratch.row.get(*k).cloned().unwrap_or(RValue::Null))
                                    .collect();
                                let reducers = self.spec.reduce.iter().map(|(_, r)| ReducerAccum::new(r)).collect();
                                groups.push(GroupEntry { by_values, reducers });
                                groups.len() - 1
                            });
                            let entry = &mut groups[slot];
                            for (reducer_accum, (_, reducer_spec)) in entry.reducers.iter_mut().zip(&self.spec.reduce) {
                                reducer_accum.update(reducer_spec, &scratch);
                            }
                            continue;
                        }
                        Next::Paused => return Next::Paused,
                        Next::Error(e) => return Next::Error(e),
                        Next::Eof => {
                            let groups = match std::mem::replace(
                                &mut self.state,
                                State::Draining(VecDeque::new()),
                            ) {
                                State::Collecting { groups, .. } => groups,
                                State::Draining(_) => unreachable!(),
                            };
                            let queue = groups
                                .into_iter()
                                .map(|entry| self.finish_group(entry))
                                .collect();
                            self.state = State::Draining(queue);
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

    fn finish_group(&self, entry: GroupEntry) -> SearchResult {
        let mut result = SearchResult::default();
        for (key, value) in self.spec.by.iter().zip(entry.by_values) {
            result.row.set(*key, value);
        }
        for ((dst, _), accum) in self.spec.reduce.iter().zip(entry.reducers) {
            result.row.set(*dst, accum.finish());
        }
        result
    }
}
