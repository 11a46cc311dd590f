//! the reply serializer: encodes one batch (`send_chunk`) and one result
//! (`serialize_result`) onto a [`Host`], per the flag-controlled layout in §4.3.

use crate::{
    areq::Areq,
    error::Error,
    flags::{RequestFlags, StateFlags},
    host::Host,
    plan::ArrangeStep,
    result::SearchResult,
    row::{RLookup, RLookupKeyFlags},
    value::RValue,
};

/// `sendChunk`'s outcome, reported back to the caller (inline execution, or the cursor read
/// flow) so it can decide what to do next — dispose a cursor, log a runtime error, and so on.
/// `state()` on the request is the authoritative record; this exists to hand the triggering
/// error, if any, to the caller for logging without cloning it onto the request.
pub enum ChunkOutcome {
    /// the chunk was produced; check `areq.state()` for `ITER_DONE`.
    Done,
    /// a pipeline stage failed. `ITER_DONE` is *not* set; `ERROR` is.
    Error(Error),
}

/// produce one batch reply: `[total_results, (result_section...)*]`, closing the array with
/// the count of elements actually written.
///
/// cooperative yields (`Next::Paused`) from the deepest stage are retried transparently here
/// — they represent the host having released and needing to reopen a key mid-scan, which is
/// internal plumbing this crate models as an immediate retry rather than a round-trip exposed
/// to `send_chunk`'s caller (see DESIGN.md's "mid-chunk Paused" entry for the reasoning).
pub fn send_chunk(areq: &mut Areq, host: &mut impl Host, limit: u32) -> ChunkOutcome {
    host.open_array();

    let first = pull(areq);
    host.push_integer(areq.total_results() as i64);

    let mut rows_emitted = 0u32;
    let mut outcome = ChunkOutcome::Done;

    match first {
        PullOutcome::Ok(result) => {
            if limit > 0 && !areq.flags().contains(RequestFlags::NOROWS) {
                serialize_result(host, areq.flags(), areq.arrange(), areq.lookup(), &result);
                rows_emitted += 1;
            }
        }
        PullOutcome::Eof => areq.mark(StateFlags::ITER_DONE),
        PullOutcome::Error(e) => {
            areq.mark(StateFlags::ERROR);
            outcome = ChunkOutcome::Error(e);
        }
    }

    if matches!(outcome, ChunkOutcome::Done) && !areq.state().contains(StateFlags::ITER_DONE) {
        while rows_emitted < limit {
            match pull(areq) {
                PullOutcome::Ok(result) => {
                    serialize_result(host, areq.flags(), areq.arrange(), areq.lookup(), &result);
                    rows_emitted += 1;
                }
                PullOutcome::Eof => {
                    areq.mark(StateFlags::ITER_DONE);
                    break;
                }
                PullOutcome::Error(e) => {
                    areq.mark(StateFlags::ERROR);
                    outcome = ChunkOutcome::Error(e);
                    break;
                }
            }
        }
    }

    host.close_array();
    outcome
}

enum PullOutcome {
    Ok(SearchResult),
    Eof,
    Error(Error),
}

/// pull exactly one populated result from the pipeline, transparently absorbing any number of
/// cooperative yields along the way.
fn pull(areq: &mut Areq) -> PullOutcome {
    loop {
        let mut out = SearchResult::default();
        match areq.next(&mut out) {
            crate::processor::Next::Ok => return PullOutcome::Ok(out),
            crate::processor::Next::Eof => return PullOutcome::Eof,
            crate::processor::Next::Paused => continue,
            crate::processor::Next::Error(e) => return PullOutcome::Error(e),
        }
    }
}

/// emit one result's sections, in the fixed order of §4.3's table, each gated by its flag.
pub fn serialize_result(
    host: &mut impl Host,
    flags: RequestFlags,
    arrange: Option<&ArrangeStep>,
    lookup: &RLookup,
    r: &SearchResult,
) {
    if flags.contains(RequestFlags::IS_SEARCH) {
        if let Some(key) = &r.key {
            host.push_bulk(key.clone());
        }
    }
    if flags.contains(RequestFlags::SEND_SCORES) {
        host.push_double(r.score);
    }
    if flags.contains(RequestFlags::SEND_PAYLOADS) {
        match &r.payload {
            Some(p) => host.push_bulk(p.clone()),
            None => host.push_null(),
        }
    }
    if flags.contains(RequestFlags::SEND_SORTKEYS) {
        match sort_key_value(arrange, lookup, r).and_then(|v| encode_sort_key(&v)) {
            Some(bytes) => host.push_bulk(bytes),
            None => host.push_null(),
        }
    }
    if !flags.contains(RequestFlags::SEND_NOFIELDS) {
        host.open_array();
        for key in lookup.visible_fields() {
            host.push_simple(lookup.name(key));
            match r.row.get(key) {
                Some(v) => push_rvalue(host, v),
                None => host.push_null(),
            }
        }
        host.close_array();
    }
}

fn push_rvalue(host: &mut impl Host, v: &RValue) {
    match v {
        RValue::Number(n) => host.push_double(*n),
        RValue::String(s) => host.push_bulk(s.clone()),
        RValue::HostString(s) => host.push_bulk(s.as_bytes().to_vec()),
        RValue::Null => host.push_null(),
        RValue::Array(items) => {
            host.open_array();
            for item in items {
                push_rvalue(host, item);
            }
            host.close_array();
        }
    }
}

/// the arrange step's primary sort key, read from the packed sort-vector if the key is
/// `SortVectorSource`-flagged, otherwise from the row map. no arrange step ⇒ no sort key.
fn sort_key_value(arrange: Option<&ArrangeStep>, lookup: &RLookup, r: &SearchResult) -> Option<RValue> {
    let key = arrange?.primary_sort_key()?;
    if lookup.flags(key).contains(RLookupKeyFlags::SORT_VECTOR_SOURCE) {
        lookup.svidx(key).and_then(|i| r.sort_vector.get(i)).cloned()
    } else {
        r.row.get(key).cloned()
    }
}

/// wire-compatible sort-key encoding (§4.3): a `"#"` prefix for numbers, `"$"` for strings,
/// disambiguated by the client/coordinator reading the prefix byte back off the wire.
fn encode_sort_key(v: &RValue) -> Option<Vec<u8>> {
    match v {
        RValue::Number(n) => Some(format!("#{}", format_f64_17(*n)).into_bytes()),
        RValue::String(s) => Some([b"$".as_slice(), s].concat()),
        RValue::HostString(s) => Some([b"$".as_slice(), s.as_bytes()].concat()),
        RValue::Array(_) | RValue::Null => None,
    }
}

/// `%.17e`-equivalent rendering (17 significant digits past the decimal point, always-signed
/// two-digit-minimum exponent) matching the wire format clients expect, e.g. `2.5` →
/// `"2.50000000000000000e+00"`.
fn format_f64_17(v: f64) -> String {
    let rendered = format!("{v:.17e}");
    let (mantissa, exp) = rendered.split_once('e').expect("Rust's {:e} always emits an exponent");
    let exp: i32 = exp.parse().expect("Rust's {:e} exponent is always a bare integer");
    format!("{mantissa}e{exp:+03}")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{host::BufferHost, host::Reply, index::VecIndexReader};

    fn areq_with(flags: RequestFlags, reader: VecIndexReader) -> Areq {
        crate::areq::AreqBuilder::new(flags)
            .build(RLookup::new(), Box::new(reader))
            .unwrap()
    }

    #[test]
    fn sort_number_encoding_matches_wire_format() {
        assert_eq!(format_f64_17(2.5), "2.50000000000000000e+00");
    }

    /// §8's testable property 4: `parse_back(serialize(v)) == v` for numeric and string
    /// domains, disambiguated by the `"#"`/`"$"` prefix per §4.3.
    #[test]
    fn sort_key_round_trips_for_numeric_and_string_domains() {
        for v in [0.0, -2.5, 3.14159, 1.0e100, -1.0e-100] {
            let encoded = encode_sort_key(&RValue::Number(v)).unwrap();
            let (prefix, rest) = encoded.split_first().unwrap();
            assert_eq!(*prefix, b'#');
            let parsed: f64 = std::str::from_utf8(rest).unwrap().parse().unwrap();
            assert_eq!(parsed, v);
        }

        for s in [b"alice".to_vec(), b"".to_vec(), b"with spaces".to_vec()] {
            let encoded = encode_sort_key(&RValue::String(s.clone())).unwrap();
            let (prefix, rest) = encoded.split_first().unwrap();
            assert_eq!(*prefix, b'$');
            assert_eq!(rest, s.as_slice());
        }

        let host_string: std::sync::Arc<str> = std::sync::Arc::from("bob");
        let encoded = encode_sort_key(&RValue::HostString(host_string.clone())).unwrap();
        let (prefix, rest) = encoded.split_first().unwrap();
        assert_eq!(*prefix, b'$');
        assert_eq!(rest, host_string.as_bytes());
    }

    #[test]
    fn eof_on_first_pull_is_bare_total() {
        let mut areq = areq_with(RequestFlags::IS_SEARCH, VecIndexReader::new([]));
        let mut host = BufferHost::new();
        assert!(matches!(send_chunk(&mut areq, &mut host, 10), ChunkOutcome::Done));
        assert_eq!(host.into_reply(), Reply::Array(vec![Reply::Integer(0)]));
        assert!(areq.state().contains(StateFlags::ITER_DONE));
    }

    #[test]
    fn limit_zero_emits_only_total() {
        let mut areq = areq_with(RequestFlags::IS_SEARCH, VecIndexReader::new([(b"d1".to_vec(), 1.0)]));
        let mut host = BufferHost::new();
        send_chunk(&mut areq, &mut host, 0);
        assert_eq!(host.into_reply(), Reply::Array(vec![Reply::Integer(1)]));
    }

    #[test]
    fn scenario_s1_simple_search_with_scores() {
        let mut areq = areq_with(
            RequestFlags::IS_SEARCH | RequestFlags::SEND_SCORES | RequestFlags::SEND_NOFIELDS,
            VecIndexReader::new([(b"d1".to_vec(), 1.5), (b"d2".to_vec(), 1.0)]),
        );
        let mut host = BufferHost::new();
        send_chunk(&mut areq, &mut host, 10);
        assert_eq!(
            host.into_reply(),
            Reply::Array(vec![
                Reply::Integer(2),
                Reply::Bulk(b"d1".to_vec()),
                Reply::Double(1.5),
                Reply::Bulk(b"d2".to_vec()),
                Reply::Double(1.0),
            ])
        );
    }

    #[test]
    fn hidden_field_is_excluded_from_field_block() {
        let mut lookup = RLookup::new();
        let a = lookup.define("a", RLookupKeyFlags::NONE);
        let b = lookup.define("b", RLookupKeyFlags::HIDDEN);

        let mut areq = crate::areq::AreqBuilder::new(RequestFlags::NONE)
            .project(vec![
                crate::plan::ProjectExpr {
                    dst: a,
                    kind: crate::plan::ProjectKind::Constant(RValue::from("x")),
                },
                crate::plan::ProjectExpr {
                    dst: b,
                    kind: crate::plan::ProjectKind::Constant(RValue::from("y")),
                },
            ])
            .build(lookup, Box::new(VecIndexReader::new([(b"d1".to_vec(), 1.0)])))
            .unwrap();
        let mut host = BufferHost::new();
        send_chunk(&mut areq, &mut host, 10);
        let Reply::Array(top) = host.into_reply() else { panic!("expected array") };
        let Reply::Array(fields) = &top[1] else { panic!("expected field block") };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0], Reply::Simple("a".into()));
    }
}
