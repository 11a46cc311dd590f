//! command-handler surface: the entry points a host-side `FT.SEARCH`/`FT.AGGREGATE`/
//! `FT.CURSOR`/`FT.EXPLAIN` dispatcher calls into (§6.1), parameterized over a [`Compiler`]
//! that stands in for the out-of-scope query parser/planner and index/schema lookup.

use crate::{
    areq::AreqBuilder,
    cursor::{LeasedCursor, Registry},
    error::{BadCount, BadCursorId, CursorNotFound, Error, UnknownSubcommand, WrongArity},
    flags::{RequestFlags, StateFlags},
    host::{BufferHost, Host, Reply},
    index::IndexReader,
    plan::Plan,
    row::RLookup,
    serializer::{send_chunk, ChunkOutcome},
};

/// the output of compiling a command's arguments: a resolved schema, a request builder
/// already carrying the right flags (including `IS_CURSOR` if `WITHCURSOR` was present), and
/// the reader the root processor will drive.
///
/// query tokenization and schema/index resolution are both out of scope (§1); this is the
/// seam a real parser/planner would sit behind.
pub struct CompiledRequest {
    pub lookup: RLookup,
    pub builder: AreqBuilder,
    pub reader: Box<dyn IndexReader>,
}

/// stands in for the query compiler and index-open step of the build protocol (§4.2 steps
/// 3 and 5): given already-tokenized arguments, produce a [`CompiledRequest`] or fail with
/// [`crate::error::NoIndex`] / a parse/compile error.
pub trait Compiler {
    fn compile(&self, is_search: bool, index: &str, args: &[&str]) -> Result<CompiledRequest, Error>;
}

fn wrong_arity() -> Reply {
    Reply::Error(WrongArity.to_string())
}

/// `FT.SEARCH <index> <args...>`.
pub fn handle_search(registry: &Registry, compiler: &dyn Compiler, argv: &[&str]) -> Reply {
    execute(registry, compiler, true, argv)
}

/// `FT.AGGREGATE <index> <args...>`.
pub fn handle_aggregate(registry: &Registry, compiler: &dyn Compiler, argv: &[&str]) -> Reply {
    execute(registry, compiler, false, argv)
}

fn execute(registry: &Registry, compiler: &dyn Compiler, is_search: bool, argv: &[&str]) -> Reply {
    if argv.len() < 3 {
        return wrong_arity();
    }
    let index = argv[1];
    let compiled = match compiler.compile(is_search, index, &argv[2..]) {
        Ok(c) => c,
        Err(e) => return Reply::Error(e.to_string()),
    };
    let mut areq = match compiled.builder.build(compiled.lookup, compiled.reader) {
        Ok(a) => a,
        Err(e) => return Reply::Error(e.to_string()),
    };

    if areq.flags().contains(RequestFlags::IS_CURSOR) {
        let max_idle = areq.max_idle().unwrap_or(registry.config().default_max_idle);
        let cursor = match registry.reserve(index, areq, max_idle) {
            Ok(c) => c,
            Err(e) => return Reply::Error(e.to_string()),
        };
        run_cursor(registry, cursor, 0)
    } else {
        let mut host = BufferHost::new();
        if let ChunkOutcome::Error(e) = send_chunk(&mut areq, &mut host, u32::MAX) {
            tracing::warn!(error = %e, "pipeline runtime error during inline execution");
        }
        host.into_reply()
    }
}

/// `FT.CURSOR READ|DEL|GC <index> ...`, dispatched on the uppercased first letter of
/// `argv[1]` per §6's argument layout.
pub fn handle_cursor(registry: &Registry, argv: &[&str]) -> Reply {
    if argv.len() < 2 {
        return wrong_arity();
    }
    match argv[1].chars().next().map(|c| c.to_ascii_uppercase()) {
        Some('R') => cursor_read(registry, argv),
        Some('D') => cursor_del(registry, argv),
        Some('G') => cursor_gc(registry, argv),
        _ => Reply::Error(UnknownSubcommand.to_string()),
    }
}

fn cursor_read(registry: &Registry, argv: &[&str]) -> Reply {
    if argv.len() < 4 {
        return wrong_arity();
    }
    let cid = match argv[3].parse::<i64>() {
        Ok(v) => v,
        Err(_) => return Reply::Error(BadCursorId.to_string()),
    };
    let count = match argv.len() {
        4 => 0,
        6 if argv[4] == "COUNT" => match argv[5].parse::<u32>() {
            Ok(v) => v,
            Err(_) => return Reply::Error(BadCount.to_string()),
        },
        // argv[4] present but not the literal keyword, or a dangling argv[4] with no value:
        // per §4.3.1 this is rejected rather than leniently ignored.
        _ => return Reply::Error(BadCount.to_string()),
    };

    let cursor = match registry.take_for_execution(cid) {
        Ok(c) => c,
        Err(e) => return Reply::Error(e.to_string()),
    };
    reopen_keys(&cursor);
    run_cursor(registry, cursor, count)
}

fn cursor_del(registry: &Registry, argv: &[&str]) -> Reply {
    if argv.len() < 4 {
        return wrong_arity();
    }
    let cid = match argv[3].parse::<i64>() {
        Ok(v) => v,
        Err(_) => return Reply::Error(BadCursorId.to_string()),
    };
    match registry.purge(cid) {
        Ok(()) => Reply::Simple("OK".to_string()),
        Err(e) if e.downcast_ref::<CursorNotFound>().is_some() => {
            Reply::Error(crate::error::CursorAlreadyGone.to_string())
        }
        Err(e) => Reply::Error(e.to_string()),
    }
}

fn cursor_gc(registry: &Registry, argv: &[&str]) -> Reply {
    if argv.len() < 3 {
        return wrong_arity();
    }
    Reply::Integer(registry.collect_idle() as i64)
}

/// re-acquire any host resources released at the previous suspension point. this crate has no
/// real host keys to reopen, so this is a documentation point and a trace event rather than
/// an operation with observable effect — a host binding wiring this crate in would replace
/// this with its actual key-reopen call.
fn reopen_keys(cursor: &LeasedCursor<'_>) {
    tracing::trace!(cursor_id = cursor.id(), "reopening keys before cursor resume");
}

/// run one chunk against a leased cursor and fold its outcome into the `[<chunk>, <next_cid>]`
/// reply shape (§4.4's `runCursor`): dispose on error or `ITER_DONE`, otherwise pause and
/// report the cursor id for the next `CURSOR READ`.
fn run_cursor(registry: &Registry, mut cursor: LeasedCursor<'_>, count: u32) -> Reply {
    let effective = match count {
        0 => cursor
            .areq()
            .chunk_size()
            .unwrap_or(registry.config().default_chunk_size),
        n => n,
    };

    let mut host = BufferHost::new();
    let outcome = send_chunk(cursor.areq_mut(), &mut host, effective);
    if let ChunkOutcome::Error(e) = outcome {
        tracing::warn!(error = %e, cursor_id = cursor.id(), "cursor pipeline runtime error");
    }
    let chunk_reply = host.into_reply();
    let state = cursor.areq().state();

    if state.contains(StateFlags::ERROR) || state.contains(StateFlags::ITER_DONE) {
        cursor.dispose();
        Reply::Array(vec![chunk_reply, Reply::Integer(0)])
    } else {
        let id = cursor.id();
        drop(cursor); // pauses
        Reply::Array(vec![chunk_reply, Reply::Integer(id)])
    }
}

/// a separate entry point that compiles a request but, instead of executing it, renders the
/// compiled plan as a human-readable string against the resolved schema. the request is
/// never built into a pipeline, so there is nothing to dispose.
pub fn explain(compiler: &dyn Compiler, is_search: bool, index: &str, args: &[&str]) -> Result<String, Error> {
    let compiled = compiler.compile(is_search, index, args)?;
    let plan: Plan = compiled.builder.build_plan(&compiled.lookup)?;
    Ok(plan.explain(&compiled.lookup))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{cursor::RegistryConfig, index::VecIndexReader};
    use std::time::Duration;

    /// a test double standing in for the real query parser: every `args` slice is ignored
    /// except its first element, read as a tiny DSL: `"scores:d1=1.5,d2=1.0"` seeds two docs,
    /// `"cursor"` additionally sets `IS_CURSOR` with a chunk size of 2, `"missing"` simulates
    /// `NoIndex`.
    struct FakeCompiler;

    impl Compiler for FakeCompiler {
        fn compile(&self, is_search: bool, index: &str, args: &[&str]) -> Result<CompiledRequest, Error> {
            if index == "missing" {
                return Err(crate::error::NoIndex.into());
            }
            let mut flags = if is_search {
                RequestFlags::IS_SEARCH
            } else {
                RequestFlags::NONE
            };
            let (builder, docs) = if args.first() == Some(&"cursor") {
                flags.insert(RequestFlags::IS_CURSOR);
                let docs = (1..=5).map(|i| (format!("d{i}").into_bytes(), 1.0)).collect();
                (AreqBuilder::new(flags).chunk_size(2), docs)
            } else {
                let docs = vec![(b"d1".to_vec(), 1.5), (b"d2".to_vec(), 1.0)];
                (AreqBuilder::new(flags | RequestFlags::SEND_SCORES | RequestFlags::SEND_NOFIELDS), docs)
            };
            Ok(CompiledRequest {
                lookup: RLookup::new(),
                builder,
                reader: Box::new(VecIndexReader::new(docs)),
            })
        }
    }

    #[test]
    fn search_wrong_arity() {
        let reg = Registry::new(RegistryConfig::default());
        let reply = handle_search(&reg, &FakeCompiler, &["FT.SEARCH"]);
        assert_eq!(reply, Reply::Error(WrongArity.to_string()));
    }

    #[test]
    fn search_missing_index_surfaces_compiler_error() {
        let reg = Registry::new(RegistryConfig::default());
        let reply = handle_search(&reg, &FakeCompiler, &["FT.SEARCH", "missing", "*"]);
        assert_eq!(reply, Reply::Error(crate::error::NoIndex.to_string()));
    }

    #[test]
    fn scenario_s1_search_reply_shape() {
        let reg = Registry::new(RegistryConfig::default());
        let reply = handle_search(&reg, &FakeCompiler, &["FT.SEARCH", "idx", "hello"]);
        assert_eq!(
            reply,
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
    fn scenario_s3_cursor_pagination() {
        let reg = Registry::new(RegistryConfig::default());
        let reply = handle_aggregate(&reg, &FakeCompiler, &["FT.AGGREGATE", "idx", "cursor"]);
        let Reply::Array(top) = reply else { panic!("expected array") };
        assert_eq!(
            top[0],
            Reply::Array(vec![Reply::Integer(5), Reply::Array(vec![]), Reply::Array(vec![])])
        );
        let Reply::Integer(cid) = top[1] else { panic!("expected cursor id") };
        assert_ne!(cid, 0);

        let reply = handle_cursor(&reg, &["FT.CURSOR", "READ", "idx", &cid.to_string(), "COUNT", "2"]);
        let Reply::Array(top) = reply else { panic!("expected array") };
        let Reply::Integer(cid2) = top[1] else { panic!("expected cursor id") };
        assert_eq!(cid2, cid);

        let reply = handle_cursor(&reg, &["FT.CURSOR", "READ", "idx", &cid.to_string(), "COUNT", "2"]);
        let Reply::Array(top) = reply else { panic!("expected array") };
        assert_eq!(top[1], Reply::Integer(0));

        let reply = handle_cursor(&reg, &["FT.CURSOR", "DEL", "idx", &cid.to_string()]);
        assert_eq!(reply, Reply::Error(crate::error::CursorAlreadyGone.to_string()));
    }

    #[test]
    fn scenario_s4_cursor_cap() {
        let reg = Registry::new(RegistryConfig::default().per_index_cap(1));
        let first = handle_aggregate(&reg, &FakeCompiler, &["FT.AGGREGATE", "idx", "cursor"]);
        assert!(matches!(first, Reply::Array(_)));
        assert_eq!(reg.count("idx"), 1);

        let second = handle_aggregate(&reg, &FakeCompiler, &["FT.AGGREGATE", "idx", "cursor"]);
        assert_eq!(second, Reply::Error(crate::error::CursorCapExceeded.to_string()));
        assert_eq!(reg.count("idx"), 1);
    }

    #[test]
    fn scenario_s5_idle_gc() {
        struct ShortIdleCompiler;
        impl Compiler for ShortIdleCompiler {
            fn compile(&self, _is_search: bool, _index: &str, _args: &[&str]) -> Result<CompiledRequest, Error> {
                Ok(CompiledRequest {
                    lookup: RLookup::new(),
                    builder: AreqBuilder::new(RequestFlags::IS_CURSOR | RequestFlags::SEND_NOFIELDS)
                        .chunk_size(2)
                        .max_idle(Duration::from_millis(1)),
                    reader: Box::new(VecIndexReader::new([
                        (b"d1".to_vec(), 1.0),
                        (b"d2".to_vec(), 1.0),
                        (b"d3".to_vec(), 1.0),
                    ])),
                })
            }
        }

        let reg = Registry::new(RegistryConfig::default());
        let reply = handle_aggregate(&reg, &ShortIdleCompiler, &["FT.AGGREGATE", "idx", "cursor"]);
        let Reply::Array(top) = reply else { panic!("expected array") };
        let Reply::Integer(cid) = top[1] else { panic!("expected cursor id") };
        assert_ne!(cid, 0);

        std::thread::sleep(Duration::from_millis(5));
        let gc = handle_cursor(&reg, &["FT.CURSOR", "GC", "idx"]);
        assert_eq!(gc, Reply::Integer(1));
        assert_eq!(handle_cursor(&reg, &["FT.CURSOR", "GC", "idx"]), Reply::Integer(0));

        let read = handle_cursor(&reg, &["FT.CURSOR", "READ", "idx", &cid.to_string()]);
        assert_eq!(read, Reply::Error(CursorNotFound.to_string()));
    }

    #[test]
    fn count_without_literal_keyword_is_rejected() {
        let reg = Registry::new(RegistryConfig::default());
        let reply = handle_aggregate(&reg, &FakeCompiler, &["FT.AGGREGATE", "idx", "cursor"]);
        let Reply::Array(top) = reply else { panic!("expected array") };
        let Reply::Integer(cid) = top[1] else { panic!("expected cursor id") };

        let reply = handle_cursor(&reg, &["FT.CURSOR", "READ", "idx", &cid.to_string(), "LIMIT", "2"]);
        assert_eq!(reply, Reply::Error(BadCount.to_string()));
    }

    #[test]
    fn explain_builds_no_pipeline() {
        let plan = explain(&FakeCompiler, true, "idx", &["hello"]).unwrap();
        assert!(plan.contains("SEARCH"));
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        let reg = Registry::new(RegistryConfig::default());
        let reply = handle_cursor(&reg, &["FT.CURSOR", "WAT", "idx", "1"]);
        assert_eq!(reply, Reply::Error(UnknownSubcommand.to_string()));
    }
}
