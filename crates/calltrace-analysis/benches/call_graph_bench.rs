//! Call graph benchmarks: full build, single-file incremental update, and
//! in-memory reachability over a synthetic project.
//!
//! Run with: cargo bench -p calltrace-analysis --bench call_graph_bench

use std::path::PathBuf;

use calltrace_analysis::call_graph::IncrementalCallGraph;
use calltrace_analysis::parsers::types::{CallSite, FunctionInfo, ImportInfo, ImportSpecifier};
use calltrace_analysis::parsers::ParseResult;
use calltrace_analysis::query;
use calltrace_analysis::scanner::ScanDiff;
use calltrace_core::config::CalltraceConfig;
use calltrace_core::traits::{CancellationToken, TraversalDirection};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

const FUNCTIONS_PER_FILE: usize = 8;

/// File `i` exports eight functions; each calls its same-file successor,
/// and the first calls into file `i + 1` through an import.
fn file(i: usize, files: usize, body: u64) -> ParseResult {
    let mut pr = ParseResult::new(format!("src/mod{:03}/file{i}.ts", i / 50));
    for j in 0..FUNCTIONS_PER_FILE {
        let line = (j * 10 + 1) as u32;
        let mut f = FunctionInfo::new(format!("fn{i}_{j}"), line, line + 6);
        f.is_exported = true;
        f.signature_hash = (i * 100 + j) as u64;
        f.body_hash = body;
        pr.functions.push(f);
        if j + 1 < FUNCTIONS_PER_FILE {
            pr.call_sites
                .push(CallSite::new(format!("fn{i}_{}", j + 1), line + 1));
        }
    }
    let next = (i + 1) % files;
    let target = format!("fn{next}_0");
    pr.imports = vec![ImportInfo {
        source: format!("../mod{:03}/file{next}", next / 50),
        specifiers: [ImportSpecifier {
            name: target.clone(),
            alias: None,
        }]
        .into_iter()
        .collect(),
        ..Default::default()
    }];
    pr.call_sites.push(CallSite::new(target, 2));
    // An unqualified call into an unrelated file: export-based.
    pr.call_sites
        .push(CallSite::new(format!("fn{}_3", (i + 7) % files), 12));
    pr
}

fn project(files: usize) -> Vec<ParseResult> {
    (0..files).map(|i| file(i, files, 1)).collect()
}

fn engine() -> IncrementalCallGraph {
    IncrementalCallGraph::new(&CalltraceConfig::default()).unwrap()
}

fn full_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_build");
    group.sample_size(10);

    for files in [100, 1000] {
        let sources = project(files);
        group.bench_with_input(BenchmarkId::new("files", files), &sources, |b, sources| {
            b.iter(|| {
                let mut engine = engine();
                engine
                    .full_build(sources, &CancellationToken::new(), None)
                    .unwrap();
            });
        });
    }
    group.finish();
}

fn incremental_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("incremental_update");
    group.sample_size(10);

    let files = 1000;
    let token = CancellationToken::new();
    let mut engine = engine();
    engine.full_build(&project(files), &token, None).unwrap();

    let target = 500;
    let path = PathBuf::from(format!("src/mod{:03}/file{target}.ts", target / 50));
    let diff = ScanDiff {
        modified: vec![path],
        ..Default::default()
    };

    // Alternate body hashes so every iteration is a real change.
    let body_edit = [file(target, files, 2), file(target, files, 3)];
    let mut flip = 0;
    group.bench_function("body_only", |b| {
        b.iter(|| {
            flip ^= 1;
            engine
                .update(&diff, std::slice::from_ref(&body_edit[flip]), &token, None)
                .unwrap();
        });
    });

    let mut signature_edits = [file(target, files, 1), file(target, files, 1)];
    signature_edits[1].functions[0].signature_hash = u64::MAX;
    group.bench_function("signature_change", |b| {
        b.iter(|| {
            flip ^= 1;
            engine
                .update(&diff, std::slice::from_ref(&signature_edits[flip]), &token, None)
                .unwrap();
        });
    });
    group.finish();
}

fn reachability(c: &mut Criterion) {
    let mut group = c.benchmark_group("reachability");
    let mut engine = engine();
    engine
        .full_build(&project(1000), &CancellationToken::new(), None)
        .unwrap();
    let graph = engine.graph().clone();

    for depth in [3_u32, 10] {
        group.bench_with_input(BenchmarkId::new("depth", depth), &depth, |b, &depth| {
            b.iter(|| {
                query::reachable(&graph, "src/mod000/file0.ts::fn0_0", TraversalDirection::Forward, depth)
                    .unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, full_build, incremental_update, reachability);
criterion_main!(benches);
