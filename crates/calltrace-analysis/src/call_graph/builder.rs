//! Full build pipeline.
//!
//! parallel extraction → barrier → index → resolve (single-threaded) →
//! materialize functions → entry points → materialize edges.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use calltrace_core::config::CalltraceConfig;
use calltrace_core::errors::CallGraphError;
use calltrace_core::tracing::metrics;
use calltrace_core::traits::CancellationToken;
use calltrace_core::types::collections::FxHashMap;

use crate::parsers::types::ParseResult;

use super::entry_points::EntryPointDetector;
use super::extractor::{ExtractOptions, ExtractedFile, ExtractedFunction};
use super::index::{ImportMap, IndexOptions, ResolutionIndex};
use super::parallel::{ExtractionBatch, ExtractionPool};
use super::resolution::{
    format_low_resolution, format_regression, CallerTally, ResolutionDiagnostics, Resolver,
};
use super::types::{
    BuildReport, BuildStatus, CallEdge, CallGraph, CallGraphStats, EntryPoint, FunctionNode,
};

/// Resolved outgoing calls of one caller.
#[derive(Debug, Clone)]
pub struct CallerResolution {
    /// `(callee id, edge)` in call-site order.
    pub edges: Vec<(String, CallEdge)>,
    pub tally: CallerTally,
}

/// Everything a full build produces. The extraction map and tallies seed
/// later incremental updates.
#[derive(Debug)]
pub struct BuildOutput {
    pub graph: CallGraph,
    pub report: BuildReport,
    pub extractions: BTreeMap<String, Arc<ExtractedFile>>,
    pub tallies: BTreeMap<String, CallerTally>,
    pub imports: ImportMap,
}

/// Builds call graphs from parse results.
#[derive(Debug)]
pub struct CallGraphBuilder {
    config: CalltraceConfig,
    pool: ExtractionPool,
    detector: EntryPointDetector,
}

impl CallGraphBuilder {
    pub fn new(config: &CalltraceConfig) -> Result<Self, CallGraphError> {
        let pool = ExtractionPool::new(config.extraction.effective_threads())?;
        let detector = EntryPointDetector::new(&config.entry_points)?;
        Ok(Self {
            config: config.clone(),
            pool,
            detector,
        })
    }

    pub fn config(&self) -> &CalltraceConfig {
        &self.config
    }

    pub fn detector(&self) -> &EntryPointDetector {
        &self.detector
    }

    pub fn extract(&self, inputs: &[&ParseResult], cancel: &CancellationToken) -> ExtractionBatch {
        let options = ExtractOptions {
            max_syntax_errors: self.config.extraction.max_syntax_errors,
        };
        self.pool.extract_all(inputs, &options, cancel)
    }

    pub fn index(&self, files: &[Arc<ExtractedFile>]) -> Result<ResolutionIndex, CallGraphError> {
        let options = IndexOptions {
            extra_di_markers: self.config.resolution.extra_di_markers.clone(),
        };
        ResolutionIndex::build(files, &options)
    }

    pub fn resolver<'i>(&self, index: &'i ResolutionIndex) -> Resolver<'i> {
        Resolver::new(index, &self.config.resolution)
    }

    /// Full build from scratch.
    pub fn build(
        &self,
        parse_results: &[ParseResult],
        cancel: &CancellationToken,
    ) -> Result<BuildOutput, CallGraphError> {
        let span = tracing::info_span!(
            "build",
            files = parse_results.len(),
            files_failed = tracing::field::Empty,
            functions = tracing::field::Empty,
            edges = tracing::field::Empty,
            resolution_rate = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );
        let _guard = span.enter();
        let start = Instant::now();

        let inputs: Vec<&ParseResult> = parse_results.iter().collect();
        let batch = self.extract(&inputs, cancel);
        let status = batch_status(&batch);
        let ExtractionBatch {
            extracted,
            failures,
            skipped,
        } = batch;
        let files: Vec<Arc<ExtractedFile>> = extracted.into_iter().map(Arc::new).collect();

        let mut output = self.assemble(&files, start)?;
        output.report.status = status;
        output.report.failures = failures;
        output.report.skipped_files = skipped;

        let stats = &output.report.stats;
        span.record(metrics::FILES_FAILED, output.report.failures.len());
        span.record(metrics::FUNCTIONS, stats.total_functions);
        span.record(metrics::EDGES, stats.total_edges);
        span.record(metrics::RESOLUTION_RATE, stats.resolution_rate);
        span.record(metrics::DURATION_MS, stats.build_duration.as_millis() as u64);
        tracing::info!(
            status = status.name(),
            functions = output.report.stats.total_functions,
            edges = output.report.stats.total_edges,
            resolution_rate = output.report.stats.resolution_rate,
            duration_ms = output.report.stats.build_duration.as_millis() as u64,
            "call graph built"
        );
        Ok(output)
    }

    /// Index, resolve and materialize already-extracted files. Used by full
    /// builds and when hydrating from stored extractions.
    pub fn assemble(
        &self,
        files: &[Arc<ExtractedFile>],
        start: Instant,
    ) -> Result<BuildOutput, CallGraphError> {
        // Barrier: every definition is known before anything resolves.
        let index = self.index(files)?;
        let resolver = self.resolver(&index);
        let resolved = resolve_callers(&resolver, index.files().iter().map(|f| f.as_ref()), |_| true);

        let mut graph = CallGraph::new();
        for file in index.files() {
            let entry_points: FxHashMap<String, EntryPoint> =
                self.detector.detect_file(file).into_iter().collect();
            for func in &file.functions {
                let entry = entry_points.get(&func.id).cloned();
                graph.add_function(function_node(file, func, entry));
            }
        }
        let mut tallies = BTreeMap::new();
        for (caller, resolution) in resolved {
            insert_edges(&mut graph, &caller, &resolution.edges)?;
            tallies.insert(caller, resolution.tally);
        }

        let diagnostics = ResolutionDiagnostics::from_tallies(tallies.values());
        let orphans = index.files().iter().map(|f| f.orphan_call_sites).sum();
        let stats = graph_stats(&graph, diagnostics, orphans, start.elapsed());
        let warnings = low_resolution_warnings(&stats.diagnostics, &self.config);

        let imports = index.import_map();
        let extractions = index
            .files()
            .iter()
            .map(|f| (f.file.clone(), Arc::clone(f)))
            .collect();
        Ok(BuildOutput {
            graph,
            report: BuildReport {
                status: BuildStatus::Complete,
                stats,
                failures: Vec::new(),
                skipped_files: Vec::new(),
                warnings,
                update: None,
            },
            extractions,
            tallies,
            imports,
        })
    }
}

pub(crate) fn batch_status(batch: &ExtractionBatch) -> BuildStatus {
    if batch.cancelled() {
        BuildStatus::Cancelled
    } else if !batch.failures.is_empty() {
        BuildStatus::Partial
    } else {
        BuildStatus::Complete
    }
}

/// Resolve the call sites of every caller in `files` accepted by `include`.
/// Callers come out in id order; edges keep call-site order.
pub fn resolve_callers<'a>(
    resolver: &Resolver<'_>,
    files: impl IntoIterator<Item = &'a ExtractedFile>,
    include: impl Fn(&str) -> bool,
) -> BTreeMap<String, CallerResolution> {
    let mut out: BTreeMap<String, CallerResolution> = BTreeMap::new();
    for file in files {
        for call in &file.call_sites {
            if !include(&call.caller) {
                continue;
            }
            let entry = out
                .entry(call.caller.clone())
                .or_insert_with(|| CallerResolution {
                    edges: Vec::new(),
                    tally: CallerTally::new(file.language),
                });
            let resolved = resolver.resolve(call);
            entry.tally.record(resolved.as_ref().map(|r| r.resolution));
            if let Some(r) = resolved {
                entry.edges.push((
                    r.callee_id,
                    CallEdge {
                        resolution: r.resolution,
                        confidence: r.confidence,
                        call_site_line: call.line,
                    },
                ));
            }
        }
    }
    out
}

pub(crate) fn function_node(
    file: &ExtractedFile,
    func: &ExtractedFunction,
    entry_point: Option<EntryPoint>,
) -> FunctionNode {
    FunctionNode {
        id: func.id.clone(),
        file: file.file.clone(),
        name: func.name.clone(),
        qualified_name: func.qualified_name.clone(),
        class_name: func.class_name.clone(),
        language: file.language,
        line: func.line,
        end_line: func.end_line,
        is_exported: func.is_exported,
        signature_hash: func.signature_hash,
        body_hash: func.body_hash,
        return_type: func.return_type.clone(),
        entry_point,
    }
}

/// Insert edges whose endpoints are already present. A missing endpoint
/// would leave a dangling edge and fails the whole operation.
pub(crate) fn insert_edges(
    graph: &mut CallGraph,
    caller: &str,
    edges: &[(String, CallEdge)],
) -> Result<usize, CallGraphError> {
    if !graph.contains(caller) {
        return Err(CallGraphError::GraphMutation {
            message: format!("caller {caller} is not in the graph"),
        });
    }
    let mut added = 0;
    for (callee, edge) in edges {
        if !graph.contains(callee) {
            return Err(CallGraphError::GraphMutation {
                message: format!("callee {callee} of {caller} is not in the graph"),
            });
        }
        if graph.add_edge(caller, callee, *edge) {
            added += 1;
        }
    }
    Ok(added)
}

pub(crate) fn graph_stats(
    graph: &CallGraph,
    diagnostics: ResolutionDiagnostics,
    orphan_call_sites: usize,
    duration: Duration,
) -> CallGraphStats {
    CallGraphStats {
        total_functions: graph.function_count(),
        total_edges: graph.edge_count(),
        entry_points: graph.entry_point_count(),
        files: graph.files().count(),
        resolution_counts: diagnostics.by_strategy.clone(),
        resolution_rate: diagnostics.resolution_rate(),
        build_duration: duration,
        cycles_detected: graph.cycle_count(),
        orphan_call_sites,
        diagnostics,
    }
}

pub(crate) fn low_resolution_warnings(
    diagnostics: &ResolutionDiagnostics,
    config: &CalltraceConfig,
) -> Vec<String> {
    diagnostics
        .low_resolution(config.resolution.effective_low_rate_threshold())
        .into_iter()
        .map(|low| {
            tracing::warn!(
                language = %low.language,
                resolved = low.resolved,
                total = low.total,
                rate = low.rate,
                "low call resolution rate"
            );
            format_low_resolution(low)
        })
        .collect()
}

/// Warn about languages whose rate fell since `previous`.
pub(crate) fn regression_warnings(
    previous: &ResolutionDiagnostics,
    current: &ResolutionDiagnostics,
    config: &CalltraceConfig,
) -> Vec<String> {
    current
        .regressions(previous, config.resolution.effective_regression_tolerance())
        .iter()
        .map(|r| {
            tracing::warn!(
                language = %r.language,
                previous_rate = r.previous_rate,
                current_rate = r.current_rate,
                "call resolution rate regressed"
            );
            format_regression(r)
        })
        .collect()
}
