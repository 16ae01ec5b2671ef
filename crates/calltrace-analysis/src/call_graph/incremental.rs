//! Incremental call graph updates: re-extract only changed files, re-resolve
//! only the callers whose resolution can have changed.
//!
//! Every update works on a copy of the engine state. The copy is installed
//! only after every step, including persistence, has succeeded, so a failed
//! update leaves the previous graph in place.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use calltrace_core::config::CalltraceConfig;
use calltrace_core::errors::{CallGraphError, ExtractionError, StorageError};
use calltrace_core::tracing::metrics;
use calltrace_core::traits::{CancellationToken, ExtractionRecord, GraphStore};
use calltrace_core::types::collections::FxHashMap;

use crate::parsers::types::ParseResult;
use crate::scanner::types::{normalize_path_str, ScanDiff};

use super::builder::{
    function_node, graph_stats, insert_edges, low_resolution_warnings, regression_warnings,
    resolve_callers, BuildOutput, CallGraphBuilder,
};
use super::extractor::ExtractedFile;
use super::index::ImportMap;
use super::invalidation::{Extractions, InvalidationPlan, PlanInput};
use super::parallel::ExtractionBatch;
use super::persistence::{self, IncrementalChanges};
use super::resolution::{CallerTally, ResolutionDiagnostics};
use super::types::{
    BuildReport, BuildStatus, CallGraph, EntryPoint, ExtractionFailure, UpdateSummary,
};

/// Where an incremental update currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdatePhase {
    Idle,
    Invalidating,
    ReExtracting,
    ReResolving,
    ReResolvingIncoming,
    Applying,
}

impl UpdatePhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Invalidating => "invalidating",
            Self::ReExtracting => "re_extracting",
            Self::ReResolving => "re_resolving",
            Self::ReResolvingIncoming => "re_resolving_incoming",
            Self::Applying => "applying",
        }
    }
}

/// Everything needed to continue incrementally from the last build.
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    pub graph: Arc<CallGraph>,
    pub extractions: Extractions,
    /// Call-site outcomes per caller id.
    pub tallies: BTreeMap<String, CallerTally>,
    pub imports: ImportMap,
    pub diagnostics: ResolutionDiagnostics,
}

impl From<BuildOutput> for EngineState {
    fn from(out: BuildOutput) -> Self {
        Self {
            diagnostics: out.report.stats.diagnostics.clone(),
            graph: Arc::new(out.graph),
            extractions: out.extractions,
            tallies: out.tallies,
            imports: out.imports,
        }
    }
}

/// Incremental call graph manager.
///
/// Maintains a call graph and updates it incrementally when files change.
#[derive(Debug)]
pub struct IncrementalCallGraph {
    builder: CallGraphBuilder,
    state: EngineState,
    phase: UpdatePhase,
    /// Phases entered by the most recent update, in order.
    phase_log: Vec<UpdatePhase>,
    /// Graph and extractions were dropped after persisting; the store holds
    /// the only copy until the next reload.
    released: bool,
}

impl IncrementalCallGraph {
    pub fn new(config: &CalltraceConfig) -> Result<Self, CallGraphError> {
        Ok(Self {
            builder: CallGraphBuilder::new(config)?,
            state: EngineState::default(),
            phase: UpdatePhase::Idle,
            phase_log: Vec::new(),
            released: false,
        })
    }

    pub fn graph(&self) -> &Arc<CallGraph> {
        &self.state.graph
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn builder(&self) -> &CallGraphBuilder {
        &self.builder
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    pub fn last_phases(&self) -> &[UpdatePhase] {
        &self.phase_log
    }

    /// Drop the graph, extractions and tallies. Only call this once a store
    /// holds the current state: the next `update` reloads from it. The
    /// resolution diagnostics are kept for regression checks.
    pub fn release(&mut self) {
        let diagnostics = std::mem::take(&mut self.state.diagnostics);
        self.state = EngineState {
            diagnostics,
            ..EngineState::default()
        };
        self.released = true;
        tracing::debug!("in-memory call graph released");
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    fn reload(&mut self, store: Option<&dyn GraphStore>) -> Result<(), CallGraphError> {
        let Some(store) = store else {
            return Err(CallGraphError::Storage(StorageError::Unavailable {
                message: "released call graph needs its store to reload".to_string(),
            }));
        };
        let records = store.load_extractions(None)?;
        self.hydrate(&records)?;
        Ok(())
    }

    fn enter(&mut self, phase: UpdatePhase) {
        tracing::debug!(from = self.phase.name(), to = phase.name(), "update phase");
        self.phase = phase;
        self.phase_log.push(phase);
    }

    /// Full build from scratch. Replaces the stored graph when a store is
    /// given; the new state is installed only after the store accepted it.
    pub fn full_build(
        &mut self,
        parse_results: &[ParseResult],
        cancel: &CancellationToken,
        store: Option<&dyn GraphStore>,
    ) -> Result<BuildReport, CallGraphError> {
        self.phase_log.clear();
        let mut out = self.builder.build(parse_results, cancel)?;
        out.report.warnings.extend(regression_warnings(
            &self.state.diagnostics,
            &out.report.stats.diagnostics,
            self.builder.config(),
        ));
        if let Some(store) = store {
            let changeset = persistence::full_changeset(&out.graph, &out.extractions)?;
            tracing::debug!(rows = changeset.row_count(), "persisting full build");
            store.apply_changeset(changeset)?;
        }
        let report = out.report.clone();
        self.state = EngineState::from(out);
        self.released = false;
        Ok(report)
    }

    /// Rebuild the in-memory state from stored extraction payloads without
    /// re-parsing anything.
    pub fn hydrate(&mut self, records: &[ExtractionRecord]) -> Result<BuildReport, CallGraphError> {
        let span = tracing::info_span!("hydrate", files = records.len());
        let _guard = span.enter();
        let start = Instant::now();
        let files = records
            .iter()
            .map(|r| persistence::decode_extraction(r).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        let out = self.builder.assemble(&files, start)?;
        let report = out.report.clone();
        self.state = EngineState::from(out);
        self.released = false;
        tracing::info!(
            functions = report.stats.total_functions,
            edges = report.stats.total_edges,
            "call graph hydrated from storage"
        );
        Ok(report)
    }

    /// Apply a file diff. `parse_results` must cover every added and
    /// modified file; entries for other files are ignored.
    pub fn update(
        &mut self,
        diff: &ScanDiff,
        parse_results: &[ParseResult],
        cancel: &CancellationToken,
        store: Option<&dyn GraphStore>,
    ) -> Result<BuildReport, CallGraphError> {
        let span = tracing::info_span!(
            "update",
            added = diff.added.len(),
            modified = diff.modified.len(),
            removed = diff.removed.len(),
            incoming_reresolved = tracing::field::Empty,
            functions = tracing::field::Empty,
            edges = tracing::field::Empty,
        );
        let _guard = span.enter();
        self.phase_log.clear();
        if self.released {
            self.reload(store)?;
        }
        let result = self.run_update(diff, parse_results, cancel, store);
        self.enter(UpdatePhase::Idle);
        if let Ok(report) = &result {
            if let Some(summary) = &report.update {
                span.record(metrics::INCOMING_RERESOLVED, summary.incoming_reresolved);
            }
            span.record(metrics::FUNCTIONS, report.stats.total_functions);
            span.record(metrics::EDGES, report.stats.total_edges);
        }
        if let Err(e) = &result {
            tracing::error!(error = %e, "incremental update failed; previous graph kept");
        }
        result
    }

    fn run_update(
        &mut self,
        diff: &ScanDiff,
        parse_results: &[ParseResult],
        cancel: &CancellationToken,
        store: Option<&dyn GraphStore>,
    ) -> Result<BuildReport, CallGraphError> {
        let start = Instant::now();
        let previous = self.state.clone();

        // Step 1: decide what goes. Nothing is removed from the live state;
        // the new universe is staged next to it.
        self.enter(UpdatePhase::Invalidating);
        let parsed: FxHashMap<String, &ParseResult> = parse_results
            .iter()
            .map(|pr| (normalize_path_str(&pr.file), pr))
            .collect();
        let mut removed: BTreeSet<String> = diff
            .removed_keys()
            .into_iter()
            .filter(|f| previous.extractions.contains_key(f))
            .collect();
        let targets: BTreeSet<String> = diff
            .added_keys()
            .into_iter()
            .chain(diff.modified_keys())
            .collect();
        removed.retain(|f| !targets.contains(f));

        let mut failures: Vec<ExtractionFailure> = Vec::new();
        let mut inputs: Vec<&ParseResult> = Vec::with_capacity(targets.len());
        for file in &targets {
            match parsed.get(file) {
                Some(pr) => inputs.push(*pr),
                None => {
                    tracing::warn!(file = %file, "no parse result for changed file");
                    failures.push(ExtractionFailure {
                        file: file.clone(),
                        error: ExtractionError::MissingParseResult { file: file.clone() },
                    });
                    if previous.extractions.contains_key(file) {
                        removed.insert(file.clone());
                    }
                }
            }
        }

        // Step 2: re-extract added and modified files.
        self.enter(UpdatePhase::ReExtracting);
        let batch = self.builder.extract(&inputs, cancel);
        let cancelled = batch.cancelled();
        let ExtractionBatch {
            extracted,
            failures: extract_failures,
            skipped,
        } = batch;
        for failure in &extract_failures {
            // A modified file that no longer extracts drops out, as it would
            // from a full build.
            if previous.extractions.contains_key(&failure.file) {
                removed.insert(failure.file.clone());
            }
        }
        failures.extend(extract_failures);
        if cancelled {
            tracing::info!(skipped = skipped.len(), "update cancelled; skipped files keep their previous version");
        }

        let fresh: Vec<Arc<ExtractedFile>> = extracted.into_iter().map(Arc::new).collect();
        let mut extractions = previous.extractions.clone();
        for file in &removed {
            extractions.remove(file);
        }
        for ef in &fresh {
            extractions.insert(ef.file.clone(), Arc::clone(ef));
        }
        let changed: BTreeSet<String> = removed
            .iter()
            .cloned()
            .chain(fresh.iter().map(|f| f.file.clone()))
            .collect();

        // Step 3: index the new universe. Unchanged files rejoin from their
        // stored extraction.
        let files: Vec<Arc<ExtractedFile>> = extractions.values().cloned().collect();
        let index = self.builder.index(&files)?;
        let imports = index.import_map();
        let plan = InvalidationPlan::compute(&PlanInput {
            old: &previous.extractions,
            new: &extractions,
            old_imports: &previous.imports,
            new_imports: &imports,
            changed_files: &changed,
            extra_di_markers: &self.builder.config().resolution.extra_di_markers,
        });
        let resolver = self.builder.resolver(&index);

        // Step 4: resolve every call site of the changed files.
        self.enter(UpdatePhase::ReResolving);
        let fresh_resolved = resolve_callers(&resolver, fresh.iter().map(|f| f.as_ref()), |_| true);

        // Step 5: callers elsewhere whose targets may have moved.
        self.enter(UpdatePhase::ReResolvingIncoming);
        let unchanged: Vec<&ExtractedFile> = extractions
            .iter()
            .filter(|(file, _)| !changed.contains(*file))
            .map(|(_, ef)| ef.as_ref())
            .collect();
        let incoming = plan.incoming_callers(unchanged.iter().copied());
        let incoming_resolved =
            resolve_callers(&resolver, unchanged.iter().copied(), |c| incoming.contains(c));

        // Step 6: apply to a copy of the graph.
        self.enter(UpdatePhase::Applying);
        let mut graph = (*previous.graph).clone();
        let old_ids: BTreeSet<String> = changed
            .iter()
            .filter_map(|f| previous.extractions.get(f))
            .flat_map(|ef| ef.functions.iter().map(|f| f.id.clone()))
            .collect();
        let new_ids: BTreeSet<String> = fresh
            .iter()
            .flat_map(|ef| ef.functions.iter().map(|f| f.id.clone()))
            .collect();
        let removed_functions: Vec<String> = old_ids.difference(&new_ids).cloned().collect();
        for id in &removed_functions {
            graph.remove_function(id);
        }

        let mut summary = UpdateSummary {
            files_added: fresh
                .iter()
                .filter(|f| !previous.extractions.contains_key(&f.file))
                .count(),
            files_modified: fresh
                .iter()
                .filter(|f| previous.extractions.contains_key(&f.file))
                .count(),
            files_removed: removed.len(),
            functions_removed: removed_functions.len(),
            signature_changes: plan.signature_changes,
            incoming_reresolved: incoming.len(),
            ..Default::default()
        };
        for ef in &fresh {
            let entries: FxHashMap<String, EntryPoint> =
                self.builder.detector().detect_file(ef).into_iter().collect();
            for func in &ef.functions {
                let node = function_node(ef, func, entries.get(&func.id).cloned());
                match graph.function(&func.id).map(|existing| *existing != node) {
                    Some(differs) => {
                        if differs {
                            summary.functions_updated += 1;
                        }
                        graph.remove_outgoing_edges(&func.id);
                    }
                    None => summary.functions_added += 1,
                }
                graph.add_function(node);
            }
        }
        for caller in &incoming {
            graph.remove_outgoing_edges(caller);
        }

        let mut tallies = previous.tallies.clone();
        for id in old_ids.iter().chain(incoming.iter()) {
            tallies.remove(id);
        }
        let mut reresolved: BTreeSet<String> = BTreeSet::new();
        for (caller, resolution) in fresh_resolved.into_iter().chain(incoming_resolved) {
            insert_edges(&mut graph, &caller, &resolution.edges)?;
            tallies.insert(caller.clone(), resolution.tally);
            reresolved.insert(caller);
        }

        let diagnostics = ResolutionDiagnostics::from_tallies(tallies.values());
        let orphans = extractions.values().map(|f| f.orphan_call_sites).sum();
        let stats = graph_stats(&graph, diagnostics, orphans, start.elapsed());
        let mut warnings = low_resolution_warnings(&stats.diagnostics, self.builder.config());
        warnings.extend(regression_warnings(
            &previous.diagnostics,
            &stats.diagnostics,
            self.builder.config(),
        ));

        if let Some(store) = store {
            let changeset = persistence::incremental_changeset(
                &graph,
                &IncrementalChanges {
                    changed_files: &changed,
                    removed_functions: &removed_functions,
                    fresh: &fresh,
                    reresolved: &reresolved,
                },
            )?;
            tracing::debug!(rows = changeset.row_count(), "persisting update");
            store.apply_changeset(changeset)?;
        }

        let status = if cancelled {
            BuildStatus::Cancelled
        } else if !failures.is_empty() {
            BuildStatus::Partial
        } else {
            BuildStatus::Complete
        };
        tracing::info!(
            status = status.name(),
            added = summary.files_added,
            modified = summary.files_modified,
            removed = summary.files_removed,
            incoming_reresolved = summary.incoming_reresolved,
            functions = stats.total_functions,
            edges = stats.total_edges,
            duration_ms = stats.build_duration.as_millis() as u64,
            "call graph updated"
        );

        self.state = EngineState {
            graph: Arc::new(graph),
            extractions,
            tallies,
            imports,
            diagnostics: stats.diagnostics.clone(),
        };
        Ok(BuildReport {
            status,
            stats,
            failures,
            skipped_files: skipped,
            warnings,
            update: Some(summary),
        })
    }
}
