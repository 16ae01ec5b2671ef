//! CallGraphService: owns the incremental engine, publishes immutable graph
//! snapshots to readers, and answers queries with caching and an optional
//! storage fallback for very large graphs.
//!
//! Writers (build, update) are serialized by the engine mutex. Readers clone
//! the current snapshot `Arc` under a short read lock and never block on a
//! running build.
//!
//! With a store attached, a graph above `query.in_memory_threshold` is not
//! kept in memory at all: the engine releases it after persisting, every
//! query goes to storage, and the next update reloads it from the store.

use std::sync::{Arc, Mutex, RwLock};

use calltrace_core::config::CalltraceConfig;
use calltrace_core::constants::MAX_PAGE_SIZE;
use calltrace_core::errors::{CallGraphError, QueryError};
use calltrace_core::events::types::{
    BuildCompleteEvent, BuildStartedEvent, ExtractionFailedEvent, LowResolutionEvent,
    ResolutionRegressedEvent, UpdateCompleteEvent,
};
use calltrace_core::events::EventDispatcher;
use calltrace_core::tracing::metrics;
use calltrace_core::traits::{CancellationToken, GraphStore, TraversalDirection};
use calltrace_core::types::pagination::{paginate_sorted, PaginatedResult, PaginationCursor};

use crate::call_graph::persistence;
use crate::call_graph::resolution::ResolutionDiagnostics;
use crate::call_graph::types::{BuildReport, CallGraph, CallGraphStats};
use crate::call_graph::IncrementalCallGraph;
use crate::parsers::types::ParseResult;
use crate::query::{
    self, CachedResult, CallPath, FunctionSummary, NeighborEdge, Neighborhood, QueryCache,
    QueryKey, ReachableFunction,
};
use crate::scanner::types::ScanDiff;

/// The graph readers see, with the stats of the build that produced it.
/// `graph` is `None` when the graph lives only in the store.
#[derive(Debug, Clone)]
struct Snapshot {
    graph: Option<Arc<CallGraph>>,
    function_count: usize,
    stats: CallGraphStats,
    generation: u64,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            graph: Some(Arc::new(CallGraph::default())),
            function_count: 0,
            stats: CallGraphStats::default(),
            generation: 0,
        }
    }
}

/// Where a query is answered.
enum Backing<'a> {
    Memory(&'a CallGraph),
    Store(&'a Arc<dyn GraphStore>),
}

pub struct CallGraphService {
    config: CalltraceConfig,
    engine: Mutex<IncrementalCallGraph>,
    snapshot: RwLock<Snapshot>,
    cache: QueryCache,
    store: Option<Arc<dyn GraphStore>>,
    events: EventDispatcher,
}

impl CallGraphService {
    pub fn new(config: CalltraceConfig) -> Result<Self, CallGraphError> {
        let engine = IncrementalCallGraph::new(&config)?;
        Ok(Self {
            cache: QueryCache::from_config(&config.query),
            engine: Mutex::new(engine),
            snapshot: RwLock::new(Snapshot::default()),
            store: None,
            events: EventDispatcher::new(),
            config,
        })
    }

    /// Attach a store. Builds and updates are persisted through it and large
    /// graphs are queried through it.
    pub fn with_store(mut self, store: Arc<dyn GraphStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    /// Create a service whose graph is rebuilt from the extractions already
    /// held by `store`.
    pub fn open(config: CalltraceConfig, store: Arc<dyn GraphStore>) -> Result<Self, CallGraphError> {
        let service = Self::new(config)?.with_store(store);
        service.hydrate()?;
        Ok(service)
    }

    pub fn config(&self) -> &CalltraceConfig {
        &self.config
    }

    pub fn store(&self) -> Option<&Arc<dyn GraphStore>> {
        self.store.as_ref()
    }

    fn lock_engine(&self) -> Result<std::sync::MutexGuard<'_, IncrementalCallGraph>, CallGraphError> {
        self.engine
            .lock()
            .map_err(|e| CallGraphError::LockPoisoned(e.to_string()))
    }

    fn current(&self) -> Result<Snapshot, QueryError> {
        self.snapshot
            .read()
            .map(|s| s.clone())
            .map_err(|e| QueryError::LockPoisoned(e.to_string()))
    }

    /// Publish the engine's graph. With a store attached and the graph over
    /// the in-memory threshold, the engine is released instead and readers
    /// are pointed at storage.
    fn publish(
        &self,
        engine: &mut IncrementalCallGraph,
        stats: CallGraphStats,
    ) -> Result<u64, CallGraphError> {
        let function_count = engine.graph().function_count();
        let graph = if self.store.is_some() && self.exceeds_threshold(function_count) {
            engine.release();
            tracing::info!(function_count, "call graph over in-memory threshold; serving from storage");
            None
        } else {
            Some(Arc::clone(engine.graph()))
        };

        let mut snapshot = self
            .snapshot
            .write()
            .map_err(|e| CallGraphError::LockPoisoned(e.to_string()))?;
        let generation = snapshot.generation + 1;
        *snapshot = Snapshot {
            graph,
            function_count,
            stats,
            generation,
        };
        drop(snapshot);
        let span = tracing::debug_span!("publish", generation, cache_hit_rate = tracing::field::Empty);
        let _guard = span.enter();
        span.record(metrics::CACHE_HIT_RATE, self.cache.hit_rate());
        self.cache.invalidate_all();
        tracing::debug!("published call graph snapshot");
        Ok(generation)
    }

    /// Full build. The new graph becomes visible only after it has been
    /// persisted.
    pub fn build(
        &self,
        parse_results: &[ParseResult],
        cancel: &CancellationToken,
    ) -> Result<BuildReport, CallGraphError> {
        self.events.emit_build_started(&BuildStartedEvent {
            file_count: parse_results.len(),
            incremental: false,
        });
        let mut engine = self.lock_engine()?;
        let previous = engine.state().diagnostics.clone();
        let report = engine.full_build(parse_results, cancel, self.store.as_deref())?;
        self.publish(&mut engine, report.stats.clone())?;
        drop(engine);

        self.emit_diagnostics(&report, &previous);
        self.events.emit_build_complete(&BuildCompleteEvent {
            status: report.status.name().to_string(),
            functions: report.stats.total_functions,
            edges: report.stats.total_edges,
            resolution_rate: report.stats.resolution_rate,
            duration_ms: report.stats.build_duration.as_millis() as u64,
        });
        Ok(report)
    }

    /// Apply a file diff incrementally. On error the published snapshot is
    /// unchanged.
    pub fn update(
        &self,
        diff: &ScanDiff,
        parse_results: &[ParseResult],
        cancel: &CancellationToken,
    ) -> Result<BuildReport, CallGraphError> {
        self.events.emit_build_started(&BuildStartedEvent {
            file_count: diff.added.len() + diff.modified.len() + diff.removed.len(),
            incremental: true,
        });
        let mut engine = self.lock_engine()?;
        let previous = engine.state().diagnostics.clone();
        let result = engine.update(diff, parse_results, cancel, self.store.as_deref());
        if result.is_err() && self.current().is_ok_and(|s| s.graph.is_none()) {
            // The reload may have succeeded before the failure.
            engine.release();
        }
        let report = result?;
        self.publish(&mut engine, report.stats.clone())?;
        drop(engine);

        self.emit_diagnostics(&report, &previous);
        let summary = report.update.clone().unwrap_or_default();
        self.events.emit_update_complete(&UpdateCompleteEvent {
            status: report.status.name().to_string(),
            added: summary.files_added,
            modified: summary.files_modified,
            removed: summary.files_removed,
            incoming_reresolved: summary.incoming_reresolved,
            duration_ms: report.stats.build_duration.as_millis() as u64,
        });
        Ok(report)
    }

    /// Reload the graph from the attached store's extraction payloads.
    pub fn hydrate(&self) -> Result<BuildReport, CallGraphError> {
        let Some(store) = self.store.as_ref() else {
            return Err(CallGraphError::Storage(
                calltrace_core::errors::StorageError::Unavailable {
                    message: "no store attached".to_string(),
                },
            ));
        };
        let records = store.load_extractions(None)?;
        let mut engine = self.lock_engine()?;
        let report = engine.hydrate(&records)?;
        self.publish(&mut engine, report.stats.clone())?;
        Ok(report)
    }

    fn emit_diagnostics(&self, report: &BuildReport, previous: &ResolutionDiagnostics) {
        for failure in &report.failures {
            self.events.emit_extraction_failed(&ExtractionFailedEvent {
                file: failure.file.clone(),
                message: failure.error.to_string(),
            });
        }
        let resolution = &self.config.resolution;
        let diagnostics = &report.stats.diagnostics;
        for low in diagnostics.low_resolution(resolution.effective_low_rate_threshold()) {
            self.events.emit_low_resolution(&LowResolutionEvent {
                language: low.language,
                resolved: low.resolved,
                total: low.total,
                rate: low.rate,
            });
        }
        for regression in diagnostics.regressions(previous, resolution.effective_regression_tolerance()) {
            self.events.emit_resolution_regressed(&ResolutionRegressedEvent {
                language: regression.language,
                previous_rate: regression.previous_rate,
                current_rate: regression.current_rate,
            });
        }
    }

    /// The currently published graph. Fails with `StorageBacked` while the
    /// graph is held only by the store.
    pub fn snapshot(&self) -> Result<Arc<CallGraph>, QueryError> {
        let snapshot = self.current()?;
        snapshot.graph.ok_or(QueryError::StorageBacked {
            function_count: snapshot.function_count,
        })
    }

    /// False once an oversized graph has been released to storage.
    pub fn in_memory(&self) -> Result<bool, QueryError> {
        Ok(self.current()?.graph.is_some())
    }

    pub fn generation(&self) -> Result<u64, QueryError> {
        Ok(self.current()?.generation)
    }

    pub fn stats(&self) -> Result<CallGraphStats, QueryError> {
        Ok(self.current()?.stats)
    }

    fn exceeds_threshold(&self, function_count: usize) -> bool {
        function_count > self.config.query.effective_in_memory_threshold()
    }

    fn backing<'a>(&'a self, snapshot: &'a Snapshot) -> Result<Backing<'a>, QueryError> {
        match &snapshot.graph {
            Some(graph) if !self.exceeds_threshold(graph.function_count()) => {
                Ok(Backing::Memory(graph))
            }
            _ => self
                .store
                .as_ref()
                .map(Backing::Store)
                .ok_or(QueryError::NoStore {
                    function_count: snapshot.function_count,
                }),
        }
    }

    pub fn neighborhood(&self, id: &str) -> Result<Neighborhood, QueryError> {
        let snapshot = self.current()?;
        match self.backing(&snapshot)? {
            Backing::Memory(graph) => query::neighborhood(graph, id),
            Backing::Store(store) => neighborhood_from_store(store.as_ref(), id),
        }
    }

    /// Functions reachable from `start`, each at its shortest depth.
    /// `max_depth` defaults to the configured bound.
    pub fn reachable(
        &self,
        start: &str,
        direction: TraversalDirection,
        max_depth: Option<u32>,
    ) -> Result<Arc<Vec<ReachableFunction>>, QueryError> {
        let snapshot = self.current()?;
        let depth = max_depth.unwrap_or_else(|| self.config.query.effective_max_depth());
        let key = QueryKey::Reachable {
            generation: snapshot.generation,
            source: start.to_string(),
            direction,
            depth,
        };
        if let Some(CachedResult::Reachable(hit)) = self.cache.get(&key) {
            return Ok(hit);
        }

        let result = match self.backing(&snapshot)? {
            Backing::Memory(graph) => query::reachable(graph, start, direction, depth)?,
            Backing::Store(store) => reachable_from_store(store.as_ref(), start, direction, depth)?,
        };
        let result = Arc::new(result);
        self.cache.insert(key, CachedResult::Reachable(Arc::clone(&result)));
        Ok(result)
    }

    /// One shortest path from `from` to `to`, or `None` when unreachable
    /// within the depth bound.
    pub fn path(
        &self,
        from: &str,
        to: &str,
        max_depth: Option<u32>,
    ) -> Result<Option<Arc<CallPath>>, QueryError> {
        let snapshot = self.current()?;
        let depth = max_depth.unwrap_or_else(|| self.config.query.effective_max_depth());
        let key = QueryKey::Path {
            generation: snapshot.generation,
            source: from.to_string(),
            target: to.to_string(),
            depth,
        };
        if let Some(CachedResult::Path(hit)) = self.cache.get(&key) {
            return Ok(hit);
        }

        let result = match self.backing(&snapshot)? {
            Backing::Memory(graph) => query::find_path(graph, from, to, depth)?,
            Backing::Store(store) => path_from_store(store.as_ref(), from, to, depth)?,
        };
        let result = result.map(Arc::new);
        self.cache.insert(key, CachedResult::Path(result.clone()));
        Ok(result)
    }

    fn page_args(
        &self,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<(Option<PaginationCursor>, usize), QueryError> {
        let cursor = match cursor {
            Some(raw) => Some(PaginationCursor::decode(raw).ok_or(QueryError::InvalidCursor)?),
            None => None,
        };
        let limit = limit
            .unwrap_or_else(|| self.config.query.effective_page_size())
            .clamp(1, MAX_PAGE_SIZE);
        Ok((cursor, limit))
    }

    /// Entry points ordered by id, one page at a time.
    pub fn entry_points(
        &self,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<PaginatedResult<FunctionSummary>, QueryError> {
        let snapshot = self.current()?;
        let (cursor, limit) = self.page_args(cursor, limit)?;
        let graph = match self.backing(&snapshot)? {
            Backing::Memory(graph) => graph,
            Backing::Store(store) => {
                let page = store.entry_points(cursor.as_ref(), limit)?;
                return Ok(page.map(|r| FunctionSummary::from(&r)));
            }
        };

        let mut keys: Vec<(String, String, FunctionSummary)> = graph
            .functions()
            .filter(|f| f.is_entry_point())
            .map(|f| (String::new(), f.id.clone(), FunctionSummary::from(f)))
            .collect();
        keys.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(paginate_sorted(&keys, cursor.as_ref(), limit))
    }

    /// Functions matching `text` (case-insensitive), exact name matches
    /// first, then name prefixes, then other matches; ties by id.
    pub fn search(
        &self,
        text: &str,
        cursor: Option<&str>,
        limit: Option<usize>,
    ) -> Result<PaginatedResult<FunctionSummary>, QueryError> {
        let snapshot = self.current()?;
        let (cursor, limit) = self.page_args(cursor, limit)?;
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(PaginatedResult::empty());
        }
        let graph = match self.backing(&snapshot)? {
            Backing::Memory(graph) => graph,
            Backing::Store(store) => {
                let page = store.search_functions(&needle, cursor.as_ref(), limit)?;
                return Ok(page.map(|r| FunctionSummary::from(&r)));
            }
        };

        let mut keys: Vec<(String, String, FunctionSummary)> = graph
            .functions()
            .filter_map(|f| {
                query::search_rank(f, &needle)
                    .map(|rank| (rank.to_string(), f.id.clone(), FunctionSummary::from(f)))
            })
            .collect();
        keys.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        Ok(paginate_sorted(&keys, cursor.as_ref(), limit))
    }
}

fn reachable_from_store(
    store: &dyn GraphStore,
    start: &str,
    direction: TraversalDirection,
    depth: u32,
) -> Result<Vec<ReachableFunction>, QueryError> {
    if store.get_function(start)?.is_none() {
        return Err(QueryError::UnknownFunction { id: start.to_string() });
    }
    tracing::debug!(start, depth, "reachability served by storage");
    let rows = store.traverse(start, direction, depth)?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(record) = store.get_function(&row.function_id)? {
            out.push(ReachableFunction {
                function: FunctionSummary::from(&record),
                depth: row.depth,
            });
        }
    }
    out.sort_by(|a, b| (a.depth, &a.function.id).cmp(&(b.depth, &b.function.id)));
    Ok(out)
}

fn path_from_store(
    store: &dyn GraphStore,
    from: &str,
    to: &str,
    depth: u32,
) -> Result<Option<CallPath>, QueryError> {
    for id in [from, to] {
        if store.get_function(id)?.is_none() {
            return Err(QueryError::UnknownFunction { id: id.to_string() });
        }
    }
    if from == to {
        return Ok(Some(CallPath::trivial(from)));
    }
    let Some(records) = store.shortest_path(from, to, depth)? else {
        return Ok(None);
    };
    let edges = records
        .iter()
        .map(persistence::edge_view)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CallPath::from_edges(edges))
}

fn neighborhood_from_store(store: &dyn GraphStore, id: &str) -> Result<Neighborhood, QueryError> {
    let Some(record) = store.get_function(id)? else {
        return Err(QueryError::UnknownFunction { id: id.to_string() });
    };
    let mut callees = Vec::new();
    for edge in store.edges_from(id)? {
        if let Some(target) = store.get_function(&edge.callee_id)? {
            callees.push(NeighborEdge {
                function: FunctionSummary::from(&target),
                edge: persistence::edge_view(&edge)?,
            });
        }
    }
    let mut callers = Vec::new();
    for edge in store.edges_to(id)? {
        if let Some(source) = store.get_function(&edge.caller_id)? {
            callers.push(NeighborEdge {
                function: FunctionSummary::from(&source),
                edge: persistence::edge_view(&edge)?,
            });
        }
    }
    let order = |a: &NeighborEdge, b: &NeighborEdge| {
        (&a.function.id, a.edge.call_site_line).cmp(&(&b.function.id, b.edge.call_site_line))
    };
    callers.sort_by(order);
    callees.sort_by(order);
    Ok(Neighborhood {
        function: FunctionSummary::from(&record),
        callers,
        callees,
    })
}

impl std::fmt::Debug for CallGraphService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallGraphService")
            .field("cache", &self.cache)
            .field("has_store", &self.store.is_some())
            .field("events", &self.events)
            .finish()
    }
}
