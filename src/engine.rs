//! The inspector engine.
//!
//! Owns the capability handles, the process-lifetime caches, and the
//! registered inspection suites; one call to [`Inspector::scan`] runs
//! walk, scope propagation, and rule evaluation end to end. Scans are
//! serialized: one runs at a time, and the last completed result stays
//! available while the next is in flight or after it fails.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock, TryLockError};
use std::time::Instant;

use thiserror::Error;
use tracing::{error, info};

use crate::bytecode::ProcessCaches;
use crate::config::{Config, ConfigError};
use crate::graph::{ObjectGraph, ObjectGraphWalker};
use crate::heap::{BytecodeSupplier, Heap, HeapError, RootSupplier, UnwrapHook};
use crate::rules::{run_inspections, AnalysisContext, Inspection, InspectionResult, Suite};
use crate::scope::{ScopeDetector, ScopeOrder, ScopePropagator};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("a scan is already in progress")]
    ScanInProgress,
    #[error("root enumeration failed: {0}")]
    Roots(#[from] HeapError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("scan aborted by panic")]
    Aborted,
    #[error("no completed scan to analyze")]
    NoSnapshot,
}

/// The completed output of one scan.
pub struct ScanResult {
    pub graph: ObjectGraph,
    pub results: Vec<InspectionResult>,
    pub stats: ScanStats,
}

#[derive(Debug, Clone)]
pub struct ScanStats {
    pub nodes: usize,
    pub edges: usize,
    pub matches: usize,
    pub elapsed_ms: u128,
}

/// Long-lived engine handle. Create one per inspected process and reuse it
/// across scans so the exposure index and possible-value cache accumulate.
pub struct Inspector {
    heap: Arc<dyn Heap>,
    unwrap: Arc<dyn UnwrapHook>,
    scopes: Arc<dyn ScopeDetector>,
    roots: Arc<dyn RootSupplier>,
    bytecode: Arc<dyn BytecodeSupplier>,
    caches: ProcessCaches,
    config: Config,
    inspections: Vec<Inspection>,
    scan_lock: Mutex<()>,
    last_good: RwLock<Option<Arc<ScanResult>>>,
}

impl Inspector {
    pub fn new(
        heap: Arc<dyn Heap>,
        unwrap: Arc<dyn UnwrapHook>,
        scopes: Arc<dyn ScopeDetector>,
        roots: Arc<dyn RootSupplier>,
        bytecode: Arc<dyn BytecodeSupplier>,
        config: Config,
    ) -> Self {
        Self {
            heap,
            unwrap,
            scopes,
            roots,
            bytecode,
            caches: ProcessCaches::new(),
            config,
            inspections: Vec::new(),
            scan_lock: Mutex::new(()),
            last_good: RwLock::new(None),
        }
    }

    /// Collect a suite's inspections, honoring configured disables. Member
    /// lists are fixed from this point on.
    pub fn register_suite(&mut self, suite: &dyn Suite) {
        let mut added = 0;
        for inspection in suite.inspections() {
            let inspection = if self.config.is_disabled(&inspection.id) {
                inspection.disabled()
            } else {
                inspection
            };
            added += 1;
            self.inspections.push(inspection);
        }
        info!(suite = suite.name(), inspections = added, "suite registered");
    }

    pub fn caches(&self) -> &ProcessCaches {
        &self.caches
    }

    /// The most recent completed scan, surviving later failures.
    pub fn last_result(&self) -> Option<Arc<ScanResult>> {
        self.last_good.read().unwrap().clone()
    }

    /// Run a scan, waiting if another is in flight.
    pub fn scan(&self) -> Result<Arc<ScanResult>, ScanError> {
        let guard = self.scan_lock.lock().unwrap();
        self.scan_locked(guard)
    }

    /// Re-evaluate the registered inspections against the last completed
    /// snapshot, without walking the heap again.
    pub fn analyze(&self) -> Result<Vec<InspectionResult>, ScanError> {
        let snapshot = self.last_result().ok_or(ScanError::NoSnapshot)?;
        let ctx = AnalysisContext {
            heap: &*self.heap,
            bytecode: &*self.bytecode,
            caches: &self.caches,
        };
        let order = ScopeOrder::new(self.scopes.scope_order());
        Ok(run_inspections(
            &snapshot.graph,
            &self.inspections,
            &ctx,
            &order,
            &self.config.grouping_options(),
        ))
    }

    /// Run a scan, failing fast if another is in flight.
    pub fn try_scan(&self) -> Result<Arc<ScanResult>, ScanError> {
        match self.scan_lock.try_lock() {
            Ok(guard) => self.scan_locked(guard),
            Err(TryLockError::WouldBlock) => Err(ScanError::ScanInProgress),
            Err(TryLockError::Poisoned(poisoned)) => self.scan_locked(poisoned.into_inner()),
        }
    }

    fn scan_locked(
        &self,
        _guard: std::sync::MutexGuard<'_, ()>,
    ) -> Result<Arc<ScanResult>, ScanError> {
        let started = Instant::now();
        let roots = self.roots.roots()?;
        let cascade = self.config.cascade_filter()?;
        let ignore = self.config.ignore_set();

        // A panic anywhere in the scan leaves the previous snapshot as the
        // served result.
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let walker = ObjectGraphWalker::new(
                &*self.heap,
                &*self.unwrap,
                &*self.scopes,
                &*self.bytecode,
                &self.caches,
            )
            .with_ignore(ignore)
            .with_cascade(cascade);
            let mut graph = walker.walk(&roots);

            ScopePropagator::new(&*self.scopes).propagate(&mut graph);

            let ctx = AnalysisContext {
                heap: &*self.heap,
                bytecode: &*self.bytecode,
                caches: &self.caches,
            };
            let order = ScopeOrder::new(self.scopes.scope_order());
            let results = run_inspections(
                &graph,
                &self.inspections,
                &ctx,
                &order,
                &self.config.grouping_options(),
            );
            (graph, results)
        }));

        let (graph, results) = match outcome {
            Ok(parts) => parts,
            Err(_) => {
                error!("scan panicked; keeping previous result");
                return Err(ScanError::Aborted);
            }
        };

        let stats = ScanStats {
            nodes: graph.node_count(),
            edges: graph.edge_count(),
            matches: results.iter().map(InspectionResult::match_count).sum(),
            elapsed_ms: started.elapsed().as_millis(),
        };
        info!(
            nodes = stats.nodes,
            edges = stats.edges,
            matches = stats.matches,
            elapsed_ms = stats.elapsed_ms as u64,
            "scan complete"
        );

        let result = Arc::new(ScanResult {
            graph,
            results,
            stats,
        });
        *self.last_good.write().unwrap() = Some(Arc::clone(&result));
        Ok(result)
    }
}
