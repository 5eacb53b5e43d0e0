//! Pipeline assembly: one instance per live page. Owns the shared page tree,
//! the vocabulary snapshot store and the scheduler, spawns the batch worker,
//! and exposes the scan entry points the embedder drives.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::{HostGate, PipelineConfig};
use crate::metrics::{metric_names, MetricsRegistry};
use crate::page::PageTree;
use crate::scanner::{self, ScanScope};
use crate::scheduler::{self, Scheduler};
use crate::translate::{TranslationCache, TranslationEngine};
use crate::vocab::VocabStore;

const CACHE_CAPACITY: usize = 256;
const CACHE_TTL: Duration = Duration::from_secs(30 * 60);

pub struct Pipeline {
    page: Arc<Mutex<PageTree>>,
    vocab: Arc<VocabStore>,
    config: Arc<RwLock<PipelineConfig>>,
    metrics: Arc<MetricsRegistry>,
    scheduler: Arc<Scheduler>,
    host_allowed: bool,
    worker: Option<tokio::task::JoinHandle<()>>,
    /// Receiver parked here when no engine is configured; flushed batches
    /// queue instead of erroring, and their blocks stay `Pending`.
    _parked_rx: Option<mpsc::UnboundedReceiver<scheduler::BatchRequest>>,
}

impl Pipeline {
    /// Assemble the pipeline for one page. Must be called from within a
    /// tokio runtime. With no engine the pipeline still scans and tags, but
    /// no worker is spawned and enqueued blocks stay `Pending`.
    pub fn new(
        host: &str,
        page: Arc<Mutex<PageTree>>,
        vocab: Arc<VocabStore>,
        config: PipelineConfig,
        engine: Option<Arc<dyn TranslationEngine>>,
    ) -> Self {
        let host_allowed = HostGate::from_config(&config).allows(host);
        let config = Arc::new(RwLock::new(config));
        let metrics = Arc::new(MetricsRegistry::new());
        let (scheduler, rx) = Scheduler::new(
            Arc::clone(&page),
            Arc::clone(&vocab),
            Arc::clone(&config),
            Arc::clone(&metrics),
        );

        let (worker, parked_rx) = match engine {
            Some(engine) => {
                info!(host, engine = engine.name(), "pipeline started");
                let cache = Arc::new(TranslationCache::new(CACHE_CAPACITY, CACHE_TTL));
                let worker = scheduler::spawn_worker(
                    Arc::clone(&page),
                    engine,
                    cache,
                    Arc::clone(&metrics),
                    rx,
                );
                (Some(worker), None)
            }
            None => {
                error!(host, "no translation engine enabled; blocks will stay pending");
                (None, Some(rx))
            }
        };

        Self {
            page,
            vocab,
            config,
            metrics,
            scheduler,
            host_allowed,
            worker,
            _parked_rx: parked_rx,
        }
    }

    /// One scan pass: discover eligible blocks and enqueue them. Returns the
    /// number of blocks enqueued. No-op on gated hosts or when disabled.
    pub fn scan(&self) -> usize {
        if !self.host_allowed {
            debug!("host gated, scan skipped");
            return 0;
        }
        let (enabled, whole_page) = {
            let config = self.config.read();
            (config.enabled, config.whole_page)
        };
        if !enabled {
            return 0;
        }
        let scope = if whole_page {
            ScanScope::WholePage
        } else {
            ScanScope::MainContent
        };

        let span = self.metrics.span(metric_names::SCAN_PASS);
        let candidates = {
            let page = self.page.lock();
            scanner::scan(&page, scope)
        };
        // Page lock is released; `add` re-validates each block under its own
        // short lock, so mutations between the two are safe.
        let before = self.metrics.counter(metric_names::BLOCKS_DISCOVERED);
        for node in candidates {
            self.scheduler.add(node);
        }
        span.finish();
        (self.metrics.counter(metric_names::BLOCKS_DISCOVERED) - before) as usize
    }

    /// Content-change notification from the embedder. Re-runs discovery;
    /// blocks already tagged are skipped by the scanner.
    pub fn content_changed(&self) -> usize {
        self.scan()
    }

    /// Flush the partial buffer without waiting for the debounce window.
    pub fn flush(&self) {
        self.scheduler.flush();
    }

    pub fn update_config(&self, f: impl FnOnce(&mut PipelineConfig)) {
        f(&mut self.config.write());
    }

    pub fn page(&self) -> &Arc<Mutex<PageTree>> {
        &self.page
    }

    pub fn vocab(&self) -> &Arc<VocabStore> {
        &self.vocab
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}
