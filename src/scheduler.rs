//! Batching scheduler: buffers discovered blocks, flushes them as combined
//! batches, and runs the single worker loop that drives the rate-limited
//! translation engine. At most one batch is in flight at any time; the
//! worker awaits each engine call and sleeps the rate-limit delay before
//! taking the next batch.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use regex::Regex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::annotator;
use crate::config::PipelineConfig;
use crate::lang;
use crate::metrics::{metric_names, MetricsRegistry};
use crate::page::{NodeId, PageTree, ScanState};
use crate::translate::{TranslationCache, TranslationEngine};
use crate::vocab::{VocabStore, VocabularyEntry};

/// Separator joining block texts into one engine request. Chosen so that a
/// well-behaved engine echoes it back unchanged between translated parts.
pub const DELIMITER: &str = "\n|||\n";

/// One buffered block awaiting translation.
pub struct PendingBlock {
    pub node: NodeId,
    pub text: String,
}

/// A flushed batch, self-contained: it carries the vocabulary and settings
/// snapshots taken at flush time, so later config or vocabulary edits never
/// affect it mid-flight.
pub struct BatchRequest {
    pub id: String,
    pub items: Vec<PendingBlock>,
    pub combined: String,
    pub entries: Vec<VocabularyEntry>,
    pub bilingual_mode: bool,
    pub match_inflections: bool,
    pub target_lang: String,
    pub rate_limit_delay: Duration,
    pub enqueued_at: Instant,
}

struct Buffer {
    items: Vec<PendingBlock>,
    chars: usize,
}

pub struct Scheduler {
    page: Arc<Mutex<PageTree>>,
    vocab: Arc<VocabStore>,
    config: Arc<RwLock<PipelineConfig>>,
    metrics: Arc<MetricsRegistry>,
    buffer: Mutex<Buffer>,
    debounce: crate::timer::ScheduledTask,
    tx: mpsc::UnboundedSender<BatchRequest>,
}

impl Scheduler {
    pub fn new(
        page: Arc<Mutex<PageTree>>,
        vocab: Arc<VocabStore>,
        config: Arc<RwLock<PipelineConfig>>,
        metrics: Arc<MetricsRegistry>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<BatchRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Arc::new(Self {
            page,
            vocab,
            config,
            metrics,
            buffer: Mutex::new(Buffer {
                items: Vec::new(),
                chars: 0,
            }),
            debounce: crate::timer::ScheduledTask::new(),
            tx,
        });
        (scheduler, rx)
    }

    /// Buffer a discovered block. Re-validates eligibility, tags the block
    /// `Pending` synchronously (so a concurrent scan pass cannot enqueue it
    /// twice), then either flushes on a size threshold or re-arms the
    /// debounce timer.
    pub fn add(self: &Arc<Self>, node: NodeId) {
        let (min_chars, max_blocks, max_chars, debounce_ms) = {
            let config = self.config.read();
            (
                config.min_block_chars,
                config.max_batch_blocks,
                config.max_batch_chars,
                config.debounce_ms,
            )
        };

        let text = {
            let mut page = self.page.lock();
            if page.scan_state(node).is_some() {
                return;
            }
            let text = page.text_content(node);
            if text.chars().count() < min_chars || !lang::contains_han(&text) {
                return;
            }
            page.set_scan_state(node, ScanState::Pending);
            text
        };

        self.metrics.incr(metric_names::BLOCKS_DISCOVERED, 1);

        let should_flush = {
            let mut buffer = self.buffer.lock();
            buffer.chars += text.chars().count();
            buffer.items.push(PendingBlock { node, text });
            buffer.items.len() >= max_blocks || buffer.chars >= max_chars
        };

        if should_flush {
            self.flush();
        } else {
            let scheduler = Arc::clone(self);
            self.debounce
                .arm(Duration::from_millis(debounce_ms), move || {
                    scheduler.flush();
                });
        }
    }

    /// Drain the buffer into one `BatchRequest` and hand it to the worker.
    /// No-op on an empty buffer.
    pub fn flush(&self) {
        self.debounce.disarm();
        let items = {
            let mut buffer = self.buffer.lock();
            buffer.chars = 0;
            std::mem::take(&mut buffer.items)
        };
        if items.is_empty() {
            return;
        }

        let (bilingual_mode, match_inflections, target_lang, rate_limit_delay_ms) = {
            let config = self.config.read();
            (
                config.bilingual_mode,
                config.match_inflections,
                config.target_lang.clone(),
                config.rate_limit_delay_ms,
            )
        };

        let combined = items
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join(DELIMITER);

        let batch = BatchRequest {
            id: uuid::Uuid::new_v4().to_string(),
            combined,
            entries: self.vocab.candidates(),
            bilingual_mode,
            match_inflections,
            target_lang,
            rate_limit_delay: Duration::from_millis(rate_limit_delay_ms),
            enqueued_at: Instant::now(),
            items,
        };
        debug!(
            batch_id = batch.id.as_str(),
            blocks = batch.items.len(),
            chars = batch.combined.chars().count(),
            "batch flushed"
        );
        if self.tx.send(batch).is_err() {
            warn!("batch worker gone, dropping batch");
        }
    }

    /// Number of blocks currently buffered. Test and diagnostics hook.
    pub fn buffered(&self) -> usize {
        self.buffer.lock().items.len()
    }
}

fn split_translated(reply: &str) -> Vec<&str> {
    static SPLIT_RE: OnceLock<Regex> = OnceLock::new();
    let re = SPLIT_RE.get_or_init(|| Regex::new(r"\s*\|\|\|\s*").unwrap());
    re.split(reply).collect()
}

/// The single batch worker. Owns the receiving end of the batch channel;
/// processes one batch at a time and enforces the rate-limit delay between
/// engine calls. Exits when the scheduler is dropped.
pub fn spawn_worker(
    page: Arc<Mutex<PageTree>>,
    engine: Arc<dyn TranslationEngine>,
    cache: Arc<TranslationCache>,
    metrics: Arc<MetricsRegistry>,
    mut rx: mpsc::UnboundedReceiver<BatchRequest>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!(engine = engine.name(), "batch worker started");
        while let Some(batch) = rx.recv().await {
            metrics.record(
                metric_names::QUEUE_WAIT_BATCH,
                batch.enqueued_at.elapsed().as_micros() as f64,
            );

            let key = TranslationCache::compute_key(&batch.target_lang, &batch.combined);
            let translated = match cache.get(&key) {
                Some(hit) => {
                    metrics.incr(metric_names::CACHE_HITS, 1);
                    Ok(hit)
                }
                None => {
                    metrics.incr(metric_names::CACHE_MISSES, 1);
                    let span = metrics.span(metric_names::BATCH_TRANSLATE);
                    let source = lang::detect_language(&batch.combined);
                    let result = engine
                        .translate(&batch.combined, source.as_deref(), &batch.target_lang)
                        .await;
                    span.finish();
                    if let Ok(ref text) = result {
                        cache.insert(key, text.clone());
                    }
                    result
                }
            };

            match translated {
                Ok(reply) => {
                    apply_batch(&page, &metrics, &batch, &reply);
                }
                Err(e) => {
                    warn!(
                        batch_id = batch.id.as_str(),
                        blocks = batch.items.len(),
                        error = %e,
                        "batch translation failed"
                    );
                    let mut page = page.lock();
                    for item in &batch.items {
                        page.set_scan_state(item.node, ScanState::Error);
                    }
                    metrics.incr(metric_names::BLOCKS_ERROR, batch.items.len() as u64);
                }
            }

            tokio::time::sleep(batch.rate_limit_delay).await;
        }
        info!("batch worker stopped");
    })
}

/// Demultiplex the combined reply back onto the batch's blocks and annotate
/// each one. A part index never exceeds the block count; when the engine
/// returns fewer parts than blocks, the tail blocks see an empty translation
/// and end up skipped rather than mismatched.
fn apply_batch(
    page: &Arc<Mutex<PageTree>>,
    metrics: &Arc<MetricsRegistry>,
    batch: &BatchRequest,
    reply: &str,
) {
    let parts = split_translated(reply);
    if parts.len() != batch.items.len() {
        warn!(
            batch_id = batch.id.as_str(),
            blocks = batch.items.len(),
            parts = parts.len(),
            "delimiter count mismatch in engine reply"
        );
    }

    let span = metrics.span(metric_names::BATCH_APPLY);
    let mut page = page.lock();
    for (i, item) in batch.items.iter().enumerate() {
        let part = parts.get(i).map(|p| p.trim()).unwrap_or("");
        let state = annotator::apply_translation(
            &mut page,
            item.node,
            &item.text,
            part,
            &batch.entries,
            batch.bilingual_mode,
            batch.match_inflections,
        );
        let counter = match state {
            ScanState::Done => metric_names::BLOCKS_DONE,
            ScanState::Error => metric_names::BLOCKS_ERROR,
            _ => metric_names::BLOCKS_SKIPPED,
        };
        metrics.incr(counter, 1);
    }
    drop(page);
    span.finish();
}
