//! lingoweave: context-verified vocabulary replacement for live pages.
//!
//! The pipeline scans a page tree for native-language content blocks,
//! batches them against a rate-limited translation engine, verifies each
//! vocabulary entry against the block's actual translation, and rewrites
//! the verified matches into interactive units a bubble engine can drive.

pub mod annotator;
pub mod config;
pub mod interaction;
pub mod lang;
pub mod matcher;
pub mod metrics;
pub mod page;
pub mod pipeline;
pub mod scanner;
pub mod scheduler;
pub mod timer;
pub mod translate;
pub mod vocab;

pub use config::{HostGate, PipelineConfig};
pub use interaction::{BubbleEvent, InteractionConfig, InteractionEngine, PointerEvent};
pub use matcher::MatchSpan;
pub use metrics::MetricsRegistry;
pub use page::{NodeId, PageTree, ScanState};
pub use pipeline::Pipeline;
pub use translate::{EngineError, HttpEngine, TranslationEngine};
pub use vocab::{VocabStore, VocabularyEntry, WordCategory};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Safe to call once per process; embedders with their own
/// subscriber skip this.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lingoweave=debug,info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
