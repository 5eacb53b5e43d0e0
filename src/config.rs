//! Pipeline configuration and the host eligibility gate.
//! Config is read as a snapshot per scan cycle; in-flight batches carry the
//! settings captured at flush time.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Tunables for scanning, batching and replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Scan automatically on page load / content change.
    pub enabled: bool,
    /// Whole-page scope; false restricts to the main-content landmark.
    pub whole_page: bool,
    /// Insert the full translation as a sibling block under each source block.
    pub bilingual_mode: bool,
    /// Also accept inflected headword forms during context verification.
    pub match_inflections: bool,
    /// Target language requested from the engine.
    pub target_lang: String,
    /// Blocks shorter than this (chars) are never enqueued.
    pub min_block_chars: usize,
    /// Flush immediately at this many buffered blocks...
    pub max_batch_blocks: usize,
    /// ...or at this cumulative character count.
    pub max_batch_chars: usize,
    /// Idle window after the last `add` before a partial buffer flushes.
    pub debounce_ms: u64,
    /// Fixed delay between consecutive engine requests.
    pub rate_limit_delay_ms: u64,
    /// Host regex patterns that disable scanning.
    pub blacklist: Vec<String>,
    /// Host regex patterns that force-enable scanning (overrides blacklist).
    pub whitelist: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            whole_page: false,
            bilingual_mode: false,
            match_inflections: true,
            target_lang: "en".to_string(),
            min_block_chars: 2,
            max_batch_blocks: 30,
            max_batch_chars: 3000,
            debounce_ms: 150,
            rate_limit_delay_ms: 350,
            blacklist: Vec::new(),
            whitelist: Vec::new(),
        }
    }
}

/// Compiled blacklist/whitelist host matcher. Built once per page load;
/// whitelist wins over blacklist. Invalid patterns are skipped with a warning
/// rather than failing the gate.
pub struct HostGate {
    blacklist: Vec<Regex>,
    whitelist: Vec<Regex>,
}

impl HostGate {
    pub fn new(blacklist: &[String], whitelist: &[String]) -> Self {
        Self {
            blacklist: compile_patterns(blacklist, "blacklist"),
            whitelist: compile_patterns(whitelist, "whitelist"),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(&config.blacklist, &config.whitelist)
    }

    /// Whether scanning may run for this host.
    pub fn allows(&self, host: &str) -> bool {
        if self.whitelist.iter().any(|re| re.is_match(host)) {
            return true;
        }
        if self.blacklist.iter().any(|re| re.is_match(host)) {
            info!(host, "host blacklisted, scanning disabled");
            return false;
        }
        true
    }
}

fn compile_patterns(patterns: &[String], which: &str) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = p.as_str(), list = which, error = %e, "invalid host pattern skipped");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelist_overrides_blacklist() {
        let gate = HostGate::new(
            &[r".*\.example\.com$".to_string()],
            &[r"^docs\.example\.com$".to_string()],
        );
        assert!(!gate.allows("news.example.com"));
        assert!(gate.allows("docs.example.com"));
        assert!(gate.allows("other.org"));
    }

    #[test]
    fn invalid_patterns_are_skipped() {
        let gate = HostGate::new(&["[unclosed".to_string()], &[]);
        assert!(gate.allows("anything.com"));
    }
}
