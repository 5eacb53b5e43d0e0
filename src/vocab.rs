//! Vocabulary snapshot store.
//! The pipeline only ever reads immutable snapshots; replacing the list
//! notifies subscribers via a watch channel but never retroactively affects
//! batches already in flight.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

/// Lifecycle category of a vocabulary entry. Gates candidacy only; the
/// matching algorithm itself never inspects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WordCategory {
    Want,
    Learning,
    Known,
}

/// One learnable item: a target-language headword with its native-language
/// definition(s). The definition may hold several alternatives separated by
/// punctuation ("银行; 岸").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub id: String,
    /// Target-language headword, e.g. "china".
    pub headword: String,
    /// Native-language definition string, e.g. "中国".
    pub definition: String,
    /// Inflected/alternate forms of the headword ("ran", "running").
    #[serde(default)]
    pub inflections: Vec<String>,
    pub category: WordCategory,
}

impl VocabularyEntry {
    pub fn new(headword: &str, definition: &str, category: WordCategory) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            headword: headword.to_string(),
            definition: definition.to_string(),
            inflections: Vec::new(),
            category,
        }
    }

    pub fn with_inflections(mut self, inflections: &[&str]) -> Self {
        self.inflections = inflections.iter().map(|s| s.to_string()).collect();
        self
    }
}

/// Read-only snapshot store over the external vocabulary list.
pub struct VocabStore {
    entries: RwLock<Arc<Vec<VocabularyEntry>>>,
    tx: watch::Sender<()>,
    rx: watch::Receiver<()>,
}

impl VocabStore {
    pub fn new(entries: Vec<VocabularyEntry>) -> Self {
        let (tx, rx) = watch::channel(());
        Self {
            entries: RwLock::new(Arc::new(entries)),
            tx,
            rx,
        }
    }

    /// Current snapshot. Cheap to clone; holders keep seeing the list as it
    /// was when they took it.
    pub fn snapshot(&self) -> Arc<Vec<VocabularyEntry>> {
        Arc::clone(&self.entries.read())
    }

    /// Entries eligible as replacement candidates: everything the user has
    /// not already marked as known.
    pub fn candidates(&self) -> Vec<VocabularyEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.category != WordCategory::Known)
            .cloned()
            .collect()
    }

    /// Replace the in-memory snapshot used by subsequent cycles.
    pub fn replace(&self, entries: Vec<VocabularyEntry>) {
        let count = entries.len();
        *self.entries.write() = Arc::new(entries);
        let _ = self.tx.send(());
        info!(count, "vocabulary snapshot replaced");
    }

    /// Subscribe to snapshot replacements.
    pub fn subscribe(&self) -> watch::Receiver<()> {
        self.rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_entries_are_not_candidates() {
        let store = VocabStore::new(vec![
            VocabularyEntry::new("china", "中国", WordCategory::Want),
            VocabularyEntry::new("bank", "银行; 岸", WordCategory::Known),
        ]);
        let candidates = store.candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].headword, "china");
    }

    #[test]
    fn snapshot_is_stable_across_replace() {
        let store = VocabStore::new(vec![VocabularyEntry::new(
            "china",
            "中国",
            WordCategory::Want,
        )]);
        let before = store.snapshot();
        store.replace(Vec::new());
        assert_eq!(before.len(), 1);
        assert_eq!(store.snapshot().len(), 0);
    }
}
