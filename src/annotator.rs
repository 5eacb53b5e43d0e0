//! Replacement & state annotator.
//! Turns matcher output into interactive markup in the page arena and stamps
//! the terminal scan state that makes re-scans skip completed work.

use tracing::debug;

use crate::matcher::{self, MatchSpan};
use crate::page::{NodeId, PageTree, ScanState};
use crate::vocab::VocabularyEntry;

/// Attribute caching the original block text for context capture.
pub const ATTR_SOURCE: &str = "data-lingo-source";
/// Attribute caching the block's full translation.
pub const ATTR_TRANSLATION: &str = "data-lingo-translation";
/// Attribute identifying the vocabulary entry behind an interactive unit.
pub const ATTR_ENTRY_ID: &str = "data-entry-id";
/// Attribute holding the exact native-language substring a unit replaced.
pub const ATTR_ORIGINAL_TEXT: &str = "data-original-text";
pub const ATTR_CATEGORY: &str = "data-category";
/// Class marking an interactive replacement unit.
pub const CLASS_WORD: &str = "lingo-word";
/// Class marking the bilingual sibling block.
pub const CLASS_BILINGUAL: &str = "lingo-bilingual";

/// Verify, match and rewrite one block against its translated text, then
/// stamp the terminal scan state. Returns the state that was stamped.
pub fn apply_translation(
    page: &mut PageTree,
    block: NodeId,
    source_text: &str,
    translated_text: &str,
    candidates: &[VocabularyEntry],
    bilingual_mode: bool,
    match_inflections: bool,
) -> ScanState {
    // Cache both texts on the block so a later quick-add can capture the
    // surrounding context without another engine call.
    page.set_attr(block, ATTR_SOURCE, source_text);
    page.set_attr(block, ATTR_TRANSLATION, translated_text);

    if bilingual_mode && !translated_text.is_empty() {
        insert_bilingual_sibling(page, block, translated_text);
    }

    let verified = matcher::verify_context(candidates, Some(translated_text), match_inflections);
    let state = if verified.is_empty() {
        ScanState::SkippedNoTargetMatch
    } else {
        let spans = matcher::find_spans(source_text, &verified);
        if spans.is_empty() {
            ScanState::SkippedFuzzyFail
        } else {
            let applied = rewrite_block(page, block, &spans);
            debug!(spans = spans.len(), applied, "block annotated");
            ScanState::Done
        }
    };
    page.set_scan_state(block, state);
    state
}

/// Insert the full translation after the block, once. A second application
/// on the same block (content change re-discovery) must not duplicate it.
fn insert_bilingual_sibling(page: &mut PageTree, block: NodeId, translated: &str) {
    if let Some(next) = page.next_sibling(block) {
        if page.attr(next, "class") == Some(CLASS_BILINGUAL) {
            return;
        }
    }
    let sibling = page.element("div");
    page.set_attr(sibling, "class", CLASS_BILINGUAL);
    let text = page.text(translated);
    page.append_child(sibling, text);
    page.insert_after(block, sibling);
}

/// Rewrite every text node under the block, replacing each spanned substring
/// with an interactive unit. Returns the number of units inserted.
fn rewrite_block(page: &mut PageTree, block: NodeId, spans: &[MatchSpan<'_>]) -> usize {
    // Distinct replacement patterns, longest first so that at equal start
    // positions the longer alternative is taken.
    let mut patterns: Vec<(&str, &VocabularyEntry)> = Vec::new();
    for span in spans {
        if !patterns.iter().any(|(text, _)| *text == span.text) {
            patterns.push((span.text.as_str(), span.entry));
        }
    }
    patterns.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let text_nodes: Vec<NodeId> = page
        .descendants(block)
        .into_iter()
        .filter(|&n| page.is_text(n))
        .collect();

    let mut applied = 0;
    for node in text_nodes {
        // Never rewrite inside an already-annotated unit.
        if let Some(parent) = page.parent(node) {
            if page.in_subtree_with_attr(parent, ATTR_ENTRY_ID) {
                continue;
            }
        }
        let Some(text) = page.text_value(node).map(str::to_string) else {
            continue;
        };
        let segments = split_by_patterns(&text, &patterns);
        if segments.iter().all(|s| matches!(s, Segment::Plain(_))) {
            continue;
        }
        let mut replacements = Vec::with_capacity(segments.len());
        for segment in segments {
            match segment {
                Segment::Plain(t) => replacements.push(page.text(&t)),
                Segment::Unit { original, entry } => {
                    replacements.push(build_unit(page, &original, entry));
                    applied += 1;
                }
            }
        }
        page.replace_with(node, replacements);
    }
    applied
}

/// The interactive unit emitted per replaced span. The element carries
/// everything the renderer and the reversal path need; painting it is the
/// embedder's concern.
fn build_unit(page: &mut PageTree, original: &str, entry: &VocabularyEntry) -> NodeId {
    let unit = page.element("span");
    page.set_attr(unit, "class", CLASS_WORD);
    page.set_attr(unit, ATTR_ENTRY_ID, &entry.id);
    page.set_attr(unit, ATTR_ORIGINAL_TEXT, original);
    page.set_attr(unit, ATTR_CATEGORY, &format!("{:?}", entry.category));
    let headword = page.text(&entry.headword);
    page.append_child(unit, headword);
    unit
}

enum Segment<'a> {
    Plain(String),
    Unit {
        original: String,
        entry: &'a VocabularyEntry,
    },
}

/// Split `text` on literal occurrences of the patterns. Earliest occurrence
/// wins; at equal positions the longest pattern wins (patterns arrive sorted
/// longest-first).
fn split_by_patterns<'a>(
    text: &str,
    patterns: &[(&str, &'a VocabularyEntry)],
) -> Vec<Segment<'a>> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    while cursor < text.len() {
        let rest = &text[cursor..];
        let mut best: Option<(usize, &str, &'a VocabularyEntry)> = None;
        for &(pattern, entry) in patterns {
            if let Some(pos) = rest.find(pattern) {
                if best.map(|(b, _, _)| pos < b).unwrap_or(true) {
                    best = Some((pos, pattern, entry));
                }
            }
        }
        match best {
            Some((pos, pattern, entry)) => {
                if pos > 0 {
                    segments.push(Segment::Plain(rest[..pos].to_string()));
                }
                segments.push(Segment::Unit {
                    original: pattern.to_string(),
                    entry,
                });
                cursor += pos + pattern.len();
            }
            None => {
                segments.push(Segment::Plain(rest.to_string()));
                break;
            }
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::WordCategory;

    fn page_with_block(text: &str) -> (PageTree, NodeId) {
        let mut page = PageTree::new();
        let p = page.element("p");
        let t = page.text(text);
        page.append_child(p, t);
        let root = page.root();
        page.append_child(root, p);
        (page, p)
    }

    fn entry(headword: &str, definition: &str) -> VocabularyEntry {
        VocabularyEntry::new(headword, definition, WordCategory::Want)
    }

    #[test]
    fn annotates_and_stamps_done() {
        let (mut page, block) = page_with_block("中国是一个大国");
        let candidates = vec![entry("china", "中国")];
        let state = apply_translation(
            &mut page,
            block,
            "中国是一个大国",
            "China is a big country",
            &candidates,
            false,
            true,
        );
        assert_eq!(state, ScanState::Done);
        assert_eq!(page.scan_state(block), Some(ScanState::Done));

        // Replaced fragment renders the headword, rest untouched.
        assert_eq!(page.text_content(block), "china是一个大国");

        let unit = page
            .descendants(block)
            .into_iter()
            .find(|&n| page.attr(n, ATTR_ENTRY_ID).is_some())
            .expect("unit inserted");
        assert_eq!(page.attr(unit, ATTR_ORIGINAL_TEXT), Some("中国"));
        assert_eq!(page.attr(unit, ATTR_ENTRY_ID), Some(candidates[0].id.as_str()));
    }

    #[test]
    fn round_trip_restores_original_text() {
        let source = "银行在河岸边";
        let (mut page, block) = page_with_block(source);
        let candidates = vec![entry("bank", "银行; 岸")];
        apply_translation(
            &mut page,
            block,
            source,
            "the bank is by the river bank",
            &candidates,
            false,
            true,
        );
        // Reassemble the source from plain text and original-text attributes.
        let mut rebuilt = String::new();
        for n in page.descendants(block) {
            if let Some(original) = page.attr(n, ATTR_ORIGINAL_TEXT) {
                rebuilt.push_str(original);
            } else if page.is_text(n) {
                if let Some(p) = page.parent(n) {
                    if page.in_subtree_with_attr(p, ATTR_ENTRY_ID) {
                        continue;
                    }
                }
                rebuilt.push_str(page.text_value(n).unwrap());
            }
        }
        assert_eq!(rebuilt, source);
    }

    #[test]
    fn verification_failure_stamps_no_target_match() {
        let (mut page, block) = page_with_block("中国是一个大国");
        let candidates = vec![entry("middle", "中")];
        let state = apply_translation(
            &mut page,
            block,
            "中国是一个大国",
            "China is a big country",
            &candidates,
            false,
            true,
        );
        assert_eq!(state, ScanState::SkippedNoTargetMatch);
        assert_eq!(page.text_content(block), "中国是一个大国");
    }

    #[test]
    fn span_absence_stamps_fuzzy_fail() {
        let (mut page, block) = page_with_block("今天天气很好");
        let candidates = vec![entry("china", "中国")];
        let state = apply_translation(
            &mut page,
            block,
            "今天天气很好",
            "china is mentioned here somehow",
            &candidates,
            false,
            true,
        );
        assert_eq!(state, ScanState::SkippedFuzzyFail);
    }

    #[test]
    fn bilingual_sibling_inserted_once() {
        let (mut page, block) = page_with_block("中国是一个大国");
        let candidates = vec![entry("china", "中国")];
        apply_translation(
            &mut page,
            block,
            "中国是一个大国",
            "China is a big country",
            &candidates,
            true,
            true,
        );
        insert_bilingual_sibling(&mut page, block, "China is a big country");
        let root = page.root();
        let bilingual: Vec<_> = page
            .children(root)
            .iter()
            .filter(|&&n| page.attr(n, "class") == Some(CLASS_BILINGUAL))
            .collect();
        assert_eq!(bilingual.len(), 1);
    }

    #[test]
    fn nested_text_nodes_are_rewritten() {
        let mut page = PageTree::new();
        let p = page.element("p");
        let t1 = page.text("我爱");
        let em = page.element("em");
        let t2 = page.text("中国");
        page.append_child(em, t2);
        page.append_child(p, t1);
        page.append_child(p, em);
        let root = page.root();
        page.append_child(root, p);

        let candidates = vec![entry("china", "中国")];
        let state = apply_translation(
            &mut page,
            p,
            "我爱中国",
            "I love China",
            &candidates,
            false,
            true,
        );
        assert_eq!(state, ScanState::Done);
        assert_eq!(page.text_content(p), "我爱china");
    }
}
