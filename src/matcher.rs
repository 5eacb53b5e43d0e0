//! Context-verified fuzzy matcher.
//! Pure functions from (source text, translated text, candidates) to a
//! non-overlapping set of replacement spans. Never errors: ambiguous or
//! absent data is simply "no match".

use crate::vocab::VocabularyEntry;

/// Separator punctuation splitting a definition into literal alternatives
/// ("银行; 岸" → ["银行", "岸"]).
const DEFINITION_SEPARATORS: [char; 6] = [',', ';', '，', '；', '、', '/'];

/// A resolved replacement decision: the exact source substring, its byte
/// offset within the block text, and the entry it resolves to.
#[derive(Debug, Clone)]
pub struct MatchSpan<'a> {
    pub text: String,
    pub offset: usize,
    pub entry: &'a VocabularyEntry,
}

impl MatchSpan<'_> {
    fn end(&self) -> usize {
        self.offset + self.text.len()
    }

    fn overlaps(&self, other: &Self) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// Step 1 — context verification.
/// An entry survives only if its headword (or, when `match_inflections`, any
/// listed inflection) appears case-insensitively in the translated text.
/// This is what stops a single native character from matching a definition
/// fragment whose English concept was never present in the translation.
/// `None` translated text (preview mode) skips verification entirely.
pub fn verify_context<'a>(
    candidates: &'a [VocabularyEntry],
    translated: Option<&str>,
    match_inflections: bool,
) -> Vec<&'a VocabularyEntry> {
    let Some(translated) = translated else {
        return candidates.iter().collect();
    };
    let haystack = translated.to_lowercase();
    candidates
        .iter()
        .filter(|entry| {
            if !entry.headword.is_empty() && haystack.contains(&entry.headword.to_lowercase()) {
                return true;
            }
            match_inflections
                && entry
                    .inflections
                    .iter()
                    .any(|infl| !infl.is_empty() && haystack.contains(&infl.to_lowercase()))
        })
        .collect()
}

/// Steps 2 and 3 — span discovery and conflict resolution.
/// Every literal occurrence of every definition alternative becomes a
/// candidate span; overlapping candidates are resolved longest-first, ties
/// by discovery order. Output is sorted by offset and guaranteed
/// non-overlapping.
pub fn find_spans<'a>(source: &str, verified: &[&'a VocabularyEntry]) -> Vec<MatchSpan<'a>> {
    let mut candidates: Vec<MatchSpan<'a>> = Vec::new();
    for &entry in verified {
        for alternative in entry.definition.split(DEFINITION_SEPARATORS) {
            let alternative = alternative.trim();
            if alternative.is_empty() {
                continue;
            }
            // Literal substring search, not regex.
            for (offset, text) in source.match_indices(alternative) {
                candidates.push(MatchSpan {
                    text: text.to_string(),
                    offset,
                    entry,
                });
            }
        }
    }

    // Longest span wins among overlaps; equal lengths fall back to
    // discovery order (sort is stable).
    candidates.sort_by(|a, b| b.text.len().cmp(&a.text.len()));

    let mut kept: Vec<MatchSpan<'a>> = Vec::new();
    for span in candidates {
        if kept.iter().all(|k| !k.overlaps(&span)) {
            kept.push(span);
        }
    }
    kept.sort_by_key(|s| s.offset);
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::WordCategory;

    fn entry(headword: &str, definition: &str) -> VocabularyEntry {
        VocabularyEntry::new(headword, definition, WordCategory::Want)
    }

    #[test]
    fn verified_headword_matches_literal_span() {
        let candidates = vec![entry("china", "中国")];
        let verified = verify_context(&candidates, Some("China is a big country"), true);
        let spans = find_spans("中国是一个大国", &verified);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "中国");
        assert_eq!(spans[0].offset, 0);
        assert_eq!(spans[0].entry.headword, "china");
    }

    #[test]
    fn context_verification_rejects_absent_concept() {
        // "中" alone would match, but "middle" never appears in the
        // translation, so the entry must be filtered out.
        let candidates = vec![entry("middle", "中")];
        let verified = verify_context(&candidates, Some("China is a big country"), true);
        assert!(verified.is_empty());
        let spans = find_spans("中国是一个大国", &verified);
        assert!(spans.is_empty());
    }

    #[test]
    fn verification_is_case_insensitive() {
        let candidates = vec![entry("China", "中国")];
        let verified = verify_context(&candidates, Some("CHINA is big"), true);
        assert_eq!(verified.len(), 1);
    }

    #[test]
    fn inflections_pass_verification_when_enabled() {
        let candidates =
            vec![entry("run", "跑").with_inflections(&["ran", "running"])];
        let verified = verify_context(&candidates, Some("he was running fast"), true);
        assert_eq!(verified.len(), 1);
        let off = verify_context(&candidates, Some("he was running fast"), false);
        assert!(off.is_empty());
    }

    #[test]
    fn preview_mode_accepts_all_candidates() {
        let candidates = vec![entry("middle", "中")];
        let verified = verify_context(&candidates, None, true);
        assert_eq!(verified.len(), 1);
        let spans = find_spans("中间", &verified);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "中");
    }

    #[test]
    fn empty_translation_fails_all_candidates() {
        let candidates = vec![entry("china", "中国")];
        let verified = verify_context(&candidates, Some(""), true);
        assert!(verified.is_empty());
    }

    #[test]
    fn longer_overlapping_span_wins() {
        let e1 = entry("china", "中国");
        let e2 = entry("country", "国家");
        let verified = vec![&e1, &e2];
        // "中国家" contains 中国 (0..6) and 国家 (3..9); they overlap and
        // the tie on length falls to the first-discovered (中国).
        let spans = find_spans("中国家很大", &verified);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "中国");

        let e3 = entry("motherland", "祖国");
        let e4 = entry("homeland-x", "祖国大地");
        let verified = vec![&e3, &e4];
        let spans = find_spans("祖国大地辽阔", &verified);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "祖国大地");
    }

    #[test]
    fn surviving_spans_never_overlap() {
        let e1 = entry("a", "大国");
        let e2 = entry("b", "国大");
        let e3 = entry("c", "一个大国");
        let verified = vec![&e1, &e2, &e3];
        let spans = find_spans("这是一个大国一个大国", &verified);
        for i in 0..spans.len() {
            for j in (i + 1)..spans.len() {
                assert!(!spans[i].overlaps(&spans[j]));
            }
        }
    }

    #[test]
    fn definition_alternatives_each_match() {
        let e = entry("bank", "银行; 岸");
        let verified = vec![&e];
        let spans = find_spans("河岸边有一家银行", &verified);
        assert_eq!(spans.len(), 2);
        let texts: Vec<&str> = spans.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["岸", "银行"]);
    }

    #[test]
    fn empty_definition_never_matches() {
        let e = entry("ghost", "");
        let verified = vec![&e];
        assert!(find_spans("中国是一个大国", &verified).is_empty());

        let e = entry("ghost", " ; ");
        let verified = vec![&e];
        assert!(find_spans("中国是一个大国", &verified).is_empty());
    }

    #[test]
    fn single_char_alternative_matches_exactly() {
        let e = entry("middle", "中");
        let verified = vec![&e];
        let spans = find_spans("中中", &verified);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].offset, 0);
        assert_eq!(spans[1].offset, "中".len());
        for s in &spans {
            assert_eq!(s.text, "中");
        }
    }

    #[test]
    fn multiple_occurrences_all_found() {
        let e = entry("china", "中国");
        let verified = vec![&e];
        let spans = find_spans("中国很大，我爱中国", &verified);
        assert_eq!(spans.len(), 2);
        assert!(spans[0].offset < spans[1].offset);
    }
}
