//! Language helpers: Han-character detection for block eligibility and
//! whatlang-backed source-language detection used as an engine hint.

/// Whether `c` falls in the CJK Unified Ideographs block.
/// Matches the eligibility rule: a block must contain at least one
/// native-language character to be worth translating.
pub fn is_han(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

pub fn contains_han(text: &str) -> bool {
    text.chars().any(is_han)
}

/// Detect the dominant language of `text`. Returns an ISO 639-1 code, or
/// None when detection is unreliable. Used only as a hint for the engine;
/// the pipeline never branches on it.
pub fn detect_language(text: &str) -> Option<String> {
    let info = whatlang::detect(text)?;
    if !info.is_reliable() {
        return None;
    }
    Some(lang_to_code(info.lang()))
}

fn lang_to_code(lang: whatlang::Lang) -> String {
    use whatlang::Lang::*;
    match lang {
        Eng => "en",
        Cmn => "zh",
        Jpn => "ja",
        Kor => "ko",
        Fra => "fr",
        Deu => "de",
        Spa => "es",
        Rus => "ru",
        _ => "other",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn han_detection() {
        assert!(contains_han("中国是一个大国"));
        assert!(contains_han("mixed 文本 text"));
        assert!(!contains_han("plain latin text"));
        assert!(!contains_han("123 !?"));
    }

    #[test]
    fn detects_chinese() {
        assert_eq!(
            detect_language("今天天气很好，我们一起去公园散步吧").as_deref(),
            Some("zh")
        );
    }
}
