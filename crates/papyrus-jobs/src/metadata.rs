//! Document statistics computed from extracted text.

use papyrus_core::defaults::{CJK_LANGUAGE_THRESHOLD, WORDS_PER_PAGE};
use papyrus_core::{DocumentMetadata, FileType};

/// Whether a character belongs to the common CJK ideograph blocks.
fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}')
}

/// `zh` when CJK characters make up more than 30% of the non-whitespace text.
pub fn detect_language(text: &str) -> &'static str {
    let (cjk, total) = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .fold((0usize, 0usize), |(cjk, total), c| {
            (cjk + usize::from(is_cjk(c)), total + 1)
        });
    if total > 0 && cjk as f64 / total as f64 > CJK_LANGUAGE_THRESHOLD {
        "zh"
    } else {
        "en"
    }
}

/// Estimated page count for documents that do not report one.
pub fn estimate_pages(word_count: usize) -> usize {
    (word_count / WORDS_PER_PAGE).max(1)
}

/// Build metadata for an extracted document.
///
/// `reported_pages` is the page count the document itself declares (PDF);
/// otherwise the count is estimated from the word count.
pub fn document_metadata(
    text: &str,
    file_size: u64,
    file_type: FileType,
    reported_pages: Option<usize>,
) -> DocumentMetadata {
    let word_count = text.split_whitespace().count();
    DocumentMetadata {
        file_size,
        word_count,
        char_count: text.chars().count(),
        page_count: reported_pages
            .filter(|&p| p > 0)
            .unwrap_or_else(|| estimate_pages(word_count)),
        language: detect_language(text).to_string(),
        file_type: file_type.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_language_english() {
        assert_eq!(detect_language("Attention is all you need."), "en");
        assert_eq!(detect_language(""), "en");
    }

    #[test]
    fn test_detect_language_chinese() {
        assert_eq!(detect_language("本文研究了注意力机制在文本理解中的作用"), "zh");
    }

    #[test]
    fn test_detect_language_mixed_below_threshold() {
        // 4 CJK chars out of 24 non-whitespace chars
        assert_eq!(detect_language("Transformer model 注意力机制 evaluation"), "en");
    }

    #[test]
    fn test_estimate_pages() {
        assert_eq!(estimate_pages(0), 1);
        assert_eq!(estimate_pages(299), 1);
        assert_eq!(estimate_pages(900), 3);
    }

    #[test]
    fn test_document_metadata_txt() {
        let text = "word ".repeat(650);
        let meta = document_metadata(&text, 3250, FileType::Txt, None);

        assert_eq!(meta.word_count, 650);
        assert_eq!(meta.char_count, 3250);
        assert_eq!(meta.page_count, 2);
        assert_eq!(meta.language, "en");
        assert_eq!(meta.file_type, "txt");
        assert_eq!(meta.file_size, 3250);
    }

    #[test]
    fn test_document_metadata_uses_reported_pages() {
        let meta = document_metadata("short text", 1024, FileType::Pdf, Some(12));
        assert_eq!(meta.page_count, 12);
        assert_eq!(meta.file_type, "pdf");

        let meta = document_metadata("short text", 1024, FileType::Pdf, Some(0));
        assert_eq!(meta.page_count, 1);
    }
}
