//! Section detection for extracted paper text.
//!
//! Lines that look like headings start a new section: well-known paper
//! headings (optionally numbered), numbered headings such as `2.1 Setup`,
//! and short ALL-CAPS lines. Text without any heading is grouped into
//! sections of roughly [`SECTION_TARGET_WORDS`] words.

use once_cell::sync::Lazy;
use regex::Regex;

use papyrus_core::defaults::SECTION_TARGET_WORDS;
use papyrus_core::Section;

static KNOWN_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:\d+(?:\.\d+)*\.?\s+|[IVX]+\.\s+)?(abstract|introduction|background|related\s+work|methods?|methodology|materials\s+and\s+methods|experiments?|experimental\s+setup|results(?:\s+and\s+discussion)?|discussion|conclusions?|references|bibliography|acknowledge?ments?)\s*:?$",
    )
    .expect("valid regex")
});

static NUMBERED_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+(?:\.\d+)*\.?\s+\p{Lu}[^.!?;:]{0,80}$").expect("valid regex")
});

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

const PREAMBLE_TITLE: &str = "Preamble";
const MAX_HEADING_WORDS: usize = 10;

/// Whether a trimmed line reads as a section heading.
pub fn is_heading(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() || line.split_whitespace().count() > MAX_HEADING_WORDS {
        return false;
    }
    KNOWN_HEADING.is_match(line) || NUMBERED_HEADING.is_match(line) || is_all_caps_heading(line)
}

fn is_all_caps_heading(line: &str) -> bool {
    let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 3
        && line.chars().count() <= 60
        && letters.iter().all(|c| c.is_uppercase())
}

/// Split `text` into titled sections.
pub fn split_sections(text: &str) -> Vec<Section> {
    let sections = split_on_headings(text);
    if sections.iter().any(|s| s.title != PREAMBLE_TITLE) {
        sections
    } else {
        group_paragraphs(text, SECTION_TARGET_WORDS)
    }
}

fn split_on_headings(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut title = PREAMBLE_TITLE.to_string();
    let mut body: Vec<&str> = Vec::new();

    for line in text.lines() {
        if is_heading(line) {
            push_section(&mut sections, &title, &body);
            title = line.trim().trim_end_matches(':').to_string();
            body.clear();
        } else {
            body.push(line);
        }
    }
    push_section(&mut sections, &title, &body);
    sections
}

fn push_section(sections: &mut Vec<Section>, title: &str, body: &[&str]) {
    let content = body.join("\n").trim().to_string();
    if content.is_empty() {
        return;
    }
    sections.push(Section {
        title: title.to_string(),
        word_count: content.split_whitespace().count(),
        content,
    });
}

/// Group paragraphs into sections of about `target_words` words.
pub fn group_paragraphs(text: &str, target_words: usize) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut words = 0;

    for paragraph in PARAGRAPH_BREAK.split(text) {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        current.push(paragraph);
        words += paragraph.split_whitespace().count();
        if words >= target_words {
            flush_group(&mut sections, &mut current, &mut words);
        }
    }
    flush_group(&mut sections, &mut current, &mut words);
    sections
}

fn flush_group(sections: &mut Vec<Section>, current: &mut Vec<&str>, words: &mut usize) {
    if current.is_empty() {
        return;
    }
    sections.push(Section {
        title: format!("Section {}", sections.len() + 1),
        content: current.join("\n\n"),
        word_count: *words,
    });
    current.clear();
    *words = 0;
}
