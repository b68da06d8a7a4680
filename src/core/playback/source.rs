//! Paragraph sources.

use std::collections::HashMap;
use std::path::Path;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use xxhash_rust::xxh3::xxh3_64;

use super::state::Paragraph;

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));
static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static FOOTNOTE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+|[a-z]|citation needed)\]").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Supplies the ordered paragraphs of a document and their narration text.
pub trait ParagraphSource: Send + Sync {
    fn paragraphs(&self) -> Vec<Paragraph>;

    /// Text to speak for `paragraph`, stripped of presentation artifacts.
    /// An empty string marks a silent paragraph.
    fn plain_text(&self, paragraph: &Paragraph) -> String;
}

/// Paragraphs split from plain text on blank lines.
pub struct TextParagraphSource {
    paragraphs: RwLock<Vec<Paragraph>>,
}

impl TextParagraphSource {
    pub fn from_text(text: &str) -> Self {
        Self {
            paragraphs: RwLock::new(split_paragraphs(text)),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_text(&text))
    }

    /// Swaps in a new document; callers reload the controller afterwards.
    pub fn replace_text(&self, text: &str) {
        *self.paragraphs.write() = split_paragraphs(text);
    }

    pub fn len(&self) -> usize {
        self.paragraphs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paragraphs.read().is_empty()
    }
}

impl ParagraphSource for TextParagraphSource {
    fn paragraphs(&self) -> Vec<Paragraph> {
        self.paragraphs.read().clone()
    }

    fn plain_text(&self, paragraph: &Paragraph) -> String {
        narration_text(&paragraph.text)
    }
}

/// Splits `text` on blank lines, keeping paragraphs that contain anything but
/// whitespace. Ids hash the paragraph text so they survive edits elsewhere in
/// the document; repeated text gets an occurrence suffix.
pub fn split_paragraphs(text: &str) -> Vec<Paragraph> {
    let normalized = text.replace("\r\n", "\n");
    let mut seen: HashMap<u64, usize> = HashMap::new();
    BLANK_LINES
        .split(&normalized)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .enumerate()
        .map(|(index, block)| {
            let hash = xxh3_64(block.as_bytes());
            let occurrence = seen.entry(hash).or_insert(0);
            let id = match *occurrence {
                0 => format!("p-{hash:016x}"),
                n => format!("p-{hash:016x}-{n}"),
            };
            *occurrence += 1;
            Paragraph {
                index,
                id,
                text: block.to_string(),
            }
        })
        .collect()
}

/// Removes markup tags, footnote markers and entity escapes, then collapses whitespace.
pub fn narration_text(raw: &str) -> String {
    let without_tags = MARKUP_TAG.replace_all(raw, " ");
    let without_notes = FOOTNOTE_MARKER.replace_all(&without_tags, "");
    let decoded = without_notes
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_on_blank_lines() {
        let paragraphs = split_paragraphs("First line\nstill first.\n\n\n  Second.  \r\n\r\nThird.");
        assert_eq!(paragraphs.len(), 3);
        assert_eq!(paragraphs[0].text, "First line\nstill first.");
        assert_eq!(paragraphs[1].text, "Second.");
        assert_eq!(paragraphs[2].index, 2);
    }

    #[test]
    fn test_ids_are_stable_and_distinct() {
        let a = split_paragraphs("Alpha.\n\nBeta.");
        let b = split_paragraphs("Alpha.\n\nBeta.");
        assert_eq!(a, b);
        assert_ne!(a[0].id, a[1].id);
        assert!(a[0].id.starts_with("p-"));

        let shifted = split_paragraphs("Preface.\n\nAlpha.\n\nBeta.");
        assert_eq!(shifted[1].id, a[0].id);
    }

    #[test]
    fn test_repeated_text_gets_distinct_ids() {
        let paragraphs = split_paragraphs("* * *\n\nMiddle.\n\n* * *");
        assert_ne!(paragraphs[0].id, paragraphs[2].id);
        assert!(paragraphs[2].id.ends_with("-1"));
    }

    #[test]
    fn test_narration_text_strips_markup() {
        assert_eq!(
            narration_text("<p>The <em>quick</em>   fox[12] jumped &amp; ran.[a]</p>"),
            "The quick fox jumped & ran."
        );
        assert_eq!(narration_text("<img src=\"x.png\">"), "");
    }

    #[test]
    fn test_replace_text_reloads() {
        let source = TextParagraphSource::from_text("One.");
        assert_eq!(source.len(), 1);
        source.replace_text("One.\n\nTwo.\n\nThree.");
        assert_eq!(source.paragraphs().len(), 3);
        source.replace_text("   ");
        assert!(source.is_empty());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "Hello.\n\nWorld.").unwrap();
        let source = TextParagraphSource::from_file(&path).unwrap();
        let paragraphs = source.paragraphs();
        assert_eq!(source.plain_text(&paragraphs[1]), "World.");
    }
}
