//! TextNative extraction adapter - handles plain text files.

use async_trait::async_trait;
use serde_json::json;

use papyrus_core::{ExtractionAdapter, FileType, RawExtraction, Result};

/// Adapter for extracting content from plain text files.
///
/// Reads bytes as UTF-8 (with lossy conversion for invalid sequences).
/// A leading byte-order mark is dropped.
pub struct TextNativeAdapter;

#[async_trait]
impl ExtractionAdapter for TextNativeAdapter {
    fn file_type(&self) -> FileType {
        FileType::Txt
    }

    async fn extract(&self, data: &[u8], _filename: &str) -> Result<RawExtraction> {
        let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
        let text = String::from_utf8_lossy(data).into_owned();
        let line_count = text.lines().count();

        Ok(RawExtraction {
            metadata: json!({
                "byte_count": data.len(),
                "line_count": line_count,
            }),
            text,
            page_count: None,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true) // No external dependencies
    }

    fn name(&self) -> &str {
        "text_native"
    }
}
