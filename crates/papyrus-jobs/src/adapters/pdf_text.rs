//! PdfText extraction adapter - extracts text from PDFs using `pdftotext` (poppler-utils).

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::process::Command;
use tracing::{debug, warn};

use papyrus_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use papyrus_core::{Error, ExtractionAdapter, FileType, RawExtraction, Result};

use super::command::{binary_available, run_cmd_with_timeout, write_temp_file};

/// Adapter for extracting text from PDF files using `pdftotext`.
///
/// `pdfinfo` supplies the page count and document properties; a failure
/// there is logged and extraction continues without metadata. Layout is
/// preserved (`-layout`) so that section headers stay on their own lines.
pub struct PdfTextAdapter;

/// Parse `pdfinfo` output into a JSON metadata object.
fn parse_pdfinfo(output: &str) -> JsonValue {
    let mut metadata = serde_json::Map::new();

    for line in output.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_lowercase().replace(' ', "_");
            let value = value.trim();
            if !value.is_empty() {
                if key == "pages" {
                    if let Ok(pages) = value.parse::<u64>() {
                        metadata.insert(key, JsonValue::Number(pages.into()));
                        continue;
                    }
                }
                metadata.insert(key, JsonValue::String(value.to_string()));
            }
        }
    }

    JsonValue::Object(metadata)
}

/// Get page count from pdfinfo metadata.
fn page_count(metadata: &JsonValue) -> Option<usize> {
    metadata
        .get("pages")
        .and_then(|v| v.as_u64())
        .filter(|&pages| pages > 0)
        .map(|pages| pages as usize)
}

#[async_trait]
impl ExtractionAdapter for PdfTextAdapter {
    fn file_type(&self) -> FileType {
        FileType::Pdf
    }

    async fn extract(&self, data: &[u8], filename: &str) -> Result<RawExtraction> {
        if data.is_empty() {
            return Err(Error::Extraction(
                "Cannot extract text from empty PDF data".to_string(),
            ));
        }

        if data.len() < 4 || &data[0..4] != b"%PDF" {
            return Err(Error::Extraction(format!(
                "File '{}' is not a valid PDF (missing %PDF header)",
                filename
            )));
        }

        let tmpfile = write_temp_file(data, ".pdf")?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        let metadata = match run_cmd_with_timeout(
            Command::new("pdfinfo").arg(&tmp_path),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await
        {
            Ok(output) => parse_pdfinfo(&output),
            Err(e) => {
                warn!(
                    subsystem = "extraction",
                    filename,
                    error = %e,
                    "pdfinfo failed, continuing without metadata"
                );
                serde_json::json!({})
            }
        };
        let pages = page_count(&metadata);

        debug!(subsystem = "extraction", filename, ?pages, "Running pdftotext");
        let text = run_cmd_with_timeout(
            Command::new("pdftotext")
                .arg("-layout")
                .arg("-enc")
                .arg("UTF-8")
                .arg(&tmp_path)
                .arg("-"),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?;

        Ok(RawExtraction {
            text: text.replace('\u{000C}', "\n"),
            page_count: pages,
            metadata,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(binary_available("pdftotext", "-v").await)
    }

    fn name(&self) -> &str {
        "pdf_text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_text_identity() {
        let adapter = PdfTextAdapter;
        assert_eq!(adapter.file_type(), FileType::Pdf);
        assert_eq!(adapter.name(), "pdf_text");
    }

    #[tokio::test]
    async fn test_pdf_text_health_check() {
        // Passes whether or not poppler-utils is installed
        let result = PdfTextAdapter.health_check().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_pdf_text_empty_input() {
        let err = PdfTextAdapter.extract(b"", "empty.pdf").await.unwrap_err();
        assert!(err.to_string().contains("empty"), "got: {}", err);
    }

    #[tokio::test]
    async fn test_pdf_text_invalid_pdf() {
        let err = PdfTextAdapter
            .extract(b"not a pdf at all", "bad.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
        assert!(err.to_string().contains("not a valid PDF"), "got: {}", err);
    }

    #[tokio::test]
    async fn test_pdf_text_extraction() {
        let pdf_bytes = b"%PDF-1.0
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj

2 0 obj
<< /Type /Pages /Kids [3 0 R] /Count 1 >>
endobj

3 0 obj
<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792]
   /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>
endobj

4 0 obj
<< /Length 44 >>
stream
BT /F1 12 Tf 100 700 Td (Hello World) Tj ET
endstream
endobj

5 0 obj
<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>
endobj

xref
0 6
0000000000 65535 f
0000000009 00000 n
0000000058 00000 n
0000000115 00000 n
0000000266 00000 n
0000000360 00000 n

trailer
<< /Size 6 /Root 1 0 R >>
startxref
434
%%EOF";

        let adapter = PdfTextAdapter;
        if !adapter.health_check().await.unwrap_or(false) {
            eprintln!("Skipping test_pdf_text_extraction: pdftotext not installed");
            return;
        }

        let extraction = adapter.extract(pdf_bytes, "hello.pdf").await;
        assert!(extraction.is_ok(), "Extraction failed: {:?}", extraction.err());
        let extraction = extraction.unwrap();
        assert!(
            extraction.text.contains("Hello World"),
            "got: {}",
            extraction.text
        );
    }

    #[test]
    fn test_pdfinfo_metadata_parsing() {
        let pdfinfo_output = "\
Title:          Attention Is All You Need
Author:         Vaswani et al.
Producer:       pdfTeX-1.40.25
Pages:          15
Page size:      612 x 792 pts (letter)
";
        let metadata = parse_pdfinfo(pdfinfo_output);
        assert_eq!(metadata["title"], "Attention Is All You Need");
        assert_eq!(metadata["author"], "Vaswani et al.");
        assert_eq!(metadata["pages"], 15);
        assert_eq!(metadata["page_size"], "612 x 792 pts (letter)");
        assert_eq!(page_count(&metadata), Some(15));
    }

    #[test]
    fn test_page_count_missing_or_invalid() {
        assert_eq!(page_count(&serde_json::json!({})), None);
        assert_eq!(page_count(&serde_json::json!({"pages": 0})), None);
        assert_eq!(page_count(&serde_json::json!({"pages": "many"})), None);
    }
}
