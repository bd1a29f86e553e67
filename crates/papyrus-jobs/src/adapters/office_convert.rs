//! OfficeConvertAdapter - converts Word documents to plain text using pandoc.

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;
use tracing::debug;

use papyrus_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use papyrus_core::{Error, ExtractionAdapter, FileType, RawExtraction, Result};

use super::command::{binary_available, run_cmd_with_timeout, write_temp_file};

/// ZIP local file header; every .docx starts with it.
const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

pub struct OfficeConvertAdapter;

#[async_trait]
impl ExtractionAdapter for OfficeConvertAdapter {
    fn file_type(&self) -> FileType {
        FileType::Docx
    }

    async fn extract(&self, data: &[u8], filename: &str) -> Result<RawExtraction> {
        if data.is_empty() {
            return Err(Error::Extraction("Cannot convert empty document".to_string()));
        }
        if !data.starts_with(ZIP_MAGIC) {
            return Err(Error::Extraction(format!(
                "File '{}' is not a valid DOCX document",
                filename
            )));
        }

        let tmpfile = write_temp_file(data, ".docx")?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        debug!(subsystem = "extraction", filename, "Converting with pandoc");

        // pandoc -f docx -t plain --wrap=none INPUT
        let text = run_cmd_with_timeout(
            Command::new("pandoc")
                .arg("-f")
                .arg("docx")
                .arg("-t")
                .arg("plain")
                .arg("--wrap=none")
                .arg(&tmp_path),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?;

        Ok(RawExtraction {
            metadata: json!({
                "format": "docx",
                "converter": "pandoc",
                "line_count": text.lines().count(),
            }),
            text,
            page_count: None,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(binary_available("pandoc", "--version").await)
    }

    fn name(&self) -> &str {
        "office_convert"
    }
}
