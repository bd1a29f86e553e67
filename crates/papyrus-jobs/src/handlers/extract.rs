//! ExtractHandler - file bytes → text → sections, metadata and key sentences.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use papyrus_core::defaults::{PROGRESS_GENERATED, PROGRESS_TEXT_READY};
use papyrus_core::{
    Error, ExtractedDocument, ExtractionOptions, Repositories, Result, Task, TaskType,
};
use papyrus_inference::DocumentAnalyzer;

use crate::extraction::ExtractionRegistry;
use crate::handler::{JobContext, TaskHandler};
use crate::metadata::document_metadata;
use crate::sections::split_sections;

pub struct ExtractHandler {
    repos: Repositories,
    registry: Arc<ExtractionRegistry>,
}

impl ExtractHandler {
    pub fn new(repos: Repositories, registry: Arc<ExtractionRegistry>) -> Self {
        Self { repos, registry }
    }
}

#[async_trait]
impl TaskHandler for ExtractHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Extract
    }

    fn requires_llm(&self, task: &Task) -> bool {
        task.options_as::<ExtractionOptions>().key_sentences
    }

    async fn execute(&self, ctx: JobContext) -> Result<JsonValue> {
        let start = Instant::now();
        let file_id = ctx.file_id()?;
        let options: ExtractionOptions = ctx.options_as();

        let file = self
            .repos
            .documents
            .get_unscoped(file_id)
            .await?
            .ok_or(Error::FileNotFound(file_id))?;
        let file_type = file.kind().ok_or_else(|| {
            Error::Extraction(format!("Unsupported file type: {}", file.file_type))
        })?;

        let data = tokio::fs::read(&file.storage_path).await.map_err(|e| {
            Error::Extraction(format!(
                "Failed to read '{}' from storage: {}",
                file.filename, e
            ))
        })?;

        debug!(
            subsystem = "jobs",
            component = "extract",
            file_id = %file_id,
            file_type = %file_type,
            size = data.len(),
            "Extracting document text"
        );
        let raw = self
            .registry
            .extract(file_type, &data, &file.filename)
            .await?;
        let text = raw.text.trim().to_string();
        if text.is_empty() {
            return Err(Error::Extraction(format!(
                "No text could be extracted from '{}'",
                file.filename
            )));
        }
        ctx.report_progress(PROGRESS_TEXT_READY, Some("Text extracted"));

        let sections = options.split_sections.then(|| split_sections(&text));
        let metadata = options
            .include_metadata
            .then(|| document_metadata(&text, data.len() as u64, file_type, raw.page_count));

        let key_sentences = if options.key_sentences {
            let analyzer = DocumentAnalyzer::new(ctx.backend()?);
            let labelled = analyzer.classify_key_sentences(&text).await?;
            ctx.report_progress(PROGRESS_GENERATED, Some("Key sentences classified"));
            Some(labelled)
        } else {
            None
        };

        info!(
            subsystem = "jobs",
            component = "extract",
            file_id = %file_id,
            text_len = text.len(),
            section_count = sections.as_ref().map_or(0, Vec::len),
            duration_ms = start.elapsed().as_millis() as u64,
            "Extraction completed"
        );

        let document = ExtractedDocument {
            extracted_text: text,
            sections,
            metadata,
            key_sentences,
        };
        Ok(serde_json::to_value(document)?)
    }
}
