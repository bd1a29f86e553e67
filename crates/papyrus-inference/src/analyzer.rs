//! LLM-backed document analysis: summaries, question answering, rewriting,
//! mindmaps and key-sentence classification.
//!
//! Model output is parsed leniently. When a reply is not valid JSON the raw
//! text is used where a text field is expected, and structured fields fall
//! back to empty values.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info, warn};

use papyrus_core::{
    defaults, ConversationTurn, Error, GenerationBackend, MindmapNode, MindmapOptions,
    MindmapResult, MindmapStructure, QaAnswer, QaSource, Result, RewriteOptions, RewriteResult,
    SummaryOptions, SummaryResult, SummaryStatistics,
};

use crate::json::{extract_json_object, string_field, string_list};
use crate::prompts;

/// Runs analysis prompts against a generation backend.
#[derive(Clone)]
pub struct DocumentAnalyzer {
    backend: Arc<dyn GenerationBackend>,
}

impl DocumentAnalyzer {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    async fn generate(&self, op: &'static str, system: &str, prompt: &str) -> Result<String> {
        let start = Instant::now();
        let response = if system.is_empty() {
            self.backend.generate(prompt).await?
        } else {
            self.backend.generate_with_system(system, prompt).await?
        };
        debug!(
            subsystem = "inference",
            component = "analyzer",
            op,
            model = %self.backend.model_name(),
            response_len = response.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Analysis prompt answered"
        );
        Ok(response)
    }

    /// Summarize `text`.
    pub async fn summarize(&self, text: &str, options: &SummaryOptions) -> Result<SummaryResult> {
        require_text(text, "Document text is empty")?;

        let response = self
            .generate("summarize", "", &prompts::summary_prompt(text, options))
            .await?;
        let parsed = extract_json_object(&response);
        if parsed.is_none() {
            warn!(
                subsystem = "inference",
                op = "summarize",
                "Summary reply was not JSON, using raw text"
            );
        }

        let summary = parsed
            .as_ref()
            .and_then(|v| string_field(v, "summary"))
            .unwrap_or_else(|| response.trim().to_string());
        let key_points = parsed
            .as_ref()
            .map(|v| string_list(v, "key_points"))
            .unwrap_or_default();
        let statistics = SummaryStatistics::compute(text, &summary);

        info!(
            subsystem = "inference",
            op = "summarize",
            key_points = key_points.len(),
            compression_ratio = statistics.compression_ratio,
            "Summary generated"
        );
        Ok(SummaryResult {
            summary,
            key_points,
            statistics,
        })
    }

    /// Answer `question` about `text`, taking recent conversation turns into account.
    pub async fn answer_question(
        &self,
        text: &str,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<QaAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("Question must not be empty".to_string()));
        }
        require_text(text, "Document text is empty")?;

        let response = self
            .generate("qa", "", &prompts::qa_prompt(text, question, history))
            .await?;
        let Some(parsed) = extract_json_object(&response) else {
            return Ok(QaAnswer {
                answer: response.trim().to_string(),
                confidence: defaults::QA_DEFAULT_CONFIDENCE,
                sources: Vec::new(),
                suggested_questions: Vec::new(),
            });
        };

        Ok(QaAnswer {
            answer: string_field(&parsed, "answer").unwrap_or_else(|| response.trim().to_string()),
            confidence: parse_confidence(parsed.get("confidence")),
            sources: parse_sources(parsed.get("sources")),
            suggested_questions: string_list(&parsed, "suggested_questions"),
        })
    }

    /// Rewrite `text` in the requested style.
    pub async fn rewrite(&self, text: &str, options: &RewriteOptions) -> Result<RewriteResult> {
        require_text(text, "Text to rewrite must not be empty")?;

        let response = self
            .generate("rewrite", "", &prompts::rewrite_prompt(text, options))
            .await?;
        let parsed = extract_json_object(&response);

        Ok(RewriteResult {
            rewritten_text: parsed
                .as_ref()
                .and_then(|v| string_field(v, "rewritten_text"))
                .unwrap_or_else(|| response.trim().to_string()),
            improvements: parsed
                .as_ref()
                .map(|v| string_list(v, "improvements"))
                .unwrap_or_default(),
        })
    }

    /// Build a mindmap of `text`.
    pub async fn mindmap(&self, text: &str, options: &MindmapOptions) -> Result<MindmapResult> {
        require_text(text, "Document text is empty")?;

        let response = self
            .generate("mindmap", "", &prompts::mindmap_prompt(text, options))
            .await?;
        let parsed = extract_json_object(&response);

        let mut mindmap = parsed
            .as_ref()
            .and_then(|v| v.get("mindmap"))
            .and_then(|node| serde_json::from_value::<MindmapNode>(node.clone()).ok())
            .unwrap_or_else(|| {
                warn!(
                    subsystem = "inference",
                    op = "mindmap",
                    "Mindmap reply unusable, using fallback tree"
                );
                MindmapNode::fallback()
            });
        mindmap.truncate_depth(options.depth() as usize);

        let keywords = if options.include_keywords {
            parsed
                .as_ref()
                .map(|v| string_list(v, "keywords"))
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        let structure = MindmapStructure::of(&mindmap);

        Ok(MindmapResult {
            mindmap,
            keywords,
            structure,
        })
    }

    /// Classify key sentences of a paper under the five research labels.
    ///
    /// The result always contains every label; unparseable replies yield empty lists.
    pub async fn classify_key_sentences(&self, text: &str) -> Result<JsonValue> {
        require_text(text, "Document text is empty")?;

        let response = self
            .generate(
                "key_sentences",
                prompts::KEY_SENTENCE_SYSTEM_PROMPT,
                &prompts::key_sentence_prompt(text),
            )
            .await?;
        let parsed = extract_json_object(&response).unwrap_or_else(|| {
            warn!(
                subsystem = "inference",
                op = "key_sentences",
                "Key sentence reply was not JSON"
            );
            JsonValue::Object(Map::new())
        });

        let mut labelled = Map::new();
        for label in prompts::KEY_SENTENCE_LABELS {
            let sentences: Vec<JsonValue> = string_list(&parsed, label)
                .into_iter()
                .map(JsonValue::String)
                .collect();
            labelled.insert(label.to_string(), JsonValue::Array(sentences));
        }
        Ok(JsonValue::Object(labelled))
    }
}

fn require_text(text: &str, message: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::InvalidInput(message.to_string()));
    }
    Ok(())
}

fn parse_confidence(value: Option<&JsonValue>) -> f64 {
    let confidence = match value {
        Some(JsonValue::Number(n)) => n.as_f64(),
        Some(JsonValue::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    confidence
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(defaults::QA_DEFAULT_CONFIDENCE)
}

fn parse_sources(value: Option<&JsonValue>) -> Vec<QaSource> {
    let Some(JsonValue::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            JsonValue::String(excerpt) => Some(QaSource {
                section: String::new(),
                excerpt: excerpt.clone(),
            }),
            JsonValue::Object(_) => serde_json::from_value(item.clone()).ok(),
            _ => None,
        })
        .collect()
}
