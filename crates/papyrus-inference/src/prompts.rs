//! Prompt templates for document analysis.
//!
//! Every prompt asks for a JSON object so that replies can be parsed with
//! [`crate::json::extract_json_object`]. Document text is cut to a fixed
//! character budget before it is embedded.

use papyrus_core::{
    defaults, ConversationTurn, MindmapOptions, OutputLanguage, RewriteLength, RewriteOptions,
    RewriteType, SummaryOptions, SummaryType,
};

/// Labels used to classify key sentences of a paper.
pub const KEY_SENTENCE_LABELS: [&str; 5] = ["研究背景", "研究目的", "研究方法", "研究结果", "未来展望"];

/// System prompt for key-sentence classification.
pub const KEY_SENTENCE_SYSTEM_PROMPT: &str = r#"你是一个专业的学术文献分析师。请仔细阅读以下论文内容，提取并分类关键原文。

按照以下五个标签分类：
1. 研究背景 - 介绍研究领域的背景信息、现状和问题
2. 研究目的 - 明确阐述研究要解决的核心问题或目标
3. 研究方法 - 详细描述研究采用的方法、技术路线、实验设计
4. 研究结果 - 呈现研究发现、实验结果、数据分析
5. 未来展望 - 讨论研究的局限性和未来研究方向

要求：
- label使用中文标签
- text为原文内容
- text可能包含多句
- 以严格的JSON格式输出
- 确保提取的内容准确反映原文含义

输出格式示例：
{"研究背景": ["text1", "text2", ...], "研究目的": [...], ...}
"#;

/// Return at most `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Prompt for summarization.
pub fn summary_prompt(text: &str, options: &SummaryOptions) -> String {
    let focus = if options.focus_areas.is_empty() {
        String::new()
    } else {
        format!("重点关注以下方面: {}。", options.focus_areas.join(", "))
    };
    let type_instruction = match options.summary_type {
        SummaryType::Brief => "生成一个简洁的摘要，突出核心要点。".to_string(),
        SummaryType::Detailed => "生成一个详细的摘要，包含主要论点和支撑证据。".to_string(),
        SummaryType::Custom => format!("根据用户需求生成摘要。{}", focus),
    };
    let length_instruction = if options.max_length > 0 {
        format!("控制摘要长度在{}字符以内。", options.max_length)
    } else {
        String::new()
    };

    format!(
        r#"请对以下文本进行摘要。

要求:
1. {type_instruction}
2. {length_instruction}
3. 提取3-5个关键要点
4. 使用清晰、专业的语言

文本内容:
{text}

请按以下JSON格式输出:
{{
    "summary": "摘要内容",
    "key_points": ["要点1", "要点2", "要点3"]
}}"#,
        text = truncate_chars(text, defaults::SUMMARY_INPUT_CHARS),
    )
}

/// Prompt for question answering over a document.
pub fn qa_prompt(text: &str, question: &str, history: &[ConversationTurn]) -> String {
    let recent = &history[history.len().saturating_sub(defaults::QA_HISTORY_TURNS)..];
    let history_context = if recent.is_empty() {
        String::new()
    } else {
        let lines: Vec<String> = recent
            .iter()
            .map(|turn| {
                let role = if turn.is_user() { "用户" } else { "助手" };
                format!("{}: {}", role, turn.content)
            })
            .collect();
        format!("\n对话历史:\n{}\n", lines.join("\n"))
    };

    format!(
        r#"基于以下文档内容回答问题。

文档内容:
{text}
{history_context}
问题: {question}

请按以下JSON格式输出:
{{
    "answer": "你的回答",
    "confidence": 0.85,
    "sources": [{{"section": "相关段落位置", "excerpt": "相关原文摘录"}}],
    "suggested_questions": ["相关问题1", "相关问题2"]
}}

如果文档中没有相关信息，请诚实说明并给出较低的置信度。"#,
        text = truncate_chars(text, defaults::QA_CONTEXT_CHARS),
    )
}

/// Prompt for rewriting text in another style.
pub fn rewrite_prompt(text: &str, options: &RewriteOptions) -> String {
    let style = match options.rewrite_type {
        RewriteType::Academic => "学术风格，使用专业术语和严谨的表达",
        RewriteType::Casual => "轻松随意的风格，使用日常用语",
        RewriteType::Formal => "正式风格，使用规范的书面语言",
        RewriteType::Creative => "创意风格，使用生动形象的表达",
        RewriteType::Concise => "精简风格，去除冗余保留核心内容",
    };
    let length = match options.length {
        RewriteLength::Shorter => "将内容精简，使输出比原文短30%左右",
        RewriteLength::Same => "保持与原文相近的长度",
        RewriteLength::Longer => "适当扩展，增加细节和解释",
    };
    let language = match options.language {
        OutputLanguage::Zh => "使用中文输出",
        OutputLanguage::En => "使用英文输出",
    };
    let tone = options
        .tone
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("语气要{}", t))
        .unwrap_or_default();

    format!(
        r#"请改写以下文本。

要求:
1. 风格: {style}
2. 长度: {length}
3. {language}
4. {tone}

原文:
{text}

请按以下JSON格式输出:
{{
    "rewritten_text": "改写后的文本",
    "improvements": ["改进点1", "改进点2"]
}}"#
    )
}

/// Prompt for mindmap generation.
pub fn mindmap_prompt(text: &str, options: &MindmapOptions) -> String {
    let keywords = if options.include_keywords {
        "提取关键词"
    } else {
        ""
    };

    format!(
        r#"分析以下文本，生成一个层级思维导图结构。

要求:
1. 最大层级深度: {depth}
2. 提取主题和子主题
3. {keywords}

文本内容:
{text}

请按以下JSON格式输出:
{{
    "mindmap": {{
        "name": "主题",
        "children": [
            {{
                "name": "子主题1",
                "children": [
                    {{"name": "细节1"}},
                    {{"name": "细节2"}}
                ]
            }}
        ]
    }},
    "keywords": ["关键词1", "关键词2"]
}}"#,
        depth = options.depth(),
        text = truncate_chars(text, defaults::MINDMAP_INPUT_CHARS),
    )
}

/// User prompt for key-sentence classification.
pub fn key_sentence_prompt(text: &str) -> String {
    format!(
        "以下是一篇论文的原文:\n{}",
        truncate_chars(text, defaults::MINDMAP_INPUT_CHARS)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("研究方法", 2), "研究");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_summary_prompt_limits_input() {
        let text = "x".repeat(defaults::SUMMARY_INPUT_CHARS + 500);
        let prompt = summary_prompt(&text, &SummaryOptions::default());
        assert!(prompt.contains(&"x".repeat(defaults::SUMMARY_INPUT_CHARS)));
        assert!(!prompt.contains(&"x".repeat(defaults::SUMMARY_INPUT_CHARS + 1)));
        assert!(prompt.contains("控制摘要长度在500字符以内"));
    }

    #[test]
    fn test_summary_prompt_custom_focus() {
        let options = SummaryOptions {
            summary_type: SummaryType::Custom,
            focus_areas: vec!["methods".to_string(), "results".to_string()],
            ..Default::default()
        };
        let prompt = summary_prompt("body", &options);
        assert!(prompt.contains("重点关注以下方面: methods, results"));
    }

    #[test]
    fn test_qa_prompt_keeps_recent_history() {
        let history: Vec<ConversationTurn> = (0..7)
            .map(|i| ConversationTurn {
                role: if i % 2 == 0 { "user" } else { "assistant" }.to_string(),
                content: format!("turn-{}", i),
            })
            .collect();
        let prompt = qa_prompt("doc", "why?", &history);
        assert!(!prompt.contains("turn-1"));
        assert!(prompt.contains("turn-2"));
        assert!(prompt.contains("turn-6"));
        assert!(prompt.contains("用户: turn-2"));
        assert!(prompt.contains("助手: turn-3"));
        assert!(prompt.contains("问题: why?"));
    }

    #[test]
    fn test_qa_prompt_without_history() {
        let prompt = qa_prompt("doc", "what?", &[]);
        assert!(!prompt.contains("对话历史"));
    }

    #[test]
    fn test_rewrite_prompt_instructions() {
        let options = RewriteOptions {
            rewrite_type: RewriteType::Concise,
            length: RewriteLength::Shorter,
            tone: Some("友好".to_string()),
            language: OutputLanguage::Zh,
        };
        let prompt = rewrite_prompt("原文内容", &options);
        assert!(prompt.contains("精简风格"));
        assert!(prompt.contains("短30%"));
        assert!(prompt.contains("使用中文输出"));
        assert!(prompt.contains("语气要友好"));
        assert!(prompt.contains("原文内容"));
    }

    #[test]
    fn test_mindmap_prompt_clamps_depth() {
        let options = MindmapOptions {
            max_depth: 9,
            include_keywords: false,
        };
        let prompt = mindmap_prompt("text", &options);
        assert!(prompt.contains("最大层级深度: 5"));
        assert!(!prompt.contains("提取关键词"));
    }
}
