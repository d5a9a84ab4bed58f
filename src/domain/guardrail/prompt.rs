//! Response templates
//!
//! Both templates use the `${var:name}` placeholder syntax with exactly two
//! variables: `question` and `context`.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::config::TemplateMode;

/// Exact sentence the generator must emit when the context lacks the answer
pub const NOT_FOUND_SENTINEL: &str =
    "I could not find relevant information in the provided context.";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{var:(question|context)\}").expect("placeholder pattern is valid")
});

const STRICT_TEMPLATE: &str = r#"You are an assistant that answers EXCLUSIVELY from the context provided below.

MANDATORY RULES:
1. Use ONLY information present in the CONTEXT.
2. If the answer is not in the context, reply with exactly: "I could not find relevant information in the provided context."
3. NEVER invent, infer or use outside knowledge.
4. Always cite where the information came from.
5. Be objective and direct.

RESPONSE FORMAT:
- Start with "Based on the provided context:"
- Present the information found
- End with "(Source: <file name>)"

If several sources were used, cite all of them.

QUESTION: ${var:question}

CONTEXT:
${var:context}

ANSWER:"#;

const BALANCED_TEMPLATE: &str = r#"You are an assistant specialized in answering from the context provided below.

GUIDELINES:
1. ALWAYS prioritize information from the CONTEXT.
2. Use general knowledge only for basic clarifications.
3. Clearly mark which statements come from the context and which come from general knowledge.
4. If the context is insufficient, say so openly. When it does not contain the answer at all, reply with exactly: "I could not find relevant information in the provided context."
5. Cite sources whenever available.

RESPONSE FORMAT:
- Prefix context-derived statements with "[Context]"
- Prefix supplementary general knowledge with "[General knowledge]"
- Always end with "(Source: <file name>)"

QUESTION: ${var:question}

CONTEXT:
${var:context}

ANSWER:"#;

/// Renders the question and assembled context into the final prompt
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Raw template for a mode, placeholders intact
    pub fn template(mode: TemplateMode) -> &'static str {
        match mode {
            TemplateMode::Strict => STRICT_TEMPLATE,
            TemplateMode::Balanced => BALANCED_TEMPLATE,
        }
    }

    /// Substitute both placeholders in a single pass, so placeholder text
    /// inside the question or context is left as-is.
    pub fn build(&self, mode: TemplateMode, question: &str, context: &str) -> String {
        PLACEHOLDER
            .replace_all(Self::template(mode), |caps: &Captures| match &caps[1] {
                "question" => question.to_string(),
                _ => context.to_string(),
            })
            .into_owned()
    }
}
