//! Execution and completion oracles.
//!
//! Both oracles are opaque external capabilities mediated by natural
//! language: the execution oracle turns source code into an output (or a
//! failure), the completion oracle turns (code, output, task) into a
//! boolean verdict. Neither is retried automatically; an execution failure
//! is surfaced to the caller as-is, and an unparseable verdict resolves to
//! `false` (fail-closed) so a malformed response can never grant progress.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::{ChatMessage, ChatOptions, LlmClient};
use crate::tasks::Task;

/// Words per display line in [`wrap_output`].
pub const WORDS_PER_LINE: usize = 15;

/// The execution oracle failed or was unreachable.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
}

/// Turns source code into an output.
#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn execute(&self, code: &str) -> Result<String, ExecutionError>;
}

/// Turns (code, output, task) into a boolean verdict.
///
/// Implementations must be fail-closed: anything other than an unambiguous
/// positive verdict resolves to `false`.
#[async_trait]
pub trait CompletionJudge: Send + Sync {
    async fn evaluate(&self, code: &str, output: &str, task: &Task) -> bool;
}

/// Generates a short custom exercise description.
#[async_trait]
pub trait TaskComposer: Send + Sync {
    async fn compose(&self) -> Result<String, ExecutionError>;
}

/// LLM-backed implementation of all three oracle capabilities.
pub struct LlmOracle {
    llm: Arc<dyn LlmClient>,
    model: String,
}

impl LlmOracle {
    pub fn new(llm: Arc<dyn LlmClient>, model: String) -> Self {
        Self { llm, model }
    }
}

#[async_trait]
impl CodeRunner for LlmOracle {
    async fn execute(&self, code: &str) -> Result<String, ExecutionError> {
        let messages = vec![
            ChatMessage::system(
                "You are a Python code executor. Execute the provided code and return ONLY \
                 the output. If there are errors, return ONLY a brief error message.",
            ),
            ChatMessage::user(format!(
                "Execute this Python code and return only the output:\n\n{}",
                code
            )),
        ];

        let options = ChatOptions {
            temperature: Some(0.3),
            max_tokens: Some(500),
        };

        let response = self
            .llm
            .chat_completion(&self.model, &messages, options)
            .await
            .map_err(|e| ExecutionError {
                message: format!("Failed to run code: {}", e),
            })?;

        Ok(response
            .content
            .unwrap_or_else(|| "No output generated.".to_string()))
    }
}

#[async_trait]
impl CompletionJudge for LlmOracle {
    async fn evaluate(&self, code: &str, output: &str, task: &Task) -> bool {
        if code.is_empty() || output.is_empty() {
            tracing::warn!(task_id = %task.id, "Skipping evaluation: empty code or output");
            return false;
        }

        let messages = vec![
            ChatMessage::system(JUDGE_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Task Description: {}\nCategory: {}\nDifficulty: {}\n\n\
                 Example Solution:\n{}\n\n\
                 Submitted Code:\n{}\n\n\
                 Actual Output:\n{}\n\n\
                 Does this solution correctly complete the task requirements? \
                 Answer only with \"true\" or \"false\".",
                task.description, task.category, task.difficulty, task.solution, code, output
            )),
        ];

        let options = ChatOptions {
            temperature: Some(0.1),
            max_tokens: Some(10),
        };

        let response = match self
            .llm
            .chat_completion(&self.model, &messages, options)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(task_id = %task.id, "Completion oracle failed: {}", e);
                return false;
            }
        };

        match normalize_verdict(response.content.as_deref().unwrap_or_default()) {
            Some(verdict) => verdict,
            None => {
                tracing::warn!(
                    task_id = %task.id,
                    raw = ?response.content,
                    "Completion oracle answered outside the true/false domain, treating as false"
                );
                false
            }
        }
    }
}

#[async_trait]
impl TaskComposer for LlmOracle {
    async fn compose(&self) -> Result<String, ExecutionError> {
        let messages = vec![
            ChatMessage::system(
                "You are a Python programming instructor. Generate a short, focused learning \
                 task that helps users learn Python programming. Keep it under 50 words.",
            ),
            ChatMessage::user("Generate a Python programming task"),
        ];

        let options = ChatOptions {
            temperature: Some(0.8),
            max_tokens: Some(100),
        };

        let response = self
            .llm
            .chat_completion(&self.model, &messages, options)
            .await
            .map_err(|e| ExecutionError {
                message: format!("Failed to generate task: {}", e),
            })?;

        response.content.ok_or_else(|| ExecutionError {
            message: "Failed to generate task: empty response".to_string(),
        })
    }
}

const JUDGE_SYSTEM_PROMPT: &str = r#"You are a Python code evaluator. Your task is to determine if the submitted code successfully completes the given programming task.

Rules for evaluation:
1. Focus on functionality, not style
2. Accept different valid approaches that achieve the same result
3. Ignore cosmetic differences:
   - Variable names can be different
   - String quotes can be single or double
   - Print formatting can vary (comma-separated vs f-strings vs .format())
   - Whitespace and formatting
4. Accept more sophisticated solutions that still meet the requirements
5. For output comparison:
   - Ignore leading/trailing whitespace
   - Accept equivalent string formats
   - Accept equivalent number formats
6. For tasks requiring specific output:
   - Focus on the content being equivalent
   - Accept variations in punctuation and spacing
   - Accept both single and double quotes
   - Accept different ways of string concatenation

Respond ONLY with "true" or "false""#;

/// Normalize an oracle verdict.
///
/// Returns `Some(true)`/`Some(false)` only when the trimmed, lowercased
/// response is exactly one of the two expected tokens; anything else is
/// `None` and must be treated as a negative verdict by the caller.
pub fn normalize_verdict(response: &str) -> Option<bool> {
    match response.trim().to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Wrap oracle output for display at a fixed word count per line.
///
/// Splits on spaces only, so newlines already present in the output pass
/// through inside their word. Purely cosmetic: the wrapped form is never
/// fed back into evaluation.
pub fn wrap_output(text: &str) -> String {
    let words: Vec<&str> = text.split(' ').collect();
    words
        .chunks(WORDS_PER_LINE)
        .map(|line| line.join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_exact_tokens_only() {
        assert_eq!(normalize_verdict("true"), Some(true));
        assert_eq!(normalize_verdict("false"), Some(false));
        assert_eq!(normalize_verdict(" TRUE \n"), Some(true));
        assert_eq!(normalize_verdict("False"), Some(false));

        // Everything else is out of domain.
        assert_eq!(normalize_verdict(""), None);
        assert_eq!(normalize_verdict("yes"), None);
        assert_eq!(normalize_verdict("true."), None);
        assert_eq!(normalize_verdict("The answer is true"), None);
        assert_eq!(normalize_verdict("truefalse"), None);
    }

    #[test]
    fn test_wrap_output_fixed_word_count() {
        let text = (1..=35)
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let wrapped = wrap_output(&text);
        let lines: Vec<&str> = wrapped.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].split(' ').count(), 15);
        assert_eq!(lines[1].split(' ').count(), 15);
        assert_eq!(lines[2].split(' ').count(), 5);
    }

    #[test]
    fn test_wrap_output_short_text_unchanged() {
        assert_eq!(wrap_output("Hello, World!"), "Hello, World!");
        assert_eq!(wrap_output(""), "");
    }

    #[test]
    fn test_wrap_output_preserves_existing_newlines() {
        assert_eq!(wrap_output("line one\nline two"), "line one\nline two");
        // A traceback-style multi-line message keeps its structure.
        let trace = "Traceback (most recent call last):\n  NameError: name 'x' is not defined";
        assert_eq!(wrap_output(trace), trace);
    }
}
