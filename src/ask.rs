//! Document Q&A: answer a question about an uploaded document.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::AssistantConfig;
use crate::error::{DocforgeError, ExtractError};
use crate::llm::{CompletionBackend, Prompt};
use crate::pipeline::extract::{supported_formats_list, truncate_for_prompt, try_extract_text};
use crate::prompts::{document_question_prompt, DEFAULT_QUESTION, DOCUMENT_QA_SYSTEM_PROMPT};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentAnswer {
    pub file_name: String,
    pub question: String,
    pub answer: String,
    /// The document was cut to fit the prompt.
    pub truncated: bool,
}

pub struct DocumentAssistant {
    backend: Arc<dyn CompletionBackend>,
    qa_text_limit: usize,
}

impl std::fmt::Debug for DocumentAssistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentAssistant")
            .field("backend", &"<dyn CompletionBackend>")
            .field("qa_text_limit", &self.qa_text_limit)
            .finish()
    }
}

impl DocumentAssistant {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: &AssistantConfig) -> Self {
        Self {
            backend,
            qa_text_limit: config.qa_text_limit,
        }
    }

    /// Extract the document, then ask `question` about it (a summary
    /// request when `None` or blank). One completion call.
    pub async fn ask(
        &self,
        bytes: &[u8],
        file_name: &str,
        question: Option<&str>,
    ) -> Result<DocumentAnswer, DocforgeError> {
        let text = try_extract_text(bytes, file_name).map_err(|e| match e {
            ExtractError::Unsupported { extension } => DocforgeError::UnsupportedFormat {
                extension,
                supported: supported_formats_list(),
            },
            other => DocforgeError::Extract(other),
        })?;
        if text.trim().is_empty() {
            return Err(ExtractError::NoText {
                filename: file_name.to_string(),
            }
            .into());
        }

        let contents = truncate_for_prompt(&text, self.qa_text_limit);
        let truncated = contents.len() != text.len();
        let question = question
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(DEFAULT_QUESTION);
        debug!(
            "Asking about '{}' ({} chars, truncated: {})",
            file_name,
            text.chars().count(),
            truncated
        );

        let prompt = Prompt::new(
            DOCUMENT_QA_SYSTEM_PROMPT,
            document_question_prompt(file_name, &contents, question),
        );
        let answer = self.backend.complete(&prompt).await?;
        info!("Answered question about '{}' ({} chars)", file_name, answer.chars().count());

        Ok(DocumentAnswer {
            file_name: file_name.to_string(),
            question: question.to_string(),
            answer,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::testing::ScriptedBackend;
    use crate::pipeline::extract::TRUNCATION_MARKER;

    fn assistant(backend: &Arc<ScriptedBackend>, limit: usize) -> DocumentAssistant {
        let config = AssistantConfig::builder().qa_text_limit(limit).build().unwrap();
        DocumentAssistant::new(backend.clone(), &config)
    }

    #[tokio::test]
    async fn default_question_is_a_summary() {
        let backend = Arc::new(ScriptedBackend::replying(&["It is a note."]));
        let answer = assistant(&backend, 100)
            .ask("Buy milk".as_bytes(), "note.txt", Some("   "))
            .await
            .unwrap();
        assert_eq!(answer.answer, "It is a note.");
        assert_eq!(answer.question, DEFAULT_QUESTION);
        assert!(!answer.truncated);

        let prompt = backend.last_prompt().unwrap();
        assert_eq!(prompt.system, DOCUMENT_QA_SYSTEM_PROMPT);
        assert_eq!(
            prompt.user,
            format!("Document 'note.txt' contents:\n\nBuy milk\n\nQuestion: {DEFAULT_QUESTION}")
        );
    }

    #[tokio::test]
    async fn long_documents_are_truncated() {
        let backend = Arc::new(ScriptedBackend::replying(&["ok"]));
        let answer = assistant(&backend, 5)
            .ask("abcdefghij".as_bytes(), "a.txt", Some("What?"))
            .await
            .unwrap();
        assert!(answer.truncated);
        let prompt = backend.last_prompt().unwrap();
        assert!(prompt.user.contains(&format!("abcde{TRUNCATION_MARKER}")));
    }

    #[tokio::test]
    async fn unsupported_format_lists_supported_ones() {
        let backend = Arc::new(ScriptedBackend::replying(&["unused"]));
        let err = assistant(&backend, 100)
            .ask(b"x", "slides.pptx", None)
            .await
            .unwrap_err();
        match err {
            DocforgeError::UnsupportedFormat { extension, supported } => {
                assert_eq!(extension, ".pptx");
                assert_eq!(supported, ".docx, .pdf, .txt");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn empty_document_is_an_error() {
        let backend = Arc::new(ScriptedBackend::replying(&["unused"]));
        let err = assistant(&backend, 100)
            .ask(b"  \n ", "blank.txt", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DocforgeError::Extract(ExtractError::NoText { .. })));
    }

    #[tokio::test]
    async fn backend_failure_propagates() {
        let backend = Arc::new(ScriptedBackend::failing(LlmError::Timeout { secs: 3 }));
        let err = assistant(&backend, 100)
            .ask(b"text", "a.txt", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DocforgeError::Llm(LlmError::Timeout { secs: 3 })));
    }
}
