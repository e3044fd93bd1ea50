//! Template editing: natural-language change request → edited DOCX.
//!
//! ```text
//! template bytes ─▶ parse ─▶ structural text ─▶ truncate ─▶ interpret (LLM)
//!                     │                                          │
//!                     └──────────── apply replacements ◀─────────┘
//!                                          │
//!                                          ▼
//!                                new template (revision + 1)
//! ```
//!
//! The stored template is never mutated: each edit parses a fresh copy and
//! the result only replaces the session's template once it has been fully
//! serialised.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::AssistantConfig;
use crate::docx::Document;
use crate::error::{DocforgeError, EditError};
use crate::llm::CompletionBackend;
use crate::output::{read_input, write_atomic};
use crate::pipeline::extract::{structural_text, truncate_for_prompt};
use crate::pipeline::interpret::interpret_change_request;
use crate::pipeline::replace::{apply_replacements, ReplacementMapping, ReplacementReport};
use crate::session::{SessionStore, TemplateSession, UserId};

/// Result of one applied change request.
#[derive(Debug, Clone, Serialize)]
pub struct EditOutcome {
    pub template: TemplateSession,
    pub mapping: ReplacementMapping,
    pub report: ReplacementReport,
}

/// Applies change requests to templates through a completion backend.
pub struct TemplateEditor {
    backend: Arc<dyn CompletionBackend>,
    structural_text_limit: usize,
}

impl std::fmt::Debug for TemplateEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEditor")
            .field("backend", &"<dyn CompletionBackend>")
            .field("structural_text_limit", &self.structural_text_limit)
            .finish()
    }
}

impl TemplateEditor {
    pub fn new(backend: Arc<dyn CompletionBackend>, config: &AssistantConfig) -> Self {
        Self {
            backend,
            structural_text_limit: config.structural_text_limit,
        }
    }

    /// Interpret `instruction` against `template` and return the next revision.
    pub async fn edit(
        &self,
        template: &TemplateSession,
        instruction: &str,
    ) -> Result<EditOutcome, EditError> {
        let start = Instant::now();
        let mut document = Document::parse(&template.bytes)?;

        let structural = structural_text(&document);
        let prompt_text = truncate_for_prompt(&structural, self.structural_text_limit);
        if prompt_text.len() < structural.len() {
            info!(
                "Structural text of '{}' truncated to {} chars",
                template.filename, self.structural_text_limit
            );
        }

        let mapping =
            interpret_change_request(self.backend.as_ref(), &prompt_text, instruction).await?;
        let report = apply_replacements(&mut document, &mapping);
        let bytes = document.to_bytes()?;

        info!(
            "Edited '{}' r{} → r{}: {} keys, {} paragraphs changed, {} unmatched ({:?})",
            template.filename,
            template.revision,
            template.revision + 1,
            mapping.len(),
            report.paragraphs_changed(),
            report.unmatched().len(),
            start.elapsed()
        );

        Ok(EditOutcome {
            template: template.edited(bytes),
            mapping,
            report,
        })
    }

    /// Edit the user's current template and store the result as the new
    /// current template.
    pub async fn edit_session(
        &self,
        store: &SessionStore,
        user: UserId,
        instruction: &str,
    ) -> Result<EditOutcome, EditError> {
        let snapshot = store.snapshot(user);
        let template = snapshot.current_template()?;
        let outcome = self.edit(template, instruction).await?;

        if !store.persist_template(user, snapshot.generation, outcome.template.clone()) {
            return Err(EditError::TemplateChanged);
        }
        debug!("User {} now on revision {}", user, outcome.template.revision);
        Ok(outcome)
    }
}

/// Edit a `.docx` file on disk, writing the result atomically to `output`.
pub async fn edit_template_file(
    editor: &TemplateEditor,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    instruction: &str,
) -> Result<EditOutcome, DocforgeError> {
    let input = input.as_ref();
    let bytes = read_input(input).await?;
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let outcome = editor
        .edit(&TemplateSession::uploaded(bytes, filename), instruction)
        .await?;
    write_atomic(output, &outcome.template.bytes).await?;
    Ok(outcome)
}
