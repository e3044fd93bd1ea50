//! # docforge
//!
//! Document plumbing for a chat assistant: edit Word templates from
//! natural-language requests, answer questions about uploaded documents,
//! and export Markdown replies as DOCX.
//!
//! ## Why this crate?
//!
//! Asking a model to rewrite a contract usually destroys its formatting.
//! Here the model never touches the document: it only proposes exact-text
//! replacements, and those are applied run by run so bold labels, table
//! layout, headers and footers survive. The reverse direction is handled
//! too: model answers written in Markdown become proper Word documents with
//! real headings, tables and list numbering that restarts where it should.
//!
//! ## Pipeline Overview
//!
//! ```text
//! template .docx + "change the teacher's name to Petrova"
//!  │
//!  ├─ 1. Extract    structural text: [idx|Style] lines, table markers
//!  ├─ 2. Interpret  one LLM call → JSON mapping, recovered from messy output
//!  ├─ 3. Replace    run-preserving edits in body, tables, headers, footers
//!  └─ 4. Store      edited bytes become the next template revision
//!
//! markdown reply
//!  └─ Render        preprocess → parse → restart numbering → .docx
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docforge::{AssistantConfig, ProviderBackend, TemplateEditor, TemplateSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = AssistantConfig::default();
//!     let backend = Arc::new(ProviderBackend::from_config(&config)?);
//!     let editor = TemplateEditor::new(backend, &config);
//!
//!     let template = TemplateSession::uploaded(std::fs::read("contract.docx")?, "contract.docx");
//!     let outcome = editor.edit(&template, "the supplier is now ООО Василёк").await?;
//!     std::fs::write("contract.r1.docx", &outcome.template.bytes)?;
//!     for key in outcome.report.unmatched() {
//!         eprintln!("not found in document: {key}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Rendering needs no model at all:
//!
//! ```rust,no_run
//! let bytes = docforge::render_markdown_to_docx("# Minutes\n\n1. Budget\n2. Hiring")?;
//! # Ok::<(), docforge::RenderError>(())
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docforge` binary (clap + anyhow + tracing-subscriber) |
//! | `pdf`   | on      | PDF text extraction through pdfium (`PDFIUM_LIB_PATH` or the system library) |
//!
//! Disable both when using only the library without pdfium:
//! ```toml
//! docforge = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod ask;
pub mod cache;
pub mod config;
pub mod delivery;
pub mod docx;
pub mod edit;
pub mod error;
pub mod llm;
mod lock;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use ask::{DocumentAnswer, DocumentAssistant};
pub use cache::ResponseCache;
pub use config::{AssistantConfig, AssistantConfigBuilder, DEFAULT_MODEL};
pub use delivery::{Reply, ReplyPlanner};
pub use docx::Document;
pub use edit::{edit_template_file, EditOutcome, TemplateEditor};
pub use error::{
    DocforgeError, DocxError, EditError, ExtractError, InterpretError, LlmError, RenderError,
};
pub use llm::{CompletionBackend, Prompt, ProviderBackend};
pub use pipeline::extract::{extract_structural, extract_text, Extraction};
pub use pipeline::interpret::interpret_change_request;
pub use pipeline::render::{render_markdown, render_markdown_to_docx, RenderOutcome};
pub use pipeline::replace::{apply_replacements, replace_in_docx, ReplacementMapping, ReplacementReport};
pub use session::{SessionStore, TemplateSession, UserId, UserSession};
