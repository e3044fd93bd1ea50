//! Document pipeline stages.
//!
//! Each submodule implements one transformation step and is testable on
//! its own. Only [`interpret`] talks to the network, through the
//! [`CompletionBackend`](crate::llm::CompletionBackend) seam.
//!
//! ## Data Flow
//!
//! ```text
//! template editing:
//!   extract (structural) ──▶ interpret (LLM) ──▶ replace
//!   [idx|Style] text          JSON mapping        run-preserving edits
//!
//! export:
//!   render: markdown ──▶ preprocess ──▶ convert ──▶ numbering ──▶ writer
//! ```
//!
//! 1. [`extract`]: plain and structural text views of DOCX/PDF/TXT
//! 2. [`interpret`]: prompt the model and recover a replacement mapping from
//!    whatever it answered
//! 3. [`replace`]: apply the mapping to body, tables, headers and footers
//! 4. [`render`]: Markdown to DOCX with per-list numbering restarts

pub mod extract;
pub mod interpret;
pub mod render;
pub mod replace;
