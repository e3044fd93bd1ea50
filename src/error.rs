//! Error types for the docforge library.
//!
//! One fatal enum and one enum per concern:
//!
//! * [`DocforgeError`] is **fatal** for a workflow: the file is missing, the
//!   format is unsupported, the provider is not configured, the output could
//!   not be written. Returned by the top-level entry points and the CLI.
//!
//! * [`DocxError`], [`ExtractError`], [`LlmError`], [`InterpretError`],
//!   [`RenderError`] and [`EditError`] belong to one component each. They
//!   convert into [`DocforgeError`] with `?` where a workflow crosses
//!   components.
//!
//! Conditions that are expected rather than exceptional are not errors at
//! all: an unsupported upload is the [`crate::pipeline::extract::Extraction::Unsupported`]
//! sentinel, a replacement key that matches nothing is a line in
//! [`crate::pipeline::replace::ReplacementReport`], and Markdown that cannot be
//! converted degrades to plain text inside the renderer.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by docforge workflows.
#[derive(Debug, Error)]
pub enum DocforgeError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Input file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document extension is not one the extractor understands.
    #[error("Unsupported format '{extension}'. Supported formats: {supported}")]
    UnsupportedFormat { extension: String, supported: String },

    // ── Component errors ──────────────────────────────────────────────────
    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Render(#[from] RenderError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A `.docx` package could not be read or written.
#[derive(Debug, Error)]
pub enum DocxError {
    /// The bytes are not a readable zip archive.
    #[error("invalid zip container: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error inside package: {0}")]
    Io(#[from] std::io::Error),

    /// A part the document needs is absent.
    #[error("package part '{name}' is missing")]
    MissingPart { name: String },

    #[error("package part '{part}' is not valid UTF-8")]
    NotUtf8 { part: String },

    /// A part is not well-formed XML or lacks required structure.
    #[error("malformed XML in '{part}': {detail}")]
    Xml { part: String, detail: String },
}

/// Text extraction failed on a document of a supported format.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to read DOCX: {0}")]
    Docx(#[from] DocxError),

    #[error("Failed to read PDF: {0}")]
    Pdf(String),

    /// The crate was built without the `pdf` feature.
    #[error("PDF support is not available in this build (enable the `pdf` feature)")]
    PdfUnavailable,

    #[error("Unsupported format '{extension}'")]
    Unsupported { extension: String },

    /// The document parsed but holds no text.
    #[error("No text could be extracted from '{filename}'")]
    NoText { filename: String },
}

/// The completion backend could not produce a response.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The provider kept failing after every retry.
    #[error("LLM call failed after {retries} retries: {detail}")]
    Failed { retries: u32, detail: String },

    /// A single call exceeded the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },
}

/// The model's answer to a change request could not be turned into a mapping.
#[derive(Debug, Error)]
pub enum InterpretError {
    /// No strategy recovered a JSON object from the response.
    #[error("could not find a JSON object in the model response: {excerpt:?}")]
    UnparseableResponse { excerpt: String },

    /// The model reported, via the `_error` key, that the intent is unclear.
    #[error("change request is ambiguous: {message}")]
    AmbiguousRequest { message: String },

    /// The model returned an empty object.
    #[error("no changes were identified for this request")]
    NoChangesIdentified,

    #[error("completion failed: {0}")]
    Completion(#[from] LlmError),
}

impl InterpretError {
    /// Message for the end user: what went wrong and what to try next.
    pub fn remediation(&self) -> String {
        match self {
            Self::UnparseableResponse { .. } => {
                "The assistant's answer could not be understood. Please rephrase the \
                 request, for example: \"replace the date with 12 May 2025\"."
                    .to_string()
            }
            Self::AmbiguousRequest { message } => {
                format!("Please clarify the request: {message}")
            }
            Self::NoChangesIdentified => {
                "Nothing in the document matched the request. Name the exact text \
                 to change, or describe where it appears."
                    .to_string()
            }
            Self::Completion(_) => {
                "The assistant is temporarily unavailable. Please try again in a moment."
                    .to_string()
            }
        }
    }
}

/// DOCX output could not be produced.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to pack DOCX: {0}")]
    Package(String),
}

/// Template editing failed; the current template is left untouched.
#[derive(Debug, Error)]
pub enum EditError {
    /// No template has been uploaded for this session.
    #[error("no template document is loaded; upload a .docx file first")]
    NoTemplate,

    /// Template mode is off for this session.
    #[error("template mode is not enabled")]
    TemplateModeDisabled,

    /// The template was replaced, discarded or edited again while this
    /// edit was running; the result was not stored.
    #[error("the template changed while the edit was running")]
    TemplateChanged,

    #[error("template document is corrupt: {0}")]
    CorruptDocument(#[from] DocxError),

    #[error(transparent)]
    Interpret(#[from] InterpretError),
}

impl EditError {
    /// Message for the end user.
    pub fn remediation(&self) -> String {
        match self {
            Self::NoTemplate => "Upload a .docx template first.".to_string(),
            Self::TemplateModeDisabled => {
                "Enable template mode and upload a .docx template first.".to_string()
            }
            Self::TemplateChanged => {
                "The template changed while this request was processed. Send the request again."
                    .to_string()
            }
            Self::CorruptDocument(_) => {
                "The template could not be opened. Upload the document again as .docx."
                    .to_string()
            }
            Self::Interpret(e) => e.remediation(),
        }
    }
}
