//! CLI binary for docforge.
//!
//! A thin shim over the library crate: each subcommand maps its flags to
//! an `AssistantConfig` and one library call, then prints the result.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docforge::output::{read_input, write_atomic};
use docforge::pipeline::extract::{supported_formats_list, try_extract_text};
use docforge::{
    edit_template_file, extract_structural, render_markdown, replace_in_docx, AssistantConfig,
    DocumentAssistant, ExtractError, ProviderBackend, ReplacementMapping, TemplateEditor,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Structural view of a template (what the model sees)
  docforge extract --structural contract.docx

  # Edit a template from a natural-language request
  docforge edit contract.docx "the supplier is now ООО Василёк" -o contract.r1.docx

  # Apply a hand-written mapping, no model involved
  docforge apply contract.docx mapping.json -o contract.r1.docx

  # Ask about a document (summary when no question is given)
  docforge ask report.pdf "What are the payment terms?"

  # Markdown to Word
  docforge render answer.md -o answer.docx

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory holding libpdfium (PDF extraction)
"#;

/// Edit Word templates with an LLM and export Markdown as Word.
#[derive(Parser, Debug)]
#[command(
    name = "docforge",
    version,
    about = "Edit Word templates with an LLM and export Markdown as Word",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output structured JSON instead of text.
    #[arg(long, global = true, env = "DOCFORGE_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOCFORGE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOCFORGE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the text of a .docx, .pdf or .txt file.
    Extract {
        input: PathBuf,
        /// Tagged paragraph/table view used for edit prompts (.docx only).
        #[arg(long)]
        structural: bool,
    },
    /// Convert Markdown to .docx.
    Render {
        /// Markdown file, or `-` for stdin.
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Apply a JSON replacement mapping to a .docx without a model.
    Apply {
        input: PathBuf,
        /// JSON object of exact text to replacement.
        mapping: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Edit a .docx from a natural-language request.
    Edit {
        input: PathBuf,
        instruction: String,
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        llm: LlmArgs,
    },
    /// Ask a question about a document.
    Ask {
        input: PathBuf,
        question: Option<String>,
        /// Also write the answer as .docx.
        #[arg(long)]
        export: Option<PathBuf>,
        #[command(flatten)]
        llm: LlmArgs,
    },
}

#[derive(Args, Debug)]
struct LlmArgs {
    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Max LLM output tokens.
    #[arg(long, env = "DOCFORGE_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCFORGE_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries on LLM failure.
    #[arg(long, env = "DOCFORGE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// LLM call timeout in seconds (0 disables it).
    #[arg(long, env = "DOCFORGE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Characters of structural text sent with an edit request.
    #[arg(long, env = "DOCFORGE_STRUCTURAL_LIMIT", default_value_t = 10_000)]
    structural_limit: usize,

    /// Characters of document text sent with a question.
    #[arg(long, env = "DOCFORGE_QA_LIMIT", default_value_t = 15_000)]
    qa_limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || cli.json {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Extract { input, structural } => run_extract(&cli, input, *structural).await,
        Command::Render { input, output } => run_render(&cli, input, output).await,
        Command::Apply {
            input,
            mapping,
            output,
        } => run_apply(&cli, input, mapping, output).await,
        Command::Edit {
            input,
            instruction,
            output,
            llm,
        } => run_edit(&cli, input, instruction, output, llm).await,
        Command::Ask {
            input,
            question,
            export,
            llm,
        } => run_ask(&cli, input, question.as_deref(), export.as_deref(), llm).await,
    }
}

async fn run_extract(cli: &Cli, input: &Path, structural: bool) -> Result<()> {
    let bytes = read_input(input).await.context("Failed to read input")?;
    let name = file_name(input);

    let text = if structural {
        extract_structural(&bytes)
    } else {
        match try_extract_text(&bytes, &name) {
            Ok(text) => text,
            Err(ExtractError::Unsupported { extension }) => anyhow::bail!(
                "Unsupported format '{}'. Supported formats: {}",
                extension,
                supported_formats_list()
            ),
            Err(e) => return Err(e).context("Extraction failed"),
        }
    };

    if cli.json {
        let value = serde_json::json!({ "file": name, "structural": structural, "text": text });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_text(&text)?;
    }
    Ok(())
}

async fn run_render(cli: &Cli, input: &Path, output: &Path) -> Result<()> {
    let markdown = if input == Path::new("-") {
        io::read_to_string(io::stdin()).context("Failed to read stdin")?
    } else {
        let bytes = read_input(input).await.context("Failed to read input")?;
        String::from_utf8(bytes).context("Markdown input is not UTF-8")?
    };

    let outcome = render_markdown(&markdown).context("Rendering failed")?;
    write_atomic(output, &outcome.bytes)
        .await
        .context("Failed to write output")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if !cli.quiet {
        let mark = if outcome.degraded { yellow("⚠") } else { green("✔") };
        eprintln!(
            "{}  {} blocks  {}  →  {}",
            mark,
            outcome.document.blocks.len(),
            dim(&format!("{} bytes", outcome.bytes.len())),
            bold(&output.display().to_string()),
        );
        if outcome.degraded {
            eprintln!("   formatting could not be converted; wrote plain text");
        }
    }
    Ok(())
}

async fn run_apply(cli: &Cli, input: &Path, mapping_path: &Path, output: &Path) -> Result<()> {
    let raw = tokio::fs::read_to_string(mapping_path)
        .await
        .with_context(|| format!("Failed to read mapping from {:?}", mapping_path))?;
    let mapping: ReplacementMapping =
        serde_json::from_str(&raw).context("Mapping must be a JSON object of strings")?;

    let bytes = read_input(input).await.context("Failed to read input")?;
    let (edited, report) = replace_in_docx(&bytes, &mapping).context("Failed to edit document")?;
    write_atomic(output, &edited)
        .await
        .context("Failed to write output")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !cli.quiet {
        print_report(&report, output);
    }
    Ok(())
}

async fn run_edit(
    cli: &Cli,
    input: &Path,
    instruction: &str,
    output: &Path,
    llm: &LlmArgs,
) -> Result<()> {
    let config = build_config(llm)?;
    let backend = ProviderBackend::from_config(&config).context("Failed to configure LLM provider")?;
    let editor = TemplateEditor::new(Arc::new(backend), &config);

    let spinner = (!cli.quiet && !cli.json).then(|| spinner("Interpreting request…"));
    let result = edit_template_file(&editor, input, output, instruction).await;
    if let Some(bar) = &spinner {
        bar.finish_and_clear();
    }
    let outcome = result.context("Edit failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if !cli.quiet {
        for (old, new) in outcome.mapping.iter() {
            eprintln!("   {} → {}", dim(old), new);
        }
        print_report(&outcome.report, output);
    }
    Ok(())
}

async fn run_ask(
    cli: &Cli,
    input: &Path,
    question: Option<&str>,
    export: Option<&Path>,
    llm: &LlmArgs,
) -> Result<()> {
    let config = build_config(llm)?;
    let backend = ProviderBackend::from_config(&config).context("Failed to configure LLM provider")?;
    let assistant = DocumentAssistant::new(Arc::new(backend), &config);
    let bytes = read_input(input).await.context("Failed to read input")?;

    let spinner = (!cli.quiet && !cli.json).then(|| spinner("Reading document…"));
    let result = assistant.ask(&bytes, &file_name(input), question).await;
    if let Some(bar) = &spinner {
        bar.finish_and_clear();
    }
    let answer = result.context("Question failed")?;

    if let Some(path) = export {
        let outcome = render_markdown(&answer.answer).context("Rendering failed")?;
        write_atomic(path, &outcome.bytes)
            .await
            .context("Failed to write export")?;
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_text(&answer.answer)?;
        if answer.truncated && !cli.quiet {
            eprintln!("{}", dim("(document was truncated to fit the prompt)"));
        }
    }
    Ok(())
}

/// Map CLI args to `AssistantConfig`.
fn build_config(llm: &LlmArgs) -> Result<AssistantConfig> {
    let mut config = AssistantConfig::builder()
        .max_tokens(llm.max_tokens)
        .temperature(llm.temperature)
        .max_retries(llm.max_retries)
        .api_timeout_secs(llm.api_timeout)
        .structural_text_limit(llm.structural_limit)
        .qa_text_limit(llm.qa_limit)
        .build()
        .context("Invalid configuration")?;

    config.model = llm.model.clone();
    config.provider_name = llm.provider.clone();
    Ok(config)
}

fn spinner(message: &'static str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn print_report(report: &docforge::ReplacementReport, output: &Path) {
    let unmatched = report.unmatched();
    let mark = if unmatched.is_empty() { green("✔") } else { yellow("⚠") };
    eprintln!(
        "{}  {} paragraphs changed  {}  →  {}",
        mark,
        report.paragraphs_changed(),
        dim(&format!("{} lossy", report.slow_path_count())),
        bold(&output.display().to_string()),
    );
    for key in unmatched {
        eprintln!("   {} not found: {:?}", yellow("⚠"), key);
    }
}

fn print_text(text: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
