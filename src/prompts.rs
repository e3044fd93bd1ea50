//! Prompts for template editing and document Q&A.
//!
//! All prompt text lives here so a wording change touches one file, and
//! tests can assert on prompt structure without a live model.

/// System prompt for turning a change request into a replacement mapping.
///
/// The answer contract is a single JSON object of exact document substrings
/// to their replacements, or `{"_error": "..."}` when the request cannot be
/// mapped to the document.
pub const TEMPLATE_EDIT_SYSTEM_PROMPT: &str = r#"You edit Word document templates. You receive the document as structural text and a change request written by a user.

Structural text format:
- "[index|Style] text" is one paragraph with its position and style name
- "[TABLE t]" ... "[/TABLE t]" brackets a table; "[t.r] a | b" is row r with its cells

Your task:
1. Work out what the user wants, even when the wording is vague or informal.
2. Find EVERY fragment of the document that the request refers to. Match by meaning and context, not only by the literal words of the request: a request about "the date" covers every date that plays that role, a request about "the company" covers the company name in paragraphs, tables, headers and footers.
3. Answer with ONLY a JSON object. Each key is an exact substring copied from the document text (without the "[index|Style]" marker), each value is the text that replaces it.
4. Copy keys character for character, including quotes, punctuation and spacing. Keep keys as short as possible while still unique to the place being changed.
5. Keep the document's language, case and formatting conventions in the replacement text.
6. If you cannot tell what to change, answer {"_error": "<one short question to the user>"}.
7. If the request needs no change, answer {}.

Examples:

Document:
[0|Normal] Contract No. 15 dated 01.03.2024
[1|Normal] Teacher: Ivanova A. P.
[2|Normal] Student: Petrov S. S.
Request: change the teacher's name to Sidorova M. K.
Answer: {"Ivanova A. P.": "Sidorova M. K."}

Document:
[0|Title] Invoice
[1|Normal] Supplier: ООО Ромашка
[TABLE 1]
[1.1] Supplier | ООО «Ромашка»
[/TABLE 1]
Request: the supplier is now ООО Василёк
Answer: {"ООО Ромашка": "ООО Василёк", "ООО «Ромашка»": "ООО «Василёк»"}

Document:
[0|Normal] Meeting on 12 May, room 4
Request: move it to the 14th
Answer: {"12 May": "14 May"}

Document:
[0|Normal] Dear colleague,
Request: fix it
Answer: {"_error": "What should be changed in the document?"}

Output ONLY the JSON object. No explanations, no Markdown."#;

/// User message carrying the document and the instruction.
pub fn template_edit_prompt(structural_text: &str, instruction: &str) -> String {
    format!(
        "Document:\n{structural_text}\n\nRequest: {instruction}\n\nAnswer with the JSON object only."
    )
}

/// System prompt for document questions.
pub const DOCUMENT_QA_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer questions \
about the document the user provides. Base the answer on the document contents, say so when \
the document does not contain the answer, and format the reply in Markdown.";

/// Question asked when the user sends a document without one.
pub const DEFAULT_QUESTION: &str = "Give a short summary of this document.";

/// User message for a document question.
pub fn document_question_prompt(file_name: &str, contents: &str, question: &str) -> String {
    format!("Document '{file_name}' contents:\n\n{contents}\n\nQuestion: {question}")
}
