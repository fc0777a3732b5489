//! Prompts for the vision-LLM answering backend.
//!
//! Kept in one place so prompt changes never touch the client's retry or
//! parsing code, and so tests can inspect exactly what is sent.

/// System prompt asking a vision LLM to behave like an extractive
/// document-QA model and answer in JSON.
///
/// `{top_k}` and `{max_answer_words}` are substituted by [`qa_system_prompt`].
pub const QA_SYSTEM_PROMPT: &str = r#"You answer questions about a single scanned document page shown as an image.

Rules:
1. Answer ONLY from text visible on the page. Never use outside knowledge.
2. Prefer short, extractive answers copied verbatim from the page.
3. Return at most {top_k} candidate answers, best first.
4. Each answer must be at most {max_answer_words} words.
5. Give each answer a confidence score between 0.0 and 1.0.
6. If the page does not contain the answer, return an empty list.

Reply with JSON only, no commentary, in exactly this shape:
{"answers": [{"answer": "<text>", "score": <0.0-1.0>}]}"#;

/// Fill in [`QA_SYSTEM_PROMPT`].
pub fn qa_system_prompt(top_k: usize, max_answer_words: usize) -> String {
    QA_SYSTEM_PROMPT
        .replace("{top_k}", &top_k.to_string())
        .replace("{max_answer_words}", &max_answer_words.to_string())
}

/// User turn carrying the question next to the page image.
pub fn question_message(question: &str) -> String {
    format!("Question: {}", question.trim())
}
