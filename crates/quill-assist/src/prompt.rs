//! Prompt templates for the writing-assist actions.

use crate::session::AssistAction;

/// Build the instruction string sent to the assistant.
///
/// Each action wraps the content in a distinct natural-language
/// instruction; `Explain` additionally names the language and fences the
/// content as code.
pub fn build_prompt(action: AssistAction, content: &str, language: Option<&str>) -> String {
    match action {
        AssistAction::Improve => format!(
            "Improve the following text for clarity, flow, and readability. \
             Keep the original meaning and tone. Return only the improved text.\n\n{content}"
        ),
        AssistAction::Summarize => format!(
            "Summarize the following text in a few concise sentences. \
             Return only the summary.\n\n{content}"
        ),
        AssistAction::Explain => {
            let language = language.unwrap_or("plaintext");
            format!(
                "Explain what the following {language} code does, step by step, \
                 in plain language.\n\n```{language}\n{content}\n```"
            )
        }
    }
}
