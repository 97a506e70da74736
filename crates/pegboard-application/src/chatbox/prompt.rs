//! System prompt assembly.
//!
//! Prompts are rendered with minijinja so the refinement preamble and the
//! retrieval context block live as templates rather than string surgery.

use minijinja::{Environment, context};
use pegboard_core::error::{PegboardError, Result};

const REFINE_TEMPLATE: &str = "{{ base }}\n\n---\n\
CRITICAL - REFINEMENT MODE:\n\
You are now in refinement mode. \
The user's follow-up messages are NOT new inputs to process from scratch. \
They are instructions, clarifications, or corrections about the previous response.\n\n\
Original user input: \"{{ user_input }}\"\n\
Your previous response: \"{{ response }}\"\n\n\
When the user sends a follow-up message:\n\
- Treat it as feedback or clarification about the ORIGINAL input/response above.\n\
- Produce a REVISED version of the original response incorporating the user's feedback.\n\
- Do NOT process the follow-up message as a new standalone request.\n\
- For example, if the user clarifies what they actually meant, \
re-do the original task with that updated understanding.\n\
---";

const CONTEXT_TEMPLATE: &str = "{{ base }}\n\n---\n\
Relevant context from uploaded document:\n\n\
{% for chunk in chunks %}{% if not loop.first %}\n\n{% endif %}\
[Context {{ loop.index }}]:\n{{ chunk }}{% endfor %}\n\
---\n\n\
Use the above context to help answer the user's question when relevant.";

/// The single-turn exchange a chat conversation is refining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefineContext {
    pub user_input: String,
    pub response: String,
}

/// Renders system prompts for generation requests.
pub struct PromptBuilder {
    env: Environment<'static>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }

    /// Appends the refinement instructions for `refine` to `base`.
    ///
    /// # Errors
    ///
    /// Returns [`PegboardError::Template`] if rendering fails.
    pub fn refine(&self, base: &str, refine: &RefineContext) -> Result<String> {
        self.env
            .render_str(
                REFINE_TEMPLATE,
                context! {
                    base => base,
                    user_input => refine.user_input,
                    response => refine.response,
                },
            )
            .map_err(|e| PegboardError::template(e.to_string()))
    }

    /// Appends numbered `[Context i]` blocks for the retrieved `chunks`.
    ///
    /// Returns `base` unchanged when there is nothing to add.
    ///
    /// # Errors
    ///
    /// Returns [`PegboardError::Template`] if rendering fails.
    pub fn with_context(&self, base: &str, chunks: &[String]) -> Result<String> {
        if chunks.is_empty() {
            return Ok(base.to_string());
        }
        self.env
            .render_str(CONTEXT_TEMPLATE, context! { base => base, chunks => chunks })
            .map_err(|e| PegboardError::template(e.to_string()))
    }
}
