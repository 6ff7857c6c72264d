use mira_core::{ClarificationAnswer, ClarificationPrompt, ControllerError, GateKind};
use tracing::{debug, info};

/// A resolved prompt. `answer` goes to the agent as the operator's next turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answered {
    pub prompt_id: String,
    pub answer: String,
}

/// A dismissed prompt. Nothing is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cancelled {
    pub prompt_id: String,
}

#[derive(Debug, Default)]
pub struct ClarificationResolver {
    prompt: Option<ClarificationPrompt>,
}

impl ClarificationResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&ClarificationPrompt> {
        self.prompt.as_ref()
    }

    pub fn is_open(&self) -> bool {
        self.prompt.is_some()
    }

    pub fn open(&mut self, prompt: ClarificationPrompt) -> Result<(), ControllerError> {
        if let Some(open) = &self.prompt {
            return Err(ControllerError::ProtocolViolation {
                open: GateKind::Clarification,
                rejected: format!("clarification '{}' (holding '{}')", prompt.id, open.id),
            });
        }
        info!("Clarification requested: {}", prompt.id);
        self.prompt = Some(prompt);
        Ok(())
    }

    /// Resolve with an option or free text. An invalid answer leaves the
    /// prompt open.
    pub fn confirm(&mut self, answer: ClarificationAnswer) -> Result<Answered, ControllerError> {
        let prompt = self.prompt.as_ref().ok_or(ControllerError::NoClarification)?;
        let text = match answer {
            ClarificationAnswer::Choice(index) => prompt
                .options
                .get(index)
                .cloned()
                .ok_or_else(|| {
                    ControllerError::InvalidAnswer(format!(
                        "option {} out of range ({} options)",
                        index,
                        prompt.options.len()
                    ))
                })?,
            ClarificationAnswer::Freeform(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Err(ControllerError::InvalidAnswer("empty answer".to_string()));
                }
                trimmed.to_string()
            }
        };

        let prompt_id = prompt.id.clone();
        self.prompt = None;
        debug!("Clarification {} answered", prompt_id);
        Ok(Answered {
            prompt_id,
            answer: text,
        })
    }

    pub fn dismiss(&mut self) -> Result<Cancelled, ControllerError> {
        let prompt = self.prompt.take().ok_or(ControllerError::NoClarification)?;
        debug!("Clarification {} dismissed", prompt.id);
        Ok(Cancelled {
            prompt_id: prompt.id,
        })
    }

    pub fn clear(&mut self) {
        self.prompt = None;
    }
}
