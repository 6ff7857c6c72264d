use async_trait::async_trait;
use mira_core::{ClarificationAnswer, ClarificationPrompt, PendingAction};

/// Operator's decision on a gated tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalChoice {
    AllowOnce,
    Deny,
    AlwaysAllow,
}

impl ApprovalChoice {
    /// `y` / `n` / `a`; anything else denies.
    pub fn parse(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "y" | "yes" => ApprovalChoice::AllowOnce,
            "a" | "always" => ApprovalChoice::AlwaysAllow,
            _ => ApprovalChoice::Deny,
        }
    }
}

/// The operator-facing surface the host renders controller state on.
#[async_trait]
pub trait Interface: Send + Sync {
    async fn receive_input(&self) -> Option<String>;
    async fn send_output(&self, message: &str);
    async fn request_approval(&self, action: &PendingAction) -> ApprovalChoice;
    /// `None` dismisses the prompt.
    async fn request_clarification(
        &self,
        prompt: &ClarificationPrompt,
    ) -> Option<ClarificationAnswer>;
    async fn show_status(&self, status: &str);
}

/// Parse a clarification reply: an option number (1-based) or free text.
/// Empty input dismisses.
pub fn parse_clarification_reply(
    prompt: &ClarificationPrompt,
    input: &str,
) -> Option<ClarificationAnswer> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(n) = trimmed.parse::<usize>() {
        if n >= 1 && n <= prompt.options.len() {
            return Some(ClarificationAnswer::Choice(n - 1));
        }
    }
    Some(ClarificationAnswer::Freeform(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> ClarificationPrompt {
        ClarificationPrompt {
            id: "c1".to_string(),
            question: "Which policy?".to_string(),
            options: vec!["Life".to_string(), "Health".to_string()],
        }
    }

    #[test]
    fn test_approval_choice_parse() {
        assert_eq!(ApprovalChoice::parse("Y"), ApprovalChoice::AllowOnce);
        assert_eq!(ApprovalChoice::parse(" always "), ApprovalChoice::AlwaysAllow);
        assert_eq!(ApprovalChoice::parse("n"), ApprovalChoice::Deny);
        assert_eq!(ApprovalChoice::parse("maybe"), ApprovalChoice::Deny);
    }

    #[test]
    fn test_clarification_reply_choice() {
        assert_eq!(
            parse_clarification_reply(&prompt(), "2"),
            Some(ClarificationAnswer::Choice(1))
        );
    }

    #[test]
    fn test_clarification_reply_out_of_range_is_freeform() {
        assert_eq!(
            parse_clarification_reply(&prompt(), "7"),
            Some(ClarificationAnswer::Freeform("7".to_string()))
        );
    }

    #[test]
    fn test_clarification_reply_empty_dismisses() {
        assert_eq!(parse_clarification_reply(&prompt(), "   "), None);
    }
}
