use crate::traits::{parse_clarification_reply, ApprovalChoice, Interface};
use async_trait::async_trait;
use mira_core::{ClarificationAnswer, ClarificationPrompt, PendingAction};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;

/// Stdin/stdout operator console. One buffered reader is kept so piped
/// input is not lost between prompts.
pub struct TerminalInterface {
    reader: Mutex<BufReader<Stdin>>,
}

impl TerminalInterface {
    pub fn new() -> Self {
        Self {
            reader: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

impl Default for TerminalInterface {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Interface for TerminalInterface {
    async fn receive_input(&self) -> Option<String> {
        let mut reader = self.reader.lock().await;
        let mut line = String::new();

        match reader.read_line(&mut line).await {
            Ok(0) => None, // EOF
            Ok(_) => Some(line.trim().to_string()),
            Err(_) => None,
        }
    }

    async fn send_output(&self, message: &str) {
        let mut stdout = tokio::io::stdout();
        let _ = stdout.write_all(message.as_bytes()).await;
        let _ = stdout.write_all(b"\n").await;
        let _ = stdout.flush().await;
    }

    async fn request_approval(&self, action: &PendingAction) -> ApprovalChoice {
        self.send_output(&format!("⚠️  {}", action.message)).await;
        if !action.args.is_null() {
            self.send_output(&format!("   args: {}", action.args)).await;
        }
        self.send_output("Allow? (y = once, a = always this session, n = deny): ")
            .await;

        match self.receive_input().await {
            Some(response) => ApprovalChoice::parse(&response),
            None => ApprovalChoice::Deny,
        }
    }

    async fn request_clarification(
        &self,
        prompt: &ClarificationPrompt,
    ) -> Option<ClarificationAnswer> {
        self.send_output(&format!("❓ {}", prompt.question)).await;
        for (i, option) in prompt.options.iter().enumerate() {
            self.send_output(&format!("   {}. {}", i + 1, option)).await;
        }
        self.send_output("Answer (number or text, empty to dismiss): ")
            .await;

        let response = self.receive_input().await?;
        parse_clarification_reply(prompt, &response)
    }

    async fn show_status(&self, status: &str) {
        self.send_output(&format!("ℹ️  {}", status)).await;
    }
}
