//! CLI channel — stdin/stdout REPL for local testing.
//!
//! Buttons are printed as a numbered list; typing the number presses the
//! button.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::dialogue::Button;
use crate::error::ChannelError;

const CLI_USER: &str = "local-user";

/// A simple CLI channel that reads from stdin and writes to stdout.
#[derive(Default)]
pub struct CliChannel {
    /// Buttons of the last reply, in display order.
    buttons: Arc<Mutex<Vec<Button>>>,
}

impl CliChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let buttons = Arc::clone(&self.buttons);

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprintln!("Type /start to begin a calculation.");
            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let msg = to_message(&line, &buttons.lock().await);
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        println!("\n{}", render(&response));
        *self.buttons.lock().await = response.buttons;
        eprint!("> ");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

/// A number matching one of the shown buttons presses it; anything else
/// is typed text.
fn to_message(line: &str, buttons: &[Button]) -> IncomingMessage {
    let pressed = line
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| buttons.get(i));

    match pressed {
        Some(button) => IncomingMessage::button("cli", CLI_USER, &button.data),
        None => IncomingMessage::new("cli", CLI_USER, line),
    }
}

fn render(response: &OutgoingResponse) -> String {
    let mut out = strip_html(&response.content);
    out.push('\n');
    for (i, button) in response.buttons.iter().enumerate() {
        out.push_str(&format!("  [{}] {}\n", i + 1, button.label));
    }
    out
}

/// Drop tags and decode the entities the dialogue escapes.
fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&")
}
