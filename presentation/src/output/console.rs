//! Console renderer
//!
//! Prints the conversation to stdout as it happens. Utterances are typed out
//! one character at a time.

use colored::Colorize;
use parlor_application::{Bus, Renderer};
use parlor_domain::{Message, MessageKind};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How one message is shown on the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    /// `[label] text`, printed at once
    Notice { label: &'static str, text: String },
    /// `speaker: text` in red
    Failure { speaker: String, text: String },
    /// `speaker: ` followed by typed-out text
    Speech { speaker: String, text: String },
}

impl ConsoleLine {
    pub fn from_message(message: &Message) -> Self {
        let text = message.text().to_string();
        let speaker = message.speaker_name().map(str::to_string);

        match (message.kind(), speaker) {
            (MessageKind::System, _) => ConsoleLine::Notice {
                label: "System",
                text,
            },
            (MessageKind::Log, _) => ConsoleLine::Notice { label: "Log", text },
            (MessageKind::Error, speaker) => ConsoleLine::Failure {
                speaker: speaker.unwrap_or_else(|| "Error".to_string()),
                text,
            },
            (_, Some(speaker)) => ConsoleLine::Speech { speaker, text },
            (MessageKind::End, None) => ConsoleLine::Notice { label: "End", text },
            (_, None) => ConsoleLine::Notice {
                label: "Turn",
                text,
            },
        }
    }
}

/// Renders the live conversation to stdout
pub struct ConsoleRenderer {
    typing_delay: Duration,
}

impl ConsoleRenderer {
    pub fn new(typing_delay: Duration) -> Self {
        Self { typing_delay }
    }

    async fn print(&self, line: ConsoleLine) {
        match line {
            ConsoleLine::Notice { label, text } => {
                println!("{} {}", format!("[{}]", label).cyan().bold(), text.dimmed());
            }
            ConsoleLine::Failure { speaker, text } => {
                println!("{}", format!("{}: {}", speaker, text).red().bold());
            }
            ConsoleLine::Speech { speaker, text } => {
                print!("{} ", format!("{}:", speaker).yellow().bold());
                self.type_out(&text).await;
                println!();
            }
        }
    }

    async fn type_out(&self, text: &str) {
        if self.typing_delay.is_zero() {
            print!("{}", text);
            let _ = std::io::stdout().flush();
            return;
        }

        let mut buf = [0u8; 4];
        for c in text.chars() {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(c.encode_utf8(&mut buf).as_bytes());
            let _ = stdout.flush();
            tokio::time::sleep(self.typing_delay).await;
        }
    }
}

impl Default for ConsoleRenderer {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

impl Renderer for ConsoleRenderer {
    fn name(&self) -> &'static str {
        "console"
    }

    fn attach(self: Arc<Self>, bus: &Bus) -> JoinHandle<()> {
        let mut subscription = bus.subscribe();
        tokio::spawn(async move {
            while let Some(message) = subscription.recv().await {
                self.print(ConsoleLine::from_message(&message)).await;
            }
        })
    }
}
