//! Speech narration through an external command

use std::path::Path;
use std::process::Stdio;

use natter_chat::Narrator;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Hands sentences to a worker task that speaks them one at a time with
/// `<command> -- <sentence>`.
pub struct SpeechNarrator {
    tx: mpsc::UnboundedSender<String>,
}

impl SpeechNarrator {
    /// Start the worker. It exits once the narrator is dropped and the queue
    /// has been spoken.
    pub fn spawn(command: impl Into<String>) -> (Self, JoinHandle<()>) {
        let command = command.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let worker = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                let status = Command::new(&command)
                    .arg("--")
                    .arg(&text)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .await;
                match status {
                    Ok(status) if !status.success() => {
                        tracing::debug!("{} exited with {}", command, status);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Failed to run {}: {}", command, e),
                }
            }
        });

        (Self { tx }, worker)
    }
}

impl Narrator for SpeechNarrator {
    fn narrate(&self, sentence: &str) {
        let text = clean_text(sentence);
        if text.is_empty() {
            return;
        }
        tracing::debug!("Narrating: {}", text);
        if self.tx.send(text).is_err() {
            tracing::warn!("Speech worker has stopped");
        }
    }
}

/// Strip markup that reads badly aloud
pub fn clean_text(text: &str) -> String {
    text.replace('`', "")
        .replace(">>> ", "")
        .replace('_', " ")
        .trim()
        .to_string()
}

/// Whether `command` can be found on PATH (or is a path to a file)
pub fn is_available(command: &str) -> bool {
    if command.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(command).is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(command).is_file()))
        .unwrap_or(false)
}
