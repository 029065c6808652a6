//! Line-based terminal front end
//!
//! Prompts are read with rustyline (history kept on disk); chat events are
//! printed to stdout with crossterm colors, errors to stderr.

use std::io::{self, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use crossterm::{
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
};
use natter_ai::{Role, Turn};
use natter_chat::{ChatEvent, Error, Input, Operator, PromptInfo, Result};
use rustyline::{DefaultEditor, error::ReadlineError};

/// Color a speaker name by role
pub fn role_color(role: Role) -> Color {
    match role {
        Role::System => Color::Blue,
        Role::User => Color::Green,
        Role::Assistant => Color::Red,
    }
}

/// Reads turns from the terminal and prints chat events
pub struct TerminalOperator {
    editor: DefaultEditor,
    history_path: Option<PathBuf>,
    postfix: String,
    persona: String,
}

impl TerminalOperator {
    pub fn new(postfix: impl Into<String>, persona: impl Into<String>) -> Result<Self> {
        let editor = DefaultEditor::new().map_err(readline_error)?;
        Ok(Self {
            editor,
            history_path: None,
            postfix: postfix.into(),
            persona: persona.into(),
        })
    }

    /// Keep prompt history in `path`
    pub fn with_history(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if let Err(e) = self.editor.load_history(&path) {
            tracing::debug!("No prompt history at {}: {}", path.display(), e);
        }
        self.history_path = Some(path);
        self
    }

    fn readline(&mut self, prompt: &str) -> std::result::Result<String, ReadlineError> {
        let editor = &mut self.editor;
        tokio::task::block_in_place(|| editor.readline(prompt))
    }

    fn remember(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        if let Err(e) = self.editor.add_history_entry(line) {
            tracing::debug!("Failed to add history entry: {}", e);
        }
        if let Some(path) = &self.history_path {
            if let Err(e) = self.editor.save_history(path) {
                tracing::warn!("Failed to save prompt history to {}: {}", path.display(), e);
            }
        }
    }
}

fn readline_error(e: ReadlineError) -> Error {
    match e {
        ReadlineError::Io(e) => Error::Io(e),
        other => Error::Other(format!("Failed to read input: {}", other)),
    }
}

#[async_trait]
impl Operator for TerminalOperator {
    async fn read_turn(&mut self, prompt: &PromptInfo) -> Result<Input> {
        let mut out = io::stdout();
        render_status(&mut out, prompt, &self.persona)?;
        out.flush()?;

        let styled = styled_name(prompt.role, &format!("{}:", prompt.name), &self.postfix);
        match self.readline(&styled) {
            Ok(line) => {
                self.remember(&line);
                Ok(Input::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(Input::Interrupted),
            Err(ReadlineError::Eof) => Ok(Input::Eof),
            Err(e) => Err(readline_error(e)),
        }
    }

    async fn ask(&mut self, question: &str) -> Result<Option<String>> {
        match self.readline(question) {
            Ok(line) => Ok(Some(line)),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(readline_error(e)),
        }
    }

    fn show(&mut self, event: &ChatEvent) {
        let result = match event {
            ChatEvent::Error { .. } | ChatEvent::Retrying { .. } => {
                let mut err = io::stderr();
                render_event(&mut err, event, &self.postfix).and_then(|_| err.flush())
            }
            _ => {
                let mut out = io::stdout();
                render_event(&mut out, event, &self.postfix).and_then(|_| out.flush())
            }
        };
        if let Err(e) = result {
            tracing::warn!("Failed to render event: {}", e);
        }
    }
}

/// `name` in bold role color followed by the plain postfix
fn styled_name(role: Role, name: &str, postfix: &str) -> String {
    let mut buf = Vec::new();
    let _ = queue!(
        buf,
        SetAttribute(Attribute::Bold),
        SetForegroundColor(role_color(role)),
        Print(name),
        ResetColor,
        SetAttribute(Attribute::Reset),
        Print(postfix)
    );
    String::from_utf8_lossy(&buf).into_owned()
}

/// Usage line shown above the prompt: `42% 3440/8192 | p: persona`
pub fn status_text(prompt: &PromptInfo, persona: &str) -> String {
    let mut status = format!(
        "{}% {}/{} | p: {}",
        prompt.usage_percent() as u64,
        prompt.token_count,
        prompt.context_window,
        persona
    );
    if prompt.narrate {
        status.push_str(" | speaking");
    }
    status
}

fn render_status<W: Write>(out: &mut W, prompt: &PromptInfo, persona: &str) -> io::Result<()> {
    queue!(
        out,
        SetForegroundColor(Color::DarkGrey),
        Print(status_text(prompt, persona)),
        ResetColor,
        Print("\n")
    )
}

fn render_turn<W: Write>(out: &mut W, turn: &Turn, postfix: &str) -> io::Result<()> {
    let name = format!("{}:", turn.display_name());
    queue!(
        out,
        Print(styled_name(turn.role, &name, postfix)),
        Print("\n"),
        Print(&turn.content),
        Print("\n")
    )
}

fn render_line<W: Write>(out: &mut W, color: Color, text: &str) -> io::Result<()> {
    queue!(out, SetForegroundColor(color), Print(text), ResetColor, Print("\n"))
}

/// Write one chat event to `out`
pub fn render_event<W: Write>(out: &mut W, event: &ChatEvent, postfix: &str) -> io::Result<()> {
    match event {
        ChatEvent::Transcript { conversation } => {
            for turn in conversation {
                render_turn(out, turn, postfix)?;
            }
            Ok(())
        }
        ChatEvent::Trimmed {
            dropped,
            token_count,
        } => render_line(
            out,
            Color::Yellow,
            &format!(
                "Dropped {} old turns to fit the context window ({} tokens left)",
                dropped, token_count
            ),
        ),
        ChatEvent::GenerationStart { model } => {
            queue!(out, Print(styled_name(Role::Assistant, &format!("{}:", model), postfix)))
        }
        ChatEvent::Retrying {
            attempt,
            max_retries,
            error,
        } => render_line(
            out,
            Color::Red,
            &format!("Error. Retrying {}/{}: {}", attempt, max_retries, error),
        ),
        ChatEvent::Delta { text } => queue!(out, Print(text)),
        ChatEvent::GenerationEnd { cancelled } => {
            if *cancelled {
                queue!(
                    out,
                    SetForegroundColor(Color::DarkGrey),
                    Print(" [interrupted]"),
                    ResetColor
                )?;
            }
            queue!(out, Print("\n"))
        }
        ChatEvent::SpeechToggled { enabled } => {
            render_line(out, Color::Yellow, &format!("Speak messages: {}", enabled))
        }
        ChatEvent::ChatList { chats } => {
            if chats.is_empty() {
                return render_line(out, Color::DarkGrey, "No saved chats.");
            }
            for chat in chats {
                queue!(
                    out,
                    SetForegroundColor(Color::Cyan),
                    Print(&chat.name),
                    ResetColor,
                    Print(": "),
                    Print(&chat.preview),
                    Print("\n")
                )?;
            }
            Ok(())
        }
        ChatEvent::Help { text } => queue!(out, Print(text), Print("\n")),
        ChatEvent::Saved { name, path } => render_line(
            out,
            Color::Green,
            &format!("Saved chat as {} ({})", name, path.display()),
        ),
        ChatEvent::Notice { message } => render_line(out, Color::Yellow, message),
        ChatEvent::Error { message } => render_line(out, Color::Red, message),
    }
}
