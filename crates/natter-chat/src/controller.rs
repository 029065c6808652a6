//! Turn-taking controller
//!
//! Owns the conversation for one interactive run. Human turns are read from an
//! [`Operator`]; lines that match the command table act on the chat instead of
//! becoming turns. Assistant turns trim the conversation, expand content
//! links, and stream the answer while finished sentences go to a narrator.

use std::{path::PathBuf, sync::Arc};

use futures::StreamExt;
use natter_ai::{CharEstimate, FragmentStream, Generator, ModelProfile, Role, StreamEvent, Tokenizer, Turn};
use tokio_util::sync::CancellationToken;

use crate::{
    command::{Command, help_message},
    conversation::Conversation,
    error::{Error, Result},
    events::ChatEvent,
    expand::Expander,
    generation::{RetryPolicy, open_stream},
    handle::ControllerHandle,
    narrate::{Narrator, Silent},
    operator::{Input, Operator, PromptInfo},
    segment::{SentenceSegmenter, split_sentences},
    store::{ChatStore, is_valid_chat_name},
    transcript::{self, TranscriptEditor, TurnDefaults},
    trim::{count_tokens, trim},
};

/// Regenerate needs a system turn, a user turn, and the reply to replace.
const MIN_TURNS_TO_REGENERATE: usize = 3;

/// Configuration for a chat run
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub model: ModelProfile,
    /// Author name stamped on every turn
    pub author: String,
    /// Conversation that `restart` returns to
    pub persona: Conversation,
    pub retry: RetryPolicy,
}

impl ControllerConfig {
    pub fn new(model: ModelProfile, author: impl Into<String>) -> Self {
        Self {
            model,
            author: author.into(),
            persona: Conversation::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_persona(mut self, persona: Conversation) -> Self {
        self.persona = persona;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Mutable state of one run
#[derive(Debug, Clone)]
pub struct Session {
    pub conversation: Conversation,
    pub active_role: Role,
    pub narrate: bool,
    /// Name the chat is saved under on exit
    pub chat_name: Option<String>,
}

impl Session {
    pub fn new(conversation: Conversation) -> Self {
        let active_role = conversation.next_role();
        Self {
            conversation,
            active_role,
            narrate: false,
            chat_name: None,
        }
    }

    pub fn with_narration(mut self, narrate: bool) -> Self {
        self.narrate = narrate;
        self
    }

    pub fn with_chat_name(mut self, chat_name: Option<String>) -> Self {
        self.chat_name = chat_name;
        self
    }
}

/// How a run ended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// Name the chat was saved under, if any
    pub saved_as: Option<String>,
    /// Last backup written
    pub backup: Option<PathBuf>,
}

/// What came out of one response stream
struct Streamed {
    text: String,
    cancelled: bool,
    error: Option<String>,
}

/// Runs the chat loop
pub struct Controller {
    config: ControllerConfig,
    session: Session,
    generator: Arc<dyn Generator>,
    store: Box<dyn ChatStore>,
    tokenizer: Arc<dyn Tokenizer>,
    narrator: Arc<dyn Narrator>,
    editor: Option<Box<dyn TranscriptEditor>>,
    expander: Expander,
    handle: ControllerHandle,
    last_backup: Option<PathBuf>,
}

impl Controller {
    pub fn new(
        config: ControllerConfig,
        session: Session,
        generator: Arc<dyn Generator>,
        store: Box<dyn ChatStore>,
    ) -> Self {
        Self {
            config,
            session,
            generator,
            store,
            tokenizer: Arc::new(CharEstimate),
            narrator: Arc::new(Silent),
            editor: None,
            expander: Expander::default(),
            handle: ControllerHandle::new(),
            last_backup: None,
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn Narrator>) -> Self {
        self.narrator = narrator;
        self
    }

    pub fn with_editor(mut self, editor: Box<dyn TranscriptEditor>) -> Self {
        self.editor = Some(editor);
        self
    }

    pub fn with_expander(mut self, expander: Expander) -> Self {
        self.expander = expander;
        self
    }

    /// Get a cloneable handle for aborting generations from other tasks.
    pub fn handle(&self) -> ControllerHandle {
        self.handle.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn conversation(&self) -> &Conversation {
        &self.session.conversation
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Run until the operator exits. Returns how the chat was persisted.
    pub async fn run(&mut self, operator: &mut dyn Operator) -> Result<RunOutcome> {
        operator.show(&ChatEvent::Transcript {
            conversation: self.session.conversation.clone(),
        });
        loop {
            if let Some(outcome) = self.step(operator).await? {
                return Ok(outcome);
            }
        }
    }

    /// Take one turn for whichever role is active.
    pub async fn step(&mut self, operator: &mut dyn Operator) -> Result<Option<RunOutcome>> {
        match self.session.active_role {
            Role::Assistant => {
                self.assistant_turn(operator).await?;
                Ok(None)
            }
            role => self.human_turn(role, operator).await,
        }
    }

    async fn human_turn(&mut self, role: Role, operator: &mut dyn Operator) -> Result<Option<RunOutcome>> {
        let prompt = self.prompt_info(role);
        let line = match operator.read_turn(&prompt).await? {
            Input::Line(line) => line,
            Input::Interrupted => return Ok(None),
            Input::Eof => return self.exit(operator).await.map(Some),
        };

        match Command::parse(&line) {
            Some(command) => self.execute(command, operator).await,
            None => {
                let turn = self.stamp(Turn::new(role, line));
                self.append(turn);
                Ok(None)
            }
        }
    }

    async fn execute(&mut self, command: Command, operator: &mut dyn Operator) -> Result<Option<RunOutcome>> {
        tracing::debug!("Command: {:?}", command);
        match command {
            Command::Exit => return self.exit(operator).await.map(Some),
            Command::Pass => self.session.active_role = Role::Assistant,
            Command::Restart => {
                self.backup();
                let persona = self.config.persona.clone();
                self.replace(persona, operator);
            }
            Command::RestartHard => {
                self.backup();
                self.replace(Conversation::new(), operator);
            }
            Command::List => self.list(false, operator),
            Command::ListAll => self.list(true, operator),
            Command::Load => self.load(operator).await?,
            Command::Save => {
                if let Some(name) = self.ask_save_name(operator, "Save name: ").await? {
                    self.save_as(&name, operator);
                }
            }
            Command::Edit { editor } => self.edit(&editor, operator),
            Command::Regenerate => self.regenerate(operator),
            Command::ToggleSpeech => {
                self.session.narrate = !self.session.narrate;
                operator.show(&ChatEvent::SpeechToggled {
                    enabled: self.session.narrate,
                });
            }
            Command::SpeakLast => self.speak_last(operator),
            Command::Help => operator.show(&ChatEvent::Help {
                text: help_message(),
            }),
        }
        Ok(None)
    }

    async fn assistant_turn(&mut self, operator: &mut dyn Operator) -> Result<()> {
        let window = self.config.model.context_window as usize;
        let trimmed = trim(&self.session.conversation, window, self.tokenizer.as_ref());
        if trimmed.dropped > 0 {
            tracing::info!(
                "Dropped {} turns to fit the {} token context window",
                trimmed.dropped,
                window
            );
            operator.show(&ChatEvent::Trimmed {
                dropped: trimmed.dropped,
                token_count: trimmed.token_count,
            });
            self.session.conversation = trimmed.conversation;
        }

        let request = self.expander.expand(&self.session.conversation);

        operator.show(&ChatEvent::GenerationStart {
            model: self.config.model.id.clone(),
        });
        let cancel = self.handle.begin_generation();
        let max_retries = self.config.retry.max_retries;
        let opened = open_stream(
            self.generator.as_ref(),
            &self.config.model,
            request.turns(),
            &self.config.retry,
            &cancel,
            |attempt, e| {
                operator.show(&ChatEvent::Retrying {
                    attempt,
                    max_retries,
                    error: e.to_string(),
                })
            },
        )
        .await;
        let streamed = match opened {
            Ok(Some(stream)) => self.consume(stream, &cancel, operator).await,
            Ok(None) => {
                operator.show(&ChatEvent::GenerationEnd { cancelled: true });
                Streamed {
                    text: String::new(),
                    cancelled: true,
                    error: None,
                }
            }
            Err(e) => {
                self.handle.end_generation();
                tracing::error!("Generation could not start: {}", e);
                self.backup();
                return Err(e);
            }
        };
        self.handle.end_generation();

        if let Some(message) = streamed.error {
            tracing::error!("Response stream failed: {}", message);
            if streamed.text.is_empty() {
                self.backup();
            } else {
                let turn = self.stamp(Turn::assistant(streamed.text));
                self.append(turn);
            }
            operator.show(&ChatEvent::error(format!("The answer broke off: {}", message)));
            if let Some(name) = self.ask_save_name(operator, "Recovery save name: ").await? {
                self.save_as(&name, operator);
            }
            return Err(Error::Generation(message));
        }

        if streamed.cancelled {
            tracing::info!("Generation cancelled after {} bytes", streamed.text.len());
        }
        let turn = self.stamp(Turn::assistant(streamed.text));
        self.append(turn);
        Ok(())
    }

    /// Drain the stream until it ends, fails, or `cancel` fires.
    async fn consume(
        &self,
        mut stream: FragmentStream,
        cancel: &CancellationToken,
        operator: &mut dyn Operator,
    ) -> Streamed {
        let narrate = self.session.narrate;
        let mut segmenter = SentenceSegmenter::new();
        let mut text = String::new();
        let mut cancelled = false;
        let mut error = None;

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                event = stream.next() => event,
            };

            match event {
                Some(StreamEvent::Delta { text: delta }) => {
                    text.push_str(&delta);
                    let sentences = segmenter.feed(&delta);
                    operator.show(&ChatEvent::Delta { text: delta });
                    if narrate {
                        for sentence in sentences {
                            self.narrator.narrate(&sentence);
                        }
                    }
                }
                Some(StreamEvent::Skipped) => {}
                Some(StreamEvent::Error { message }) => {
                    error = Some(message);
                    break;
                }
                None => break,
            }
        }

        if narrate {
            if let Some(rest) = segmenter.finish() {
                self.narrator.narrate(&rest);
            }
        }
        operator.show(&ChatEvent::GenerationEnd { cancelled });

        Streamed {
            text,
            cancelled,
            error,
        }
    }

    /// Back up, then save under a name if one is known or given.
    async fn exit(&mut self, operator: &mut dyn Operator) -> Result<RunOutcome> {
        let backup = self.backup();
        if self.session.conversation.is_empty() {
            return Ok(RunOutcome {
                saved_as: None,
                backup,
            });
        }

        let name = match self.session.chat_name.clone() {
            Some(name) => Some(name),
            None => self.ask_save_name(operator, "Save name: ").await?,
        };
        let saved_as = match name {
            Some(name) if self.save_as(&name, operator) => Some(name),
            _ => None,
        };
        Ok(RunOutcome { saved_as, backup })
    }

    /// Ask for a name to save under. `None` when the operator gives up.
    async fn ask_save_name(&mut self, operator: &mut dyn Operator, question: &str) -> Result<Option<String>> {
        loop {
            let Some(answer) = operator.ask(question).await? else {
                return Ok(None);
            };
            let name = answer.trim();
            if name == "exit" {
                return Ok(None);
            }
            if name.is_empty() {
                continue;
            }
            if !is_valid_chat_name(name) {
                operator.show(&ChatEvent::error(format!("\"{}\" is not a valid chat name", name)));
                continue;
            }
            if self.store.exists(name) {
                let confirmed = operator
                    .ask("Overwrite? (y/N) ")
                    .await?
                    .is_some_and(|a| a.trim().eq_ignore_ascii_case("y"));
                if !confirmed {
                    continue;
                }
            }
            return Ok(Some(name.to_string()));
        }
    }

    fn save_as(&mut self, name: &str, operator: &mut dyn Operator) -> bool {
        match self.store.save(name, &self.session.conversation) {
            Ok(path) => {
                self.session.chat_name = Some(name.to_string());
                operator.show(&ChatEvent::Saved {
                    name: name.to_string(),
                    path,
                });
                true
            }
            Err(e) => {
                operator.show(&ChatEvent::error(format!("Could not save {}: {}", name, e)));
                false
            }
        }
    }

    fn list(&self, include_hidden: bool, operator: &mut dyn Operator) {
        match self.store.list(include_hidden) {
            Ok(chats) => operator.show(&ChatEvent::ChatList { chats }),
            Err(e) => operator.show(&ChatEvent::error(format!("Could not list chats: {}", e))),
        }
    }

    async fn load(&mut self, operator: &mut dyn Operator) -> Result<()> {
        self.list(false, operator);
        let Some(answer) = operator.ask("Load chat: ").await? else {
            return Ok(());
        };
        let name = answer.trim();
        if name.is_empty() || name == "exit" {
            return Ok(());
        }

        match self.store.load(name) {
            Ok(conversation) => {
                self.backup();
                self.session.chat_name = Some(name.to_string());
                self.replace(conversation, operator);
            }
            Err(e) => operator.show(&ChatEvent::error(format!("Could not load {}: {}", name, e))),
        }
        Ok(())
    }

    fn edit(&mut self, editor: &str, operator: &mut dyn Operator) {
        let next = self.stamp(Turn::new(self.session.active_role, String::new()));
        let rendered = match transcript::render(&self.session.conversation, &next) {
            Ok(text) => text,
            Err(e) => {
                operator.show(&ChatEvent::error(e.to_string()));
                return;
            }
        };
        let defaults = TurnDefaults {
            model: self.config.model.id.clone(),
            user: self.config.author.clone(),
        };

        let Some(runner) = self.editor.as_mut() else {
            operator.show(&ChatEvent::error("Editing is not available"));
            return;
        };
        let edited = runner
            .edit(editor, &rendered)
            .and_then(|text| transcript::parse(&text, &defaults));

        match edited {
            Ok(conversation) => {
                self.replace(conversation, operator);
                self.backup();
            }
            Err(e) => operator.show(&ChatEvent::error(format!("Edit discarded: {}", e))),
        }
    }

    fn regenerate(&mut self, operator: &mut dyn Operator) {
        if self.session.conversation.len() < MIN_TURNS_TO_REGENERATE {
            operator.show(&ChatEvent::notice("Nothing to regenerate yet"));
            return;
        }
        self.backup();
        self.session.conversation.pop();
        self.session.active_role = self.session.conversation.next_role();
    }

    fn speak_last(&self, operator: &mut dyn Operator) {
        let Some(last) = self.session.conversation.last() else {
            operator.show(&ChatEvent::notice("Nothing to speak"));
            return;
        };
        for sentence in split_sentences(&last.content) {
            self.narrator.narrate(&sentence);
        }
    }

    fn prompt_info(&self, role: Role) -> PromptInfo {
        PromptInfo {
            role,
            name: match role {
                Role::System => "system".to_string(),
                _ => self.config.author.clone(),
            },
            token_count: count_tokens(&self.session.conversation, self.tokenizer.as_ref()),
            context_window: self.config.model.context_window,
            narrate: self.session.narrate,
        }
    }

    fn stamp(&self, turn: Turn) -> Turn {
        turn.with_model(self.config.model.id.clone())
            .with_user(self.config.author.clone())
    }

    fn append(&mut self, turn: Turn) {
        self.session.conversation.push(turn);
        self.backup();
        self.session.active_role = self.session.conversation.next_role();
    }

    fn replace(&mut self, conversation: Conversation, operator: &mut dyn Operator) {
        self.session.conversation = conversation;
        self.session.active_role = self.session.conversation.next_role();
        operator.show(&ChatEvent::Transcript {
            conversation: self.session.conversation.clone(),
        });
    }

    /// Overwrite the run's backup. Failures are logged, never fatal.
    fn backup(&mut self) -> Option<PathBuf> {
        match self.store.backup(&self.session.conversation) {
            Ok(Some(path)) => self.last_backup = Some(path),
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to write backup: {}", e),
        }
        self.last_backup.clone()
    }
}
