//! natter - chat with a language model from the terminal

mod config;
mod editor;
mod persona;
mod speech;
mod store;
mod terminal;

use anyhow::{Context, bail};
use clap::Parser;
use crossterm::style::Stylize;
use natter_ai::{Generator, Turn, models, providers::openai::OpenAIProvider, tokenizer};
use natter_chat::{
    ChatEvent, ChatStore, Controller, ControllerConfig, Conversation, Expander, Narrator, RetryPolicy, Session,
    Silent,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

use config::Config;
use store::FileChatStore;

/// natter - chat with a language model from the terminal
#[derive(Parser, Debug)]
#[command(name = "natter")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Save the chat under this name on exit
    #[arg(long)]
    chat_name: Option<String>,

    /// Continue a saved chat
    #[arg(long)]
    load_chat: Option<String>,

    /// Continue from the most recent backup
    #[arg(long)]
    load_last_chat: bool,

    /// List saved chats
    #[arg(long)]
    list_chats: bool,

    /// List saved chats including hidden backups
    #[arg(long)]
    list_all_chats: bool,

    /// List the models offered by the API
    #[arg(long)]
    list_models: bool,

    /// Speak the answers
    #[arg(long)]
    speak: bool,

    /// Persona the chat starts from
    #[arg(short, long)]
    persona: Option<String>,

    /// Model to use (default: from config, else gpt-4)
    #[arg(short, long)]
    model: Option<String>,

    /// Open the config file in $EDITOR
    #[arg(long)]
    config: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// First message of the chat
    user_input: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing
    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("natter=debug")
            .with_writer(std::io::stderr)
            .init();
    } else if let Ok(filter) = EnvFilter::try_from_default_env() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    // Initialize config and exit
    if args.init_config {
        match Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    if args.config {
        return open_config();
    }

    let cfg = Config::load();
    let data_dir = Config::data_dir();
    let chats_dir = FileChatStore::chats_dir(&data_dir);
    let store = FileChatStore::open(&chats_dir)
        .with_context(|| format!("Failed to open chat directory {}", chats_dir.display()))?;

    if args.list_chats || args.list_all_chats {
        return list_chats(&store, args.list_all_chats);
    }

    let Some(api_key) = cfg.api_key() else {
        eprintln!("Error: No API key found");
        eprintln!();
        eprintln!("Set your API key with: export OPENAI_API_KEY=your-key");
        eprintln!("Or add it to config file: natter --init-config");
        std::process::exit(1);
    };
    let mut provider = OpenAIProvider::new(api_key);
    if let Some(ref base_url) = cfg.base_url {
        provider = provider.with_base_url(base_url);
    }

    if args.list_models {
        let available = provider.list_models().await?;
        println!("available models:");
        for model in available {
            println!("{}", model.id);
        }
        return Ok(());
    }

    let model_id = args.model.clone().unwrap_or_else(|| cfg.model.clone());
    let model = models::resolve(&model_id, cfg.context_window);

    let persona_name = args.persona.clone().unwrap_or_else(|| cfg.persona.clone());
    let personas_dir = Config::config_dir().join("personas");
    let persona = persona::load(&personas_dir, &persona_name, &model.id, &cfg.user)?;

    let conversation = starting_conversation(&args, &store, &persona, &model.id, &cfg.user)?;

    let speak = args.speak || cfg.speak;
    let mut speech_worker = None;
    let narrator: Arc<dyn Narrator> = if speech::is_available(&cfg.speech_command) {
        let (narrator, worker) = speech::SpeechNarrator::spawn(cfg.speech_command.clone());
        speech_worker = Some(worker);
        Arc::new(narrator)
    } else {
        if speak {
            eprintln!("{}", format!("{} not found, narration is off", cfg.speech_command).yellow());
        }
        Arc::new(Silent)
    };

    let controller_config = ControllerConfig::new(model, cfg.user.clone())
        .with_persona(persona)
        .with_retry(RetryPolicy {
            delay: cfg.retry_delay(),
            ..Default::default()
        });
    let session = Session::new(conversation)
        .with_narration(speak)
        .with_chat_name(args.chat_name.clone());
    let generator: Arc<dyn Generator> = Arc::new(provider);
    let tokenizer = tokenizer::for_model(&controller_config.model.id);

    let mut controller = Controller::new(controller_config, session, generator, Box::new(store))
        .with_tokenizer(tokenizer)
        .with_narrator(narrator)
        .with_expander(Expander::new(cfg.vault_dir()))
        .with_editor(Box::new(editor::ProcessEditor::new(&chats_dir)));

    // Ctrl+C outside the prompt stops the answer being generated
    let handle = controller.handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if handle.is_generating() {
                tracing::debug!("Interrupting generation");
            }
            handle.abort();
        }
    });

    let mut terminal = terminal::TerminalOperator::new(cfg.prompt_postfix.clone(), persona_name)?
        .with_history(data_dir.join("history"));

    let result = controller.run(&mut terminal).await;

    // Let queued sentences finish
    drop(controller);
    if let Some(worker) = speech_worker {
        finish_speech(worker).await;
    }

    match result {
        Ok(outcome) => {
            if outcome.saved_as.is_none() {
                if let Some(path) = outcome.backup {
                    println!("{}", format!("Backup: {}", path.display()).dark_grey());
                }
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            std::process::exit(1);
        }
    }
}

/// Wait for the speech worker to drain its queue
async fn finish_speech(worker: JoinHandle<()>) -> bool {
    match worker.await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Speech worker failed: {}", e);
            false
        }
    }
}

/// Trailing words start a fresh chat; otherwise a saved chat or the persona.
fn starting_conversation(
    args: &Args,
    store: &FileChatStore,
    persona: &Conversation,
    model: &str,
    user: &str,
) -> anyhow::Result<Conversation> {
    let user_input = args.user_input.join(" ");
    if !user_input.trim().is_empty() {
        let mut conversation = persona.clone();
        conversation.push(Turn::user(user_input).with_model(model).with_user(user));
        return Ok(conversation);
    }

    if let Some(ref name) = args.load_chat {
        return store
            .load(name)
            .with_context(|| format!("Failed to load chat {}", name));
    }

    if args.load_last_chat {
        let Some(name) = store.last_backup()? else {
            bail!("No backups found in {}", store.dir().display());
        };
        tracing::debug!("Loading last backup {}", name);
        return Ok(store.load(&name)?);
    }

    Ok(persona.clone())
}

fn list_chats(store: &FileChatStore, include_hidden: bool) -> anyhow::Result<()> {
    let chats = store.list(include_hidden)?;
    let mut out = std::io::stdout();
    terminal::render_event(&mut out, &ChatEvent::ChatList { chats }, "")?;
    Ok(())
}

/// Open the config file in $EDITOR (vi if unset), creating it first
fn open_config() -> anyhow::Result<()> {
    let path = Config::init()?;
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = std::process::Command::new(&editor)
        .arg(&path)
        .status()
        .with_context(|| format!("Failed to run {}", editor))?;
    if !status.success() {
        bail!("{} exited with {}", editor, status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use natter_ai::Role;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["natter"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    fn persona() -> Conversation {
        Conversation::from_turns(vec![Turn::system("You are a helpful assistant.")])
    }

    #[test]
    fn test_args_parse() {
        let args = args(&["-p", "pirate", "-m", "gpt-4o", "--speak", "what", "is", "rust"]);
        assert_eq!(args.persona.as_deref(), Some("pirate"));
        assert_eq!(args.model.as_deref(), Some("gpt-4o"));
        assert!(args.speak);
        assert_eq!(args.user_input, vec!["what", "is", "rust"]);
    }

    #[test]
    fn test_trailing_words_start_chat() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileChatStore::open(dir.path()).unwrap();
        let args = args(&["hello", "there"]);

        let chat = starting_conversation(&args, &store, &persona(), "gpt-4", "ana").unwrap();
        assert_eq!(chat.len(), 2);
        assert_eq!(chat.turns()[1].content, "hello there");
        assert_eq!(chat.turns()[1].user, "ana");
        assert_eq!(chat.next_role(), Role::Assistant);
    }

    #[test]
    fn test_load_chat_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileChatStore::open(dir.path()).unwrap();
        let saved = Conversation::from_turns(vec![Turn::system("s"), Turn::user("saved")]);
        store.save("mine", &saved).unwrap();

        let chat = starting_conversation(&args(&["--load-chat", "mine"]), &store, &persona(), "gpt-4", "ana").unwrap();
        assert_eq!(chat, saved);
        assert!(starting_conversation(&args(&["--load-chat", "other"]), &store, &persona(), "gpt-4", "ana").is_err());
    }

    #[test]
    fn test_load_last_backup() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileChatStore::open(dir.path()).unwrap();
        let args = args(&["--load-last-chat"]);
        assert!(starting_conversation(&args, &store, &persona(), "gpt-4", "ana").is_err());

        let backed_up = Conversation::from_turns(vec![Turn::system("s"), Turn::user("before")]);
        store.backup(&backed_up).unwrap();
        let chat = starting_conversation(&args, &store, &persona(), "gpt-4", "ana").unwrap();
        assert_eq!(chat, backed_up);
    }

    #[tokio::test]
    async fn test_finish_speech_reports_failed_worker() {
        let done = tokio::spawn(async {});
        assert!(finish_speech(done).await);

        let failed = tokio::spawn(async { panic!("voice crashed") });
        assert!(!finish_speech(failed).await);
    }

    #[test]
    fn test_defaults_to_persona() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileChatStore::open(dir.path()).unwrap();
        let chat = starting_conversation(&args(&[]), &store, &persona(), "gpt-4", "ana").unwrap();
        assert_eq!(chat, persona());
    }
}
