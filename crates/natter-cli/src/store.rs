//! Chat files on disk
//!
//! Every chat is a pretty-printed JSON array of turns in `<data>/chats`.
//! Named chats use their name as the file name; the run's backup is a hidden
//! `.backup_<timestamp>` file that is rewritten after every change.

use std::fs;
use std::path::{Path, PathBuf};

use natter_chat::{
    ChatStore, ChatSummary, Conversation, Error, Result,
    store::{is_valid_chat_name, preview},
};

/// Prefix of backup file names
pub const BACKUP_PREFIX: &str = ".backup_";

/// JSON chat files in one directory
pub struct FileChatStore {
    dir: PathBuf,
    backup_path: PathBuf,
}

impl FileChatStore {
    /// Open (and create) the chat directory. The backup name is fixed for
    /// the lifetime of the store.
    pub fn open(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let backup_path = dir.join(format!("{}{}", BACKUP_PREFIX, natter_ai::timestamp()));
        Ok(Self { dir, backup_path })
    }

    /// Get the chats directory under a data directory
    pub fn chats_dir(data_dir: &Path) -> PathBuf {
        data_dir.join("chats")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the most recent backup, by name
    pub fn last_backup(&self) -> Result<Option<String>> {
        let mut backups: Vec<String> = self
            .file_names()?
            .into_iter()
            .filter(|name| name.starts_with(BACKUP_PREFIX))
            .collect();
        backups.sort();
        Ok(backups.pop())
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        if !is_valid_chat_name(name) && !name.starts_with(BACKUP_PREFIX) {
            return Err(Error::Other(format!("invalid chat name: {}", name)));
        }
        Ok(self.dir.join(name))
    }

    fn file_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}

fn write_chat(path: &Path, conversation: &Conversation) -> Result<()> {
    let json = serde_json::to_string_pretty(conversation)?;
    fs::write(path, json)?;
    Ok(())
}

fn read_chat(path: &Path) -> Result<Conversation> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

impl ChatStore for FileChatStore {
    fn backup(&mut self, conversation: &Conversation) -> Result<Option<PathBuf>> {
        if conversation.is_empty() {
            return Ok(None);
        }
        write_chat(&self.backup_path, conversation)?;
        tracing::debug!("Backed up {} turns to {}", conversation.len(), self.backup_path.display());
        Ok(Some(self.backup_path.clone()))
    }

    fn save(&mut self, name: &str, conversation: &Conversation) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        write_chat(&path, conversation)?;
        tracing::info!("Saved chat to {}", path.display());
        Ok(path)
    }

    fn load(&self, name: &str) -> Result<Conversation> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(Error::Other(format!("chat not found: {}", name)));
        }
        read_chat(&path)
    }

    fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.is_file()).unwrap_or(false)
    }

    fn list(&self, include_hidden: bool) -> Result<Vec<ChatSummary>> {
        let mut names = self.file_names()?;
        names.sort();

        let mut chats = Vec::new();
        for name in names {
            let hidden = name.starts_with('.');
            if hidden && !include_hidden {
                continue;
            }
            // Unreadable files are listed without a preview
            let preview = match read_chat(&self.dir.join(&name)) {
                Ok(conversation) => preview(&conversation),
                Err(e) => {
                    tracing::debug!("Skipping preview of {}: {}", name, e);
                    String::new()
                }
            };
            chats.push(ChatSummary {
                name,
                hidden,
                preview,
            });
        }
        Ok(chats)
    }
}
