//! External editor hand-off

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use natter_chat::{Error, Result, TranscriptEditor};

/// Writes the transcript to a hidden file next to the chats, runs the editor
/// on it, and reads it back.
pub struct ProcessEditor {
    dir: PathBuf,
}

impl ProcessEditor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl TranscriptEditor for ProcessEditor {
    fn edit(&mut self, editor: &str, transcript: &str) -> Result<String> {
        let path = self.dir.join(format!(".edit_{}", natter_ai::timestamp()));
        fs::write(&path, transcript)?;
        tracing::debug!("Editing {} with {}", path.display(), editor);

        let status = tokio::task::block_in_place(|| Command::new(editor).arg(&path).status());
        let edited = match status {
            Ok(status) if status.success() => fs::read_to_string(&path).map_err(Error::from),
            Ok(status) => Err(Error::Other(format!("{} exited with {}", editor, status))),
            Err(e) => Err(Error::Other(format!("failed to run {}: {}", editor, e))),
        };

        if let Err(e) = fs::remove_file(&path) {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
        }
        edited
    }
}
