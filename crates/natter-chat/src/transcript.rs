//! Plain-text transcript used to edit a conversation in an external editor.
//!
//! Each turn is written as a marker line carrying its metadata as JSON,
//! followed by its content and a blank line:
//!
//! ```text
//! ###>>>{"role":"system","model":"gpt-4","user":"ana","date":"..."}
//! You are a helpful assistant.
//!
//! ###>>>{"role":"user","model":"gpt-4","user":"ana","date":"..."}
//!
//! ```
//!
//! A final marker for the next turn is appended so a new turn can be typed
//! directly into the editor.

use natter_ai::{Role, Turn, timestamp};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    conversation::Conversation,
    error::{Error, Result},
};

/// Prefix of a turn marker line
pub const MARKER_PREFIX: &str = "###>>>";

/// Metadata filled in for markers that omit it
#[derive(Debug, Clone)]
pub struct TurnDefaults {
    pub model: String,
    pub user: String,
}

/// Runs an external editor over a rendered transcript
pub trait TranscriptEditor: Send {
    /// Let the operator edit `transcript` with `editor`; returns the edited text.
    fn edit(&mut self, editor: &str, transcript: &str) -> Result<String>;
}

/// Render `conversation` followed by an empty marker for `next`.
pub fn render(conversation: &Conversation, next: &Turn) -> Result<String> {
    let mut out = String::new();
    for turn in conversation {
        out.push_str(&marker_line(turn)?);
        out.push('\n');
        out.push_str(&turn.content);
        out.push_str("\n\n");
    }
    out.push_str(&marker_line(next)?);
    out.push_str("\n\n");
    Ok(out)
}

/// Turn metadata as written on a marker line
#[derive(Serialize)]
struct MarkerMeta<'a> {
    role: Role,
    model: &'a str,
    user: &'a str,
    date: &'a str,
    #[serde(flatten)]
    extra: &'a Map<String, Value>,
}

fn marker_line(turn: &Turn) -> Result<String> {
    let meta = MarkerMeta {
        role: turn.role,
        model: &turn.model,
        user: &turn.user,
        date: &turn.date,
        extra: &turn.extra,
    };
    Ok(format!("{}{}", MARKER_PREFIX, serde_json::to_string(&meta)?))
}

/// Parse an edited transcript back into a conversation.
///
/// Text before the first marker is ignored. Contents are trimmed. The last
/// turn is dropped when its content is empty, which is how the trailing
/// next-turn marker disappears when nothing was typed under it. A marker whose
/// JSON cannot be read fails the whole parse.
pub fn parse(text: &str, defaults: &TurnDefaults) -> Result<Conversation> {
    let mut turns = Vec::new();
    let mut current: Option<(Turn, String)> = None;

    for (line_number, line) in text.split_inclusive('\n').enumerate() {
        if let Some(meta) = line.strip_prefix(MARKER_PREFIX) {
            if let Some((turn, body)) = current.take() {
                turns.push(finish_turn(turn, &body));
            }
            let turn = parse_marker(meta.trim_end(), defaults)
                .map_err(|e| Error::Transcript(format!("line {}: {}", line_number + 1, e)))?;
            current = Some((turn, String::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push_str(line);
        }
    }

    if let Some((turn, body)) = current {
        if !body.trim().is_empty() {
            turns.push(finish_turn(turn, &body));
        }
    }

    Ok(Conversation::from_turns(turns))
}

fn finish_turn(mut turn: Turn, body: &str) -> Turn {
    turn.content = body.trim().to_string();
    turn
}

fn parse_marker(meta: &str, defaults: &TurnDefaults) -> std::result::Result<Turn, String> {
    let mut map: Map<String, Value> =
        serde_json::from_str(meta).map_err(|e| format!("invalid turn metadata: {}", e))?;

    map.entry("model")
        .or_insert_with(|| Value::String(defaults.model.clone()));
    map.entry("user")
        .or_insert_with(|| Value::String(defaults.user.clone()));
    map.entry("date").or_insert_with(|| Value::String(timestamp()));
    map.insert("content".to_string(), Value::String(String::new()));

    serde_json::from_value(Value::Object(map)).map_err(|e| format!("invalid turn metadata: {}", e))
}
