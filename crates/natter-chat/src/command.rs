//! Commands typed at the prompt in place of a turn

/// A recognized command. Input that is not a command becomes a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Save and leave
    Exit,
    /// Hand the turn to the assistant without writing anything
    Pass,
    /// Back to the persona's opening turns
    Restart,
    /// Back to an empty conversation
    RestartHard,
    /// List saved chats
    List,
    /// List saved chats including backups
    ListAll,
    /// Replace the conversation with a saved chat
    Load,
    /// Save the conversation under a name
    Save,
    /// Edit the whole conversation as text in `editor`
    Edit { editor: String },
    /// Drop the last reply and generate it again
    Regenerate,
    /// Turn narration on or off
    ToggleSpeech,
    /// Narrate the last turn
    SpeakLast,
    /// Show the command table
    Help,
}

/// (inputs, description) for each command, in help order
const COMMAND_TABLE: &[(&[&str], &str)] = &[
    (&["exit"], "Save the chat and quit"),
    (&["pass"], "Let the assistant take the turn"),
    (&["restart"], "Start over from the persona"),
    (&["restart hard"], "Start over with an empty chat"),
    (&["list", "ls"], "List saved chats"),
    (&["list all", "ls all"], "List saved chats and backups"),
    (&["load"], "Load a saved chat"),
    (&["save"], "Save the chat under a name"),
    (&["vi", "vim", "nvim"], "Edit the whole chat in that editor"),
    (&["regenerate"], "Replace the last reply with a new one"),
    (&["speak", "s"], "Toggle narration"),
    (&["speak last", "sl"], "Narrate the last turn"),
    (&["help", "h"], "Show this help"),
];

impl Command {
    /// Parse a whole input line. Matching is exact and case-sensitive.
    pub fn parse(input: &str) -> Option<Command> {
        Some(match input {
            "exit" => Command::Exit,
            "pass" => Command::Pass,
            "restart" => Command::Restart,
            "restart hard" => Command::RestartHard,
            "list" | "ls" => Command::List,
            "list all" | "ls all" => Command::ListAll,
            "load" => Command::Load,
            "save" => Command::Save,
            "vi" | "vim" | "nvim" => Command::Edit {
                editor: input.to_string(),
            },
            "regenerate" => Command::Regenerate,
            "speak" | "s" => Command::ToggleSpeech,
            "speak last" | "sl" => Command::SpeakLast,
            "help" | "h" => Command::Help,
            _ => return None,
        })
    }
}

/// Help text listing every command
pub fn help_message() -> String {
    let rows: Vec<(String, &str)> = COMMAND_TABLE
        .iter()
        .map(|(inputs, description)| (inputs.join(", "), *description))
        .collect();
    let width = rows.iter().map(|(names, _)| names.len()).max().unwrap_or(0);

    let mut out = String::from("Available commands:\n");
    for (names, description) in rows {
        out.push_str(&format!("  {:<width$}  {}\n", names, description, width = width));
    }
    out.push_str("\nAnything else is sent as your turn.");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(Command::parse("ls"), Some(Command::List));
        assert_eq!(Command::parse("ls all"), Some(Command::ListAll));
        assert_eq!(Command::parse("s"), Some(Command::ToggleSpeech));
        assert_eq!(Command::parse("sl"), Some(Command::SpeakLast));
        assert_eq!(Command::parse("h"), Some(Command::Help));
        assert_eq!(Command::parse("restart hard"), Some(Command::RestartHard));
    }

    #[test]
    fn test_parse_editor_keeps_name() {
        assert_eq!(
            Command::parse("nvim"),
            Some(Command::Edit {
                editor: "nvim".into()
            })
        );
    }

    #[test]
    fn test_parse_is_exact() {
        assert_eq!(Command::parse("Exit"), None);
        assert_eq!(Command::parse(" exit"), None);
        assert_eq!(Command::parse("exit now"), None);
        assert_eq!(Command::parse("restart  hard"), None);
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("emacs"), None);
    }

    #[test]
    fn test_every_table_entry_parses() {
        for (inputs, _) in COMMAND_TABLE {
            for input in *inputs {
                assert!(Command::parse(input).is_some(), "{} does not parse", input);
            }
        }
    }

    #[test]
    fn test_help_lists_every_input() {
        let help = help_message();
        for (inputs, description) in COMMAND_TABLE {
            assert!(help.contains(inputs.join(", ").as_str()));
            assert!(help.contains(*description));
        }
    }
}
