use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Stage a file for the next message
    Attach,
    /// Drop the staged file
    Detach,
    /// Stop the response in flight
    Stop,
    /// Delete the whole conversation
    Clear,
    /// Toggle light/dark theme
    Theme,
    /// Send one of the suggested prompts
    Suggest,
    /// Show help
    Help,
    /// Exit the application
    Bye,
}

pub fn command_entries() -> Vec<CommandEntry> {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// Zero-based suggestion index from a one-based `/suggest <n>`
    pub fn suggestion_index(&self) -> Option<usize> {
        if self.command != SlashCommand::Suggest {
            return None;
        }

        let number: usize = self.argument()?.trim().parse().ok()?;
        number.checked_sub(1)
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Attach => "attach a file to the next message (/attach <path>, max 5MB)",
            SlashCommand::Detach => "remove the attached file",
            SlashCommand::Stop => "stop the response being generated",
            SlashCommand::Clear => "delete all messages",
            SlashCommand::Theme => "switch between light and dark theme",
            SlashCommand::Suggest => "send a suggested prompt (/suggest <n>)",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }

    /// Whether this command can be run while a response is in flight.
    pub fn available_during_response(self) -> bool {
        !matches!(self, SlashCommand::Suggest)
    }
}

/// Return all built-in commands in a Vec paired with their command string.
pub fn built_in_slash_commands() -> Vec<(&'static str, SlashCommand)> {
    SlashCommand::iter().map(|c| (c.command(), c)).collect()
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let rest = input.trim_start().strip_prefix('/')?;

    let mut split = rest.splitn(2, char::is_whitespace);
    let head = split.next()?;
    let argument = split
        .next()
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
        .map(str::to_string);

    let command = SlashCommand::from_str(head)
        .ok()
        .or_else(|| match head.to_lowercase().as_str() {
            "q" | "quit" | "exit" => Some(SlashCommand::Bye),
            "a" | "file" | "upload" => Some(SlashCommand::Attach),
            "s" | "cancel" => Some(SlashCommand::Stop),
            "new" | "delete" | "reset" => Some(SlashCommand::Clear),
            "t" | "toggle" => Some(SlashCommand::Theme),
            "h" | "?" => Some(SlashCommand::Help),
            _ => None,
        })?;

    Some(ParsedCommand { command, argument })
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for (command_str, command) in built_in_slash_commands() {
        help.push_str(&format!("/{} - {}\n", command_str, command.description()));
    }

    help.push_str(concat!(
        "\nKeys: Enter send, Up recall last message, Esc stop response, Ctrl+L clear,\n",
        "Ctrl+T theme, F1-F4 suggestions, Ctrl+C quit"
    ));
    help.push_str("\nAliases: /q for /bye, /file for /attach, /new for /clear");

    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attach_keeps_spaces_in_path() {
        let parsed = parse_slash_command("/attach ~/My Documents/report.pdf").unwrap();
        assert_eq!(parsed.command, SlashCommand::Attach);
        assert_eq!(parsed.argument(), Some("~/My Documents/report.pdf"));
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(parse_slash_command("/q").unwrap().command, SlashCommand::Bye);
        assert_eq!(parse_slash_command("/new").unwrap().command, SlashCommand::Clear);
        assert_eq!(parse_slash_command("/file x.png").unwrap().command, SlashCommand::Attach);
    }

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert!(parse_slash_command("hello /stop").is_none());
        assert!(parse_slash_command("/unknown thing").is_none());
    }

    #[test]
    fn test_suggestion_index_is_one_based() {
        assert_eq!(parse_slash_command("/suggest 1").unwrap().suggestion_index(), Some(0));
        assert_eq!(parse_slash_command("/suggest 0").unwrap().suggestion_index(), None);
        assert_eq!(parse_slash_command("/suggest two").unwrap().suggestion_index(), None);
        assert_eq!(parse_slash_command("/stop 1").unwrap().suggestion_index(), None);
    }

    #[test]
    fn test_help_lists_every_command() {
        let help = get_help_text();
        for entry in command_entries() {
            assert!(help.contains(&format!("/{}", entry.keyword)));
        }
    }
}
