//! Chat command parsing

/// A recognized chat command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Help,
    Status,
    /// `inject <kind>` / `trigger <kind>`; the kind is unvalidated
    Inject(Option<String>),
    /// `postmortem` / `report`
    Report,
    Reset,
    /// Slash-prefixed text that names no command
    Unknown(String),
}

impl ChatCommand {
    /// Parse one chat message. Plain chatter that is not a command yields None.
    ///
    /// Argument-free commands match only as the whole message; `inject` and
    /// `trigger` take the rest of the line.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let slashed = trimmed.starts_with('/');
        let body = trimmed.trim_start_matches('/').to_lowercase();

        let mut words = body.split_whitespace();
        let head = words.next();
        let has_args = words.clone().next().is_some();

        let command = match head {
            Some("inject") | Some("trigger") => ChatCommand::Inject(words.last().map(str::to_string)),
            Some("help") | Some("?") if !has_args => ChatCommand::Help,
            Some("status") if !has_args => ChatCommand::Status,
            Some("postmortem") | Some("report") if !has_args => ChatCommand::Report,
            Some("reset") if !has_args => ChatCommand::Reset,
            _ if slashed => ChatCommand::Unknown(trimmed.to_string()),
            _ => return None,
        };
        Some(command)
    }
}
