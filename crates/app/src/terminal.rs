use unolingo_chat::{ChatViewState, Message, Role, SendOutcome, SendTicket};

pub const GREETING: &str = "Hello! Write your message to the AI assistant.";

pub const HELP: &str = "\
/new         start a new chat
/list        show recent chats
/open <n>    open chat number n from /list
/help        show this help
/quit        exit
anything else is sent to the assistant";

/// One line of terminal input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    NewChat,
    List,
    /// One-based position in the recent-chats list.
    Open(usize),
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Send(line.to_string());
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    match name {
        "new" => Command::NewChat,
        "list" | "ls" => Command::List,
        "open" => match parts.next().map(str::parse::<usize>) {
            Some(Ok(position)) if position > 0 => Command::Open(position),
            _ => Command::Unknown(trimmed.to_string()),
        },
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        _ => Command::Unknown(trimmed.to_string()),
    }
}

pub fn render_sessions(view: &ChatViewState) -> String {
    if view.sessions.is_empty() {
        return "No recent chats.".to_string();
    }

    view.sessions
        .iter()
        .enumerate()
        .map(|(index, summary)| {
            let marker = if view.active_session_id == Some(summary.id) {
                '*'
            } else {
                ' '
            };
            format!("{marker} {:>2}. {}", index + 1, summary.title)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_message(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    format!("{speaker}> {}", message.text)
}

/// The user's turn, echoed as soon as the send is accepted.
pub fn render_accepted(ticket: &SendTicket) -> String {
    render_message(&Message::user(ticket.prompt.as_str()))
}

/// Selected transcript, or the greeting when no session is open.
pub fn render_transcript(view: &ChatViewState) -> String {
    if view.active_session_id.is_none() {
        return GREETING.to_string();
    }

    view.messages
        .iter()
        .map(render_message)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Status line for outcomes that produce no new assistant turn.
///
/// Rejected sends print nothing; a retry a moment later goes through.
pub fn describe_outcome(outcome: &SendOutcome) -> Option<String> {
    match outcome {
        SendOutcome::Rejected(rejection) => {
            tracing::debug!(rejection = ?rejection, "send ignored");
            None
        }
        SendOutcome::Stale(_) => {
            Some("A reply arrived for a send that is no longer active.".to_string())
        }
        SendOutcome::Replied { .. } | SendOutcome::Failed { .. } => None,
    }
}
