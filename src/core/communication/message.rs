//! Wire-level message conventions.
//!
//! Every message is a plain line; kinds are told apart only by position
//! (the first line of a connection is the username) and content (the quit
//! keyword). There is no type tag on the wire.

/// Keyword that ends a chat session, matched case-insensitively.
pub const QUIT_KEYWORD: &str = "!quit";

/// Notice relayed to peers when a user registers.
pub const JOIN_NOTICE: &str = "has entered the chat.";

/// Notice relayed to peers when a user leaves or is dropped.
pub const LEAVE_NOTICE: &str = "has left the chat.";

/// Separator between the sender's name and the content of a relayed line.
pub const RELAY_DELIMITER: &str = ": ";

/// Returns true if `line` is the quit keyword in any letter case.
pub fn is_quit(line: &str) -> bool {
    line.eq_ignore_ascii_case(QUIT_KEYWORD)
}

/// Format a line as peers see it: `<username>: <content>`.
pub fn format_relay(username: &str, content: &str) -> String {
    format!("{}{}{}", username, RELAY_DELIMITER, content)
}

/// Classified inbound line on an active session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatLine {
    /// Content to relay verbatim
    Chat(String),
    /// The quit keyword
    Quit,
}

impl ChatLine {
    pub fn parse(line: String) -> Self {
        if is_quit(&line) {
            ChatLine::Quit
        } else {
            ChatLine::Chat(line)
        }
    }
}
