//! Wire format for the line-oriented chat protocol.
//!
//! Everything on the wire is newline-delimited UTF-8 text. Chat messages are
//! timestamped (`"alice [12:34]: hi\n"`); join and leave events are plain
//! system lines. The server only constructs these lines, it never parses
//! them back; rendering is the clients' concern.

use chrono::{Local, NaiveTime};

/// Upper bound on the handshake line. The first line a client sends is its
/// username; anything past this limit spills into the message stream.
pub const MAX_HANDSHAKE_BYTES: u64 = 1024;

/// A timestamped chat line: `"<username> [<HH:MM>]: <text>\n"`.
pub fn chat_line(username: &str, text: &str) -> String {
    chat_line_at(username, text, Local::now().time())
}

fn chat_line_at(username: &str, text: &str, time: NaiveTime) -> String {
    format!("{username} [{}]: {text}\n", time.format("%H:%M"))
}

/// System line announcing a new participant.
pub fn join_notice(username: &str) -> String {
    format!("{username} joined the chat!\n")
}

/// System line announcing a departed participant.
pub fn departure_notice(username: &str) -> String {
    format!("{username} left the chat.\n")
}
