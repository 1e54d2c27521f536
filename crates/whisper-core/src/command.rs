//! Slash-command parsing and dispatch.
//!
//! Commands arrive as whole input lines starting with `/`. Tokenization
//! splits on whitespace runs; the first token (lowercased) selects the
//! command, the rest are arguments. Nicks and room names are sanitized to
//! `[a-zA-Z0-9_-]` and truncated before validation, so a nick like
//! `al ice!` degrades to `alice` instead of failing.

use tracing::error;

use crate::session::ChatSession;

const HELP_TEXT: &str = "\
Available commands:
  /nick <name>     Change your nickname (aliases: /n)
  /join <room>     Switch to another room (aliases: /j)
  /users           List users in the current room (aliases: /who, /w)
  /rooms           List known rooms (aliases: /r)
  /me <action>     Send an action message
  /clear           Clear the screen (aliases: /cls)
  /help            Show this help (aliases: /h, /?)
  /quit            Disconnect (aliases: /q, /exit)";

const SANITIZE_MAX_LEN: usize = 32;

/// Strip everything outside `[a-zA-Z0-9_-]` and truncate.
pub fn sanitize_nick(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(SANITIZE_MAX_LEN)
        .collect()
}

/// Room names are nicks plus lowercasing.
pub fn sanitize_room_name(input: &str) -> String {
    sanitize_nick(input).to_lowercase()
}

pub fn is_valid_nick(input: &str) -> bool {
    !input.is_empty()
        && input.len() <= SANITIZE_MAX_LEN
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn is_valid_room_name(input: &str) -> bool {
    is_valid_nick(input)
}

/// Parse a slash line into a lowercased command name and its arguments.
fn parse_line(line: &str) -> Option<(String, Vec<&str>)> {
    let mut tokens = line.trim().trim_start_matches('/').split_whitespace();
    let name = tokens.next()?.to_lowercase();
    Some((name, tokens.collect()))
}

/// Execute one slash command against a session. All failures degrade to
/// system messages for this user only.
pub async fn dispatch(session: &mut ChatSession, line: &str) {
    let Some((name, args)) = parse_line(line) else {
        session.show_system_message(
            "Unknown command: /. Type /help for available commands.",
        );
        return;
    };

    let result = run_command(session, &name, &args).await;
    if let Err(e) = result {
        error!(command = %name, error = %e, "Command handler failed");
        session.show_system_message(&format!("Command failed: {e}"));
    }
}

async fn run_command(
    session: &mut ChatSession,
    name: &str,
    args: &[&str],
) -> anyhow::Result<()> {
    match name {
        "nick" | "n" => cmd_nick(session, args).await,
        "join" | "j" => cmd_join(session, args).await,
        "users" | "who" | "w" => session.show_user_list(),
        "rooms" | "r" => session.show_room_list(),
        "help" | "h" | "?" => session.show_system_message(HELP_TEXT),
        "quit" | "q" | "exit" => {
            session.show_system_message("Goodbye!");
            session.disconnect().await;
        }
        "me" => cmd_me(session, args).await,
        "clear" | "cls" => session.clear_messages(),
        other => {
            session.show_system_message(&format!(
                "Unknown command: /{other}. Type /help for available commands."
            ));
        }
    }
    Ok(())
}

async fn cmd_nick(session: &mut ChatSession, args: &[&str]) {
    let Some(raw) = args.first() else {
        session.show_system_message("Usage: /nick <name>");
        return;
    };

    let nick = sanitize_nick(raw);
    if !is_valid_nick(&nick) {
        session.show_system_message(
            "Invalid nickname. Use letters, digits, '_' or '-'.",
        );
        return;
    }
    if nick.len() > session.config().max_nick_length {
        session.show_system_message(&format!(
            "Nickname too long (maximum {} characters)",
            session.config().max_nick_length
        ));
        return;
    }

    session.change_nick(&nick).await;
}

async fn cmd_join(session: &mut ChatSession, args: &[&str]) {
    let Some(raw) = args.first() else {
        session.show_system_message("Usage: /join <room>");
        return;
    };

    let room = sanitize_room_name(raw);
    if !is_valid_room_name(&room) {
        session.show_system_message(
            "Invalid room name. Use letters, digits, '_' or '-'.",
        );
        return;
    }
    if room.len() > session.config().max_room_name_length {
        session.show_system_message(&format!(
            "Room name too long (maximum {} characters)",
            session.config().max_room_name_length
        ));
        return;
    }

    session.join_room(&room).await;
}

async fn cmd_me(session: &mut ChatSession, args: &[&str]) {
    if args.is_empty() {
        session.show_system_message("Usage: /me <action>");
        return;
    }
    session.send_action(&args.join(" ")).await;
}
