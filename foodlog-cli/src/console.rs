// Console transport: maps typed lines to dialogue events and prints replies

use foodlog_core::{Command, Event, Keyboard, Reply, ReplyKind};

/// What a line typed at the prompt means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Event(Event),
    /// `/photo <path>`; the file is read by the caller
    Photo(String),
    Help,
    Quit,
    /// A `/N` press with no matching button on the last keyboard
    UnknownButton(usize),
    Empty,
}

/// Parse one line of input against the keyboard currently on screen.
///
/// Buttons are pressed with `/1`, `/2`, ... and `;` separates ingredients
/// so several can go in one line.
pub fn parse_line(line: &str, keyboard: Option<Keyboard>) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }

    match line {
        "/start" => return Input::Event(Event::Command(Command::Start)),
        "/add" => return Input::Event(Event::Command(Command::Add)),
        "/cancel" => return Input::Event(Event::Command(Command::Cancel)),
        "/help" => return Input::Help,
        "/quit" | "/exit" => return Input::Quit,
        _ => {}
    }

    if let Some(path) = line.strip_prefix("/photo") {
        return Input::Photo(path.trim().to_string());
    }

    if let Some(Ok(number)) = line.strip_prefix('/').map(str::parse::<usize>) {
        let button = number
            .checked_sub(1)
            .and_then(|idx| keyboard.and_then(|kb| kb.buttons().into_iter().nth(idx)));
        return match button {
            Some(button) => Input::Event(button.event),
            None => Input::UnknownButton(number),
        };
    }

    Input::Event(Event::Text(line.replace(';', "\n")))
}

/// Render a reply for the terminal
pub fn render_reply(reply: &Reply) -> String {
    let mut out = match reply.kind {
        ReplyKind::Message => reply.text.clone(),
        ReplyKind::Alert => format!("[!] {}", reply.text),
        ReplyKind::Notice => format!("(i) {}", reply.text),
    };

    if let Some(keyboard) = reply.keyboard {
        let buttons = keyboard.buttons();
        for row in buttons
            .iter()
            .enumerate()
            .collect::<Vec<_>>()
            .chunks(keyboard.row_width())
        {
            let row = row
                .iter()
                .map(|(idx, button)| format!("[/{} {}]", idx + 1, button.label))
                .collect::<Vec<_>>()
                .join(" ");
            out.push('\n');
            out.push_str(&row);
        }
    }
    out
}

pub const HELP: &str = "\
Commands:
  /start          greeting
  /add            start logging a meal
  /cancel         drop the current entry
  /photo <path>   send a meal photo
  /N              press button N under the last message
  /quit           leave
Anything else is sent as text; use ';' to put several ingredients on one line.";
