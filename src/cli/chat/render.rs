use std::io::{self, Write};

use crossterm::QueueableCommand;
use crossterm::cursor::MoveToColumn;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};

use super::conversation_state::{ConversationState, Role, Turn};

const LOADING_TEXT: &str = "Thinking...";

/// Print one turn as a chat bubble.
pub fn write_turn(out: &mut dyn Write, turn: &Turn) -> io::Result<()> {
    match turn.role() {
        Role::User => writeln!(out, "{} {}", "You:".bold().cyan(), turn.text()),
        Role::Assistant => writeln!(out, "{} {}\n", "Assistant:".bold().green(), turn.text()),
    }
}

/// Redraw the whole conversation.
pub fn write_transcript(out: &mut dyn Write, conversation: &ConversationState) -> io::Result<()> {
    if conversation.is_empty() {
        writeln!(out, "{}", "No messages yet.".dark_grey())?;
        return Ok(());
    }
    for turn in conversation.all() {
        write_turn(out, turn)?;
    }
    Ok(())
}

pub fn show_loading(out: &mut dyn Write) -> io::Result<()> {
    write!(out, "{}", LOADING_TEXT.dark_grey())?;
    out.flush()
}

/// Erase the loading indicator so the reply starts on a clean line.
pub fn clear_loading(out: &mut dyn Write) -> io::Result<()> {
    out.queue(MoveToColumn(0))?.queue(Clear(ClearType::CurrentLine))?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(turns: &[Turn]) -> String {
        let mut conversation = ConversationState::new();
        for turn in turns {
            conversation.append(turn.clone());
        }
        let mut buf = Vec::new();
        write_transcript(&mut buf, &conversation).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn transcript_lists_turns_in_order() {
        let out = rendered(&[Turn::user("Do you wash SUVs?"), Turn::assistant("Yes, we do.")]);

        let question = out.find("Do you wash SUVs?").unwrap();
        let answer = out.find("Yes, we do.").unwrap();
        assert!(question < answer);
        assert!(out.contains("You:"));
        assert!(out.contains("Assistant:"));
    }

    #[test]
    fn empty_transcript_says_so() {
        assert!(rendered(&[]).contains("No messages yet."));
    }
}
