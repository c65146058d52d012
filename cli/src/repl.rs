//! The interactive loop: read a line, stream the answer, ask about tools.

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use weft_engine::weft_types::{ImageArtifact, Message, Role, sanitize_terminal_text};
use weft_engine::{
    ChatSession, ConversationLog, DEFAULT_APPROVAL_PROMPT, PendingApproval, SessionError,
    SessionState, Truncation, TurnOutcome, UserInput,
};

type Input = Lines<BufReader<Stdin>>;

const HELP: &str = "\
/cancel   stop the current answer
/history  print the conversation as JSON
/quit     exit";

enum Command<'a> {
    Quit,
    Cancel,
    History,
    Help,
    Say(&'a str),
    Empty,
}

fn parse_command(line: &str) -> Command<'_> {
    match line.trim() {
        "" => Command::Empty,
        "/quit" | "/exit" => Command::Quit,
        "/cancel" => Command::Cancel,
        "/history" => Command::History,
        "/help" => Command::Help,
        text => Command::Say(text),
    }
}

enum Flow {
    Continue,
    Quit,
}

pub async fn run(session: &mut ChatSession) -> Result<()> {
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut transcript = Transcript::default();

    println!("weft: type a message, /help for commands");
    loop {
        prompt()?;
        let Some(line) = input.next_line().await? else {
            break;
        };
        match parse_command(&line) {
            Command::Quit => break,
            Command::Empty => {}
            Command::Help => println!("{HELP}"),
            Command::Cancel => {
                session.cancel();
            }
            Command::History => print_history(session)?,
            Command::Say(text) => {
                submit(session, &mut transcript, text);
                if let Flow::Quit = drive(session, &mut input, &mut transcript).await? {
                    break;
                }
            }
        }
    }

    session.cancel();
    Ok(())
}

fn prompt() -> Result<()> {
    let mut out = std::io::stdout();
    write!(out, "> ")?;
    out.flush()?;
    Ok(())
}

fn submit(session: &mut ChatSession, transcript: &mut Transcript, text: &str) {
    match session.submit(UserInput::text(text)) {
        Ok(_) => transcript.skip_to_end(session.log()),
        Err(SessionError::Busy) => eprintln!("Answer the pending tool request first (y/n)."),
        Err(e) => eprintln!("{e}"),
    }
}

/// Run the session until it is idle again.
async fn drive(
    session: &mut ChatSession,
    input: &mut Input,
    transcript: &mut Transcript,
) -> Result<Flow> {
    loop {
        match session.state() {
            SessionState::Streaming | SessionState::Resuming => {
                tokio::select! {
                    active = session.next_activity() => {
                        if active && session.process_stream_events() {
                            transcript.render(session.log())?;
                        }
                    }
                    line = input.next_line() => {
                        let Some(line) = line? else {
                            return Ok(Flow::Quit);
                        };
                        match parse_command(&line) {
                            Command::Quit => return Ok(Flow::Quit),
                            Command::Cancel => {
                                session.cancel();
                            }
                            Command::Say(text) => {
                                transcript.render(session.log())?;
                                transcript.finish(session.log());
                                submit(session, transcript, text);
                            }
                            Command::History | Command::Help | Command::Empty => {}
                        }
                    }
                    _ = tokio::signal::ctrl_c() => {
                        session.cancel();
                    }
                }
            }
            SessionState::AwaitingApproval => {
                transcript.render(session.log())?;
                transcript.finish(session.log());
                let Some(approved) = ask_approval(session, input).await? else {
                    return Ok(Flow::Quit);
                };
                if approved {
                    session.approve()?;
                } else {
                    session.decline()?;
                    transcript.render(session.log())?;
                }
            }
            SessionState::Idle => {
                transcript.render(session.log())?;
                transcript.finish(session.log());
                report_outcome(session.last_outcome());
                return Ok(Flow::Continue);
            }
        }
    }
}

/// `Some(true)` to run the tools, `None` when input closed.
async fn ask_approval(session: &ChatSession, input: &mut Input) -> Result<Option<bool>> {
    let prompt_text = session
        .pending_approval()
        .and_then(PendingApproval::prompt)
        .unwrap_or(DEFAULT_APPROVAL_PROMPT);

    println!();
    for call in session.pending_tool_calls() {
        println!(
            "  tool: {} {}",
            sanitize_terminal_text(call.name()),
            sanitize_terminal_text(&call.function.arguments)
        );
    }
    loop {
        print!("{} [y/n] ", sanitize_terminal_text(prompt_text));
        std::io::stdout().flush()?;
        let Some(line) = input.next_line().await? else {
            return Ok(None);
        };
        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(Some(true)),
            "n" | "no" => return Ok(Some(false)),
            _ => {}
        }
    }
}

fn report_outcome(outcome: Option<&TurnOutcome>) {
    match outcome {
        Some(TurnOutcome::Truncated(Truncation::IncompleteObject(lost))) => {
            eprintln!("(response cut off; {} bytes lost)", lost.pending_bytes);
        }
        Some(TurnOutcome::Truncated(Truncation::MissingDoneMarker)) => {
            eprintln!("(response ended early)");
        }
        Some(TurnOutcome::Cancelled) => eprintln!("(cancelled)"),
        _ => {}
    }
}

fn print_history(session: &ChatSession) -> Result<()> {
    let json = serde_json::to_string_pretty(&session.history())?;
    println!("{json}");
    Ok(())
}

/// Tracks what has been printed so far so only new text is written.
///
/// The message at `cursor` may still be rewritten by the stream; everything
/// before it is final.
#[derive(Default)]
struct Transcript {
    cursor: usize,
    printed: String,
    image_shown: bool,
}

impl Transcript {
    fn render(&mut self, log: &ConversationLog) -> Result<()> {
        let mut out = std::io::stdout().lock();
        let messages = log.messages();

        while self.cursor < messages.len() {
            let message = &messages[self.cursor];
            if message.role() == Role::Assistant {
                self.write_message(&mut out, message)?;
            }
            if self.cursor + 1 == messages.len() {
                break;
            }
            self.end_message(&mut out)?;
            self.cursor += 1;
        }

        out.flush()?;
        Ok(())
    }

    fn write_message(&mut self, out: &mut impl Write, message: &Message) -> Result<()> {
        let content = sanitize_terminal_text(message.content());
        match content.strip_prefix(self.printed.as_str()) {
            Some(suffix) => write!(out, "{suffix}")?,
            None => write!(out, "\n{content}")?,
        }
        self.printed = content.into_owned();

        if !self.image_shown
            && let Some(image) = message.image()
        {
            write!(out, "\n{}", describe_image(image))?;
            self.image_shown = true;
        }
        Ok(())
    }

    fn end_message(&mut self, out: &mut impl Write) -> Result<()> {
        if !self.printed.is_empty() || self.image_shown {
            writeln!(out)?;
        }
        self.printed.clear();
        self.image_shown = false;
        Ok(())
    }

    /// Close the current message; the next render starts after the log's end.
    fn finish(&mut self, log: &ConversationLog) {
        if !self.printed.is_empty() || self.image_shown {
            println!();
        }
        self.skip_to_end(log);
    }

    /// Mark everything already in the log as printed.
    fn skip_to_end(&mut self, log: &ConversationLog) {
        self.cursor = log.len();
        self.printed.clear();
        self.image_shown = false;
    }
}

fn describe_image(image: &ImageArtifact) -> String {
    if image.has_data() {
        format!(
            "[image: {}, {} bytes base64]",
            image.format(),
            image.data().len()
        )
    } else {
        format!("[image: {}]", sanitize_terminal_text(image.url()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands() {
        assert!(matches!(parse_command("  /quit "), Command::Quit));
        assert!(matches!(parse_command("/cancel"), Command::Cancel));
        assert!(matches!(parse_command(""), Command::Empty));
        assert!(matches!(parse_command(" hello "), Command::Say("hello")));
    }

    #[test]
    fn inline_images_are_summarized() {
        let image = ImageArtifact::inline("png", "QUJD");
        assert_eq!(describe_image(&image), "[image: png, 4 bytes base64]");
        let remote = ImageArtifact::remote("https://x/cat.png", "png");
        assert_eq!(describe_image(&remote), "[image: https://x/cat.png]");
    }
}
