pub mod context;
pub mod conversation_state;
pub mod prompt;
pub mod render;
pub mod session;

use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::process::ExitCode;

use eyre::Result;
use prompt::generate_prompt;
use rustyline::error::ReadlineError;
use session::Session;
use tracing::{info, warn};

use crate::gemini_client::AnswerService;

const WELCOME_TEXT: &str = "
Hi, I'm the 5K Car Care assistant. Ask me anything about our services.

Things to try
• What does a ceramic coating cost?
• Where is the nearest branch to my location?
• How do I apply for a franchise?

/help         Show the help dialogue
/quit         Quit the application
";

const HELP_TEXT: &str = "
5K Car Care Assistant

/history      Show the whole conversation
/clear        Start a new conversation
/help         Show this help dialogue
/quit         Quit the application

Press Ctrl-C while waiting for an answer to cancel the request.
";

/// Produces a future that resolves when the user wants the in-flight request
/// dropped. Called once per question.
pub type CancelSignal = Box<dyn Fn() -> CancelFuture>;

pub type CancelFuture = Pin<Box<dyn Future<Output = ()>>>;

/// What became of one line of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputOutcome {
    Handled,
    Cancelled,
}

pub struct ChatContext {
    output: Box<dyn Write>,
    input: Option<String>,
    interactive: bool,
    session: Session,
    answer_service: Box<dyn AnswerService>,
    cancel_signal: CancelSignal,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write>,
        input: Option<String>,
        interactive: bool,
        answer_service: Box<dyn AnswerService>,
    ) -> Self {
        Self {
            output,
            input,
            interactive,
            session: Session::new(),
            answer_service,
            cancel_signal: ctrl_c_signal(),
        }
    }

    /// Replace the Ctrl-C listener used to cancel requests.
    #[cfg(test)]
    fn with_cancel_signal(mut self, cancel_signal: CancelSignal) -> Self {
        self.cancel_signal = cancel_signal;
        self
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        // Non-interactive mode (single question)
        if let Some(input) = self.input.take() {
            return match self.handle_input(&input).await? {
                InputOutcome::Handled => Ok(ExitCode::SUCCESS),
                InputOutcome::Cancelled => Ok(ExitCode::FAILURE),
            };
        }

        if self.interactive {
            self.print_welcome()?;
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.output, "{}", WELCOME_TEXT)?;
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;

        loop {
            let prompt_text = generate_prompt(None);
            match rl.readline(&prompt_text) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    if line.trim() == "/quit" {
                        break;
                    }

                    if let Err(e) = self.handle_input(&line).await {
                        writeln!(self.output, "Error: {}", e)?;
                    }
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(e) => {
                    writeln!(self.output, "Error: {}", e)?;
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> Result<InputOutcome> {
        match input.trim() {
            "" => {}
            "/help" => {
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            "/history" => {
                render::write_transcript(&mut *self.output, self.session.conversation())?;
            }
            "/clear" => {
                info!(
                    "Starting a new session, dropping {} turns",
                    self.session.conversation().len()
                );
                self.session = Session::new();
                writeln!(self.output, "Conversation cleared.")?;
            }
            question => {
                return self.process_chat_input(question).await;
            }
        }

        Ok(InputOutcome::Handled)
    }

    async fn process_chat_input(&mut self, question: &str) -> Result<InputOutcome> {
        self.session.record_user(question);

        if self.interactive {
            render::show_loading(&mut *self.output)?;
        } else if let Some(turn) = self.session.conversation().all().last() {
            render::write_turn(&mut *self.output, turn)?;
        }

        // History already ends with the question; the client appends it again.
        let history = self.session.conversation().all();
        let reply = tokio::select! {
            reply = self.answer_service.answer(question, history, self.session.context()) => Some(reply),
            _ = (self.cancel_signal)() => None,
        };

        if self.interactive {
            render::clear_loading(&mut *self.output)?;
        }

        match reply {
            Some(reply) => {
                self.session.record_assistant(&reply);
                if let Some(turn) = self.session.conversation().all().last() {
                    render::write_turn(&mut *self.output, turn)?;
                }
                Ok(InputOutcome::Handled)
            }
            None => {
                warn!("Request cancelled by user");
                writeln!(self.output, "Request cancelled.")?;
                Ok(InputOutcome::Cancelled)
            }
        }
    }
}

fn ctrl_c_signal() -> CancelSignal {
    Box::new(|| Box::pin(cancel_requested()) as CancelFuture)
}

/// Resolves on Ctrl-C. Never resolves if the signal handler can't be installed.
async fn cancel_requested() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Unable to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
