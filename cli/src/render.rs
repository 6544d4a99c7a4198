use console::{Term, style};
use scout_core::agent::{AgentEvent, LoopState, TurnObserver};
use scout_core::session::{Conversation, Message};
use scout_core::traits::Role;
use termimad::MadSkin;

fn user_tag() -> String {
    style("you ›").green().bold().to_string()
}

fn assistant_tag() -> String {
    style("scout ›").cyan().bold().to_string()
}

pub fn print_answer(skin: &MadSkin, answer: &str) {
    println!("{}", assistant_tag());
    skin.print_text(answer);
}

pub fn print_message(skin: &MadSkin, message: &Message) {
    match message.role {
        Role::User => println!("{} {}", user_tag(), message.content),
        _ => print_answer(skin, &message.content),
    }
}

pub fn print_conversation(skin: &MadSkin, conversation: &Conversation) {
    if conversation.is_empty() {
        println!("{}", style("(no messages yet)").dim());
        return;
    }
    for message in conversation.messages() {
        print_message(skin, message);
        println!();
    }
}

pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", style("✗").red().bold(), err);
}

/// Shows progress for one turn: a status line while waiting, tool
/// invocations, and streamed tokens as they arrive.
pub struct TurnPrinter {
    term: Term,
    status_shown: bool,
    streamed: bool,
    line_open: bool,
}

impl Default for TurnPrinter {
    fn default() -> Self {
        Self {
            term: Term::stdout(),
            status_shown: false,
            streamed: false,
            line_open: false,
        }
    }
}

impl TurnPrinter {
    /// Whether any part of the answer was already written to the terminal.
    pub fn streamed(&self) -> bool {
        self.streamed
    }

    pub fn finish(&mut self) {
        self.clear_status();
        self.close_line();
    }

    fn show_status(&mut self, text: &str) {
        self.clear_status();
        if self.term.is_term() && !self.line_open {
            let _ = self.term.write_line(&style(text).dim().italic().to_string());
            self.status_shown = true;
        }
    }

    fn clear_status(&mut self) {
        if self.status_shown {
            let _ = self.term.clear_last_lines(1);
            self.status_shown = false;
        }
    }

    fn close_line(&mut self) {
        if self.line_open {
            println!();
            self.line_open = false;
        }
    }
}

impl TurnObserver for TurnPrinter {
    fn on_event(&mut self, event: &AgentEvent<'_>) {
        match event {
            AgentEvent::State(LoopState::AwaitingModel) => self.show_status("thinking…"),
            AgentEvent::State(_) => self.clear_status(),
            AgentEvent::Token { fragment, .. } => {
                self.clear_status();
                if !self.streamed {
                    println!("{}", assistant_tag());
                    self.streamed = true;
                }
                let _ = self.term.write_str(fragment);
                let _ = self.term.flush();
                self.line_open = true;
            }
            AgentEvent::ToolStarted { name, arguments } => {
                self.clear_status();
                self.close_line();
                println!(
                    "  {} {}",
                    style("↳").dim(),
                    style(format!("{name} {arguments}")).dim()
                );
                self.show_status(&format!("waiting for {name}…"));
            }
            AgentEvent::ToolFinished { name, output } => {
                self.clear_status();
                tracing::debug!(tool = *name, chars = output.chars().count(), "tool output shown to model");
            }
        }
    }
}
