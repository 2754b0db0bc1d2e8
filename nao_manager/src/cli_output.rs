//! Terminal output of the `nao` front end.
//!
//! Status lines start with a short coloured tag. Context listings, help
//! rows and the console prompt are rendered here so `console`, `run` and
//! `check` print them identically.

use colored::*;
use nao_core::WaveState;
use std::io::{self, Write};

/// Tag in front of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Done,
    Failed,
    Notice,
    Action,
}

impl Status {
    fn tag(self) -> ColoredString {
        match self {
            Status::Done => "[ok]".green(),
            Status::Failed => "[error]".red().bold(),
            Status::Notice => "[warn]".yellow(),
            Status::Action => "[nao]".cyan(),
        }
    }
}

fn status_line(kind: Status, msg: &str) -> String {
    format!("{} {}", kind.tag(), msg)
}

/// Print a status line; failures go to stderr.
pub fn status(kind: Status, msg: &str) {
    match kind {
        Status::Failed => eprintln!("{}", status_line(kind, msg)),
        _ => println!("{}", status_line(kind, msg)),
    }
}

pub fn success(msg: &str) {
    status(Status::Done, msg);
}

pub fn error(msg: &str) {
    status(Status::Failed, msg);
}

pub fn warn(msg: &str) {
    status(Status::Notice, msg);
}

pub fn info(msg: &str) {
    status(Status::Action, msg);
}

fn context_line(name: &str, state: WaveState) -> String {
    let state = match state {
        WaveState::Running => state.to_string().green().bold(),
        WaveState::Stopped => state.to_string().dimmed(),
    };
    format!("{} {}", format!("{:<16}", name).bold(), state)
}

fn module_line(position: usize, module: &str) -> String {
    format!("  {:>2}. {}", position + 1, module)
}

/// A context and its wave state, followed by its modules in step order.
pub fn context(name: &str, state: WaveState, modules: &[String]) {
    println!("{}", context_line(name, state));
    if modules.is_empty() {
        println!("      {}", "no modules".dimmed());
    }
    for (position, module) in modules.iter().enumerate() {
        println!("{}", module_line(position, module));
    }
}

/// One console command and what it does.
pub fn help_row(usage: &str, description: &str) {
    println!("  {:<24} {}", usage, description.dimmed());
}

pub fn prompt() -> io::Result<()> {
    print!("{} ", "nao>".green().bold());
    io::stdout().flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_status_tags() {
        plain();
        assert_eq!(status_line(Status::Done, "created 'W1'"), "[ok] created 'W1'");
        assert_eq!(status_line(Status::Failed, "boom"), "[error] boom");
        assert_eq!(status_line(Status::Notice, "late"), "[warn] late");
    }

    #[test]
    fn test_context_and_module_lines() {
        plain();
        assert_eq!(
            context_line("sensors", WaveState::Running),
            "sensors          Running"
        );
        assert_eq!(module_line(0, "DynamicWriter"), "   1. DynamicWriter");
    }
}
