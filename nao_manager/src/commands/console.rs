//! Console command - line-oriented control of a live supervisor
//!
//! ```text
//! nao> create sensors
//! nao> add sensors libnao_writer.so
//! nao> run
//! nao> list
//! nao> quit
//! ```

use crate::cli_output;
use nao_core::error::{NaoError, NaoResult};
use nao_core::{CreateOutcome, RunTarget, Supervisor};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

const HELP: &[(&str, &str)] = &[
    ("create <context>", "create a context (blackboard + wave)"),
    ("add <context> <unit>", "load a module unit into a context"),
    ("run [context]", "validate and start one or all contexts"),
    ("stop [context]", "stop one or all contexts"),
    ("list", "show contexts, their state and modules"),
    ("help", "show this help"),
    ("quit | exit", "stop everything and leave"),
];

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create(String),
    Add { context: String, unit: PathBuf },
    Run(RunTarget),
    Stop(RunTarget),
    List,
    Help,
    Quit,
}

impl Command {
    /// Parse a console line. Blank lines and `#` comments yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let words: Vec<&str> = line.split_whitespace().collect();
        let target = |args: &[&str]| match args {
            [] => Ok(RunTarget::All),
            [context] => Ok(RunTarget::context(*context)),
            _ => Err(format!("'{}' takes at most one context", words[0])),
        };

        let command = match (words[0], &words[1..]) {
            ("create", [context]) => Command::Create(context.to_string()),
            ("create", _) => return Err("usage: create <context>".into()),
            ("add", [context, unit]) => Command::Add {
                context: context.to_string(),
                unit: PathBuf::from(*unit),
            },
            ("add", _) => return Err("usage: add <context> <unit>".into()),
            ("run", args) => Command::Run(target(args)?),
            ("stop", args) => Command::Stop(target(args)?),
            ("list", []) => Command::List,
            ("help", _) => Command::Help,
            ("quit" | "exit", []) => Command::Quit,
            (other, _) => return Err(format!("unknown command '{}', try 'help'", other)),
        };
        Ok(Some(command))
    }
}

/// Whether the console keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Console {
    supervisor: Supervisor,
}

impl Console {
    pub fn new(supervisor: Supervisor) -> Self {
        Self { supervisor }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn execute(&mut self, command: Command) -> NaoResult<Flow> {
        match command {
            Command::Create(name) => match self.supervisor.create_context(&name) {
                CreateOutcome::Created => cli_output::success(&format!("created '{}'", name)),
                CreateOutcome::Exists => {
                    cli_output::warn(&format!("context '{}' already exists", name))
                }
            },
            Command::Add { context, unit } => {
                let module = self.supervisor.load_module(&context, &unit)?;
                cli_output::success(&format!("added {} to '{}'", module, context));
            }
            Command::Run(target) => {
                self.supervisor.run(target.clone())?;
                cli_output::success(&format!("running {}", target));
            }
            Command::Stop(target) => {
                self.supervisor.stop(target.clone())?;
                cli_output::success(&format!("stopped {}", target));
            }
            Command::List => super::print_contexts(&self.supervisor),
            Command::Help => print_help(),
            Command::Quit => {
                self.supervisor.stop(RunTarget::All)?;
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    /// Parse and execute one line, reporting failures without aborting.
    pub fn execute_line(&mut self, line: &str) -> Flow {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Flow::Continue,
            Err(e) => {
                cli_output::error(&e);
                return Flow::Continue;
            }
        };
        match self.execute(command) {
            Ok(flow) => flow,
            Err(e) => {
                cli_output::error(&e.to_string());
                Flow::Continue
            }
        }
    }

    /// Execute every line of the script at `path`.
    pub fn execute_file(&mut self, path: &Path) -> NaoResult<Flow> {
        let file = std::fs::File::open(path)
            .map_err(|e| NaoError::config(format!("{}: {}", path.display(), e)))?;
        log::debug!("executing console script {:?}", path);
        self.execute_lines(io::BufReader::new(file), false)
    }

    /// Read commands from stdin until `quit` or end of input.
    pub fn interact(&mut self) -> NaoResult<Flow> {
        let stdin = io::stdin();
        self.execute_lines(stdin.lock(), true)
    }

    fn execute_lines(&mut self, reader: impl BufRead, prompt: bool) -> NaoResult<Flow> {
        let mut lines = reader.lines();
        loop {
            if prompt {
                cli_output::prompt()?;
            }
            let Some(line) = lines.next() else {
                return Ok(Flow::Continue);
            };
            if self.execute_line(&line?) == Flow::Quit {
                return Ok(Flow::Quit);
            }
        }
    }
}

fn print_help() {
    for (usage, description) in HELP {
        cli_output::help_row(usage, description);
    }
}

/// Run `nao console [SCRIPT]`
pub fn run_console(script: Option<PathBuf>, search_paths: Vec<PathBuf>) -> NaoResult<()> {
    let mut supervisor = Supervisor::new();
    for path in search_paths {
        supervisor.loader_mut().add_search_path(path);
    }
    let mut console = Console::new(supervisor);

    if let Some(script) = script {
        if console.execute_file(&script)? == Flow::Quit {
            return Ok(());
        }
    }

    cli_output::info("NAO console, type 'help' for commands");
    console.interact()?;
    console.execute(Command::Quit)?;
    Ok(())
}
