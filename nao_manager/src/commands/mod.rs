pub mod check;
pub mod console;
pub mod run;

use crate::cli_output;
use nao_core::Supervisor;

/// Print every context with its state and modules.
pub(crate) fn print_contexts(supervisor: &Supervisor) {
    let names = supervisor.context_names();
    if names.is_empty() {
        cli_output::warn("no contexts");
        return;
    }
    for name in names {
        let (Ok(state), Ok(modules)) = (supervisor.state(name), supervisor.module_names(name))
        else {
            continue;
        };
        cli_output::context(name, state, modules);
    }
}
