//! Check command - build a topology and validate it without running

use crate::cli_output;
use nao_core::error::{NaoError, NaoResult};
use nao_core::{Supervisor, TopologyConfig};
use std::path::Path;

/// Run `nao check <topology>`
///
/// Loads every module, so construction-time registration errors surface
/// here as well. Fails with the first context whose requires are unmet.
pub fn check_topology(path: &Path) -> NaoResult<()> {
    let config = TopologyConfig::from_file(path)?;
    let supervisor = Supervisor::from_config(&config)?;
    super::print_contexts(&supervisor);

    let unmet = supervisor.unmet_dependencies();
    for (context, keys) in &unmet {
        cli_output::error(&format!(
            "Dependencies for context '{}' are not met: {}",
            context,
            keys.join(", ")
        ));
    }

    match unmet.into_iter().next() {
        None => {
            cli_output::success(&format!(
                "{} is valid ({} context(s), {} module(s))",
                path.display(),
                config.contexts.len(),
                config.module_count()
            ));
            Ok(())
        }
        Some((context, keys)) => Err(NaoError::UnmetDependencies { context, keys }),
    }
}
