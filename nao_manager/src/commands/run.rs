//! Run command - build a topology and run it until interrupted

use crate::cli_output;
use nao_core::error::NaoResult;
use nao_core::{RunTarget, Supervisor, TopologyConfig};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run `nao run <topology> [--duration-secs N]`
pub fn run_topology(path: &Path, duration: Option<Duration>) -> NaoResult<()> {
    let config = TopologyConfig::from_file(path)?;
    log::debug!("topology {:?}: {} context(s)", path, config.contexts.len());

    let mut supervisor = Supervisor::from_config(&config)?;
    super::print_contexts(&supervisor);
    supervisor.run(RunTarget::All)?;
    cli_output::success(&format!(
        "running {} context(s), press Ctrl+C to stop",
        supervisor.context_names().len()
    ));

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    }) {
        cli_output::warn(&format!("failed to set signal handler: {}", e));
    }

    let started = Instant::now();
    while running.load(Ordering::SeqCst) {
        if duration.is_some_and(|limit| started.elapsed() >= limit) {
            log::info!("run duration elapsed");
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    cli_output::info("stopping");
    supervisor.stop(RunTarget::All)?;
    cli_output::success(&format!(
        "stopped after {:.1}s",
        started.elapsed().as_secs_f64()
    ));
    Ok(())
}
