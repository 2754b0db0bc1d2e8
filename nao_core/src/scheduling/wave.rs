//! Single-threaded module loop.
//!
//! A [`Wave`] owns an ordered list of modules and at most one worker thread.
//! While running, the worker calls every module's `step()` in insertion order,
//! over and over, until the run flag is cleared.

use crate::core::Module;
use crate::error::{NaoError, NaoResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type ModuleList = Vec<Box<dyn Module>>;

/// Lifecycle state of a wave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveState {
    Stopped,
    Running,
}

impl std::fmt::Display for WaveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaveState::Stopped => write!(f, "Stopped"),
            WaveState::Running => write!(f, "Running"),
        }
    }
}

/// Owns a set of modules and the thread that steps them.
///
/// Dropping a wave stops it first, so modules are never dropped while the
/// worker may still be stepping them.
///
/// # Example
///
/// ```rust,no_run
/// use nao_core::{Module, Wave};
///
/// struct Heartbeat;
///
/// impl Module for Heartbeat {
///     fn step(&mut self) {
///         std::thread::sleep(std::time::Duration::from_millis(10));
///     }
/// }
///
/// let mut wave = Wave::new("control");
/// wave.add_module(Box::new(Heartbeat)).unwrap();
/// wave.start().unwrap();
/// // ...
/// wave.stop();
/// ```
pub struct Wave {
    name: String,
    modules: Arc<Mutex<ModuleList>>,
    order: Vec<String>,
    index: HashMap<String, usize>,
    running: Arc<AtomicBool>,
    iterations: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl Wave {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modules: Arc::new(Mutex::new(Vec::new())),
            order: Vec::new(),
            index: HashMap::new(),
            running: Arc::new(AtomicBool::new(false)),
            iterations: Arc::new(AtomicU64::new(0)),
            worker: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WaveState {
        if self.is_running() {
            WaveState::Running
        } else {
            WaveState::Stopped
        }
    }

    /// True while a worker thread is live and has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.worker.is_some() && self.running.load(Ordering::Acquire)
    }

    /// Module names in execution order.
    pub fn module_names(&self) -> &[String] {
        &self.order
    }

    pub fn contains_module(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Completed passes over the module list since the wave was created.
    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Take ownership of `module` and append it to the execution order.
    ///
    /// A running wave is stopped, extended and restarted, so the module is
    /// never silently dropped. Module names must be unique within the wave.
    pub fn add_module(&mut self, module: Box<dyn Module>) -> NaoResult<()> {
        let name = module.name().to_string();
        if self.index.contains_key(&name) {
            return Err(NaoError::already_exists(format!(
                "module '{}' in wave '{}'",
                name, self.name
            )));
        }

        let was_running = self.is_running();
        self.stop();

        self.modules.lock().push(module);
        self.index.insert(name.clone(), self.order.len());
        self.order.push(name);
        log::info!(
            "[{}] added module '{}' ({} total)",
            self.name,
            self.order[self.order.len() - 1],
            self.order.len()
        );

        if was_running {
            self.start()?;
        }
        Ok(())
    }

    /// Spawn the worker thread. No-op if already running.
    pub fn start(&mut self) -> NaoResult<()> {
        if self.is_running() {
            return Ok(());
        }
        // Reap a worker that died on a module panic.
        self.stop();

        self.running.store(true, Ordering::Release);
        let worker = Worker {
            wave: self.name.clone(),
            modules: Arc::clone(&self.modules),
            running: Arc::clone(&self.running),
            iterations: Arc::clone(&self.iterations),
        };

        match thread::Builder::new()
            .name(format!("wave-{}", self.name))
            .spawn(move || worker.run())
        {
            Ok(handle) => {
                self.worker = Some(handle);
                log::info!("[{}] wave started", self.name);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(NaoError::scheduling(format!(
                    "failed to spawn worker for wave '{}': {}",
                    self.name, e
                )))
            }
        }
    }

    /// Clear the run flag and join the worker. No-op if already stopped.
    ///
    /// Blocks until the module currently stepping returns and the worker
    /// observes the flag, i.e. for up to one full pass.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.running.store(false, Ordering::Release);
        log::debug!("[{}] joining wave worker", self.name);
        if worker.join().is_err() {
            log::error!("[{}] wave worker terminated by a module panic", self.name);
        }
        log::info!("[{}] wave stopped", self.name);
    }
}

impl Drop for Wave {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Wave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wave")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("modules", &self.order)
            .finish()
    }
}

struct Worker {
    wave: String,
    modules: Arc<Mutex<ModuleList>>,
    running: Arc<AtomicBool>,
    iterations: Arc<AtomicU64>,
}

impl Worker {
    fn run(self) {
        let _guard = CrashGuard {
            wave: &self.wave,
            running: &self.running,
        };
        let mut modules = self.modules.lock();

        log::debug!("[{}] wave running {} module(s)", self.wave, modules.len());
        while self.running.load(Ordering::Acquire) {
            if modules.is_empty() {
                thread::yield_now();
            }
            for module in modules.iter_mut() {
                module.step();
            }
            self.iterations.fetch_add(1, Ordering::Relaxed);
        }
        log::debug!("[{}] wave quitting", self.wave);
    }
}

/// Clears the run flag when a module panic unwinds the worker.
struct CrashGuard<'a> {
    wave: &'a str,
    running: &'a AtomicBool,
}

impl Drop for CrashGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.running.store(false, Ordering::Release);
            log::error!("[{}] module panicked, wave thread is going down", self.wave);
        }
    }
}
