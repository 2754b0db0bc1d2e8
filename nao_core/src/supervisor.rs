//! Named contexts and the operations a front end drives.
//!
//! A context pairs a [`Blackboard`] with the [`Wave`] that runs the modules
//! registered against it. The [`Supervisor`] creates contexts, loads modules
//! into them and starts or stops their waves. It refuses to start anything
//! while a context still has requires that no global provider satisfies.

use crate::comm::{Blackboard, ExternalAdapter, ExternalAdapterMap, LocalAdapter};
use crate::config::TopologyConfig;
use crate::core::Module;
use crate::error::{NaoError, NaoResult};
use crate::plugin::PluginLoader;
use crate::scheduling::{Wave, WaveState};
use std::path::Path;
use std::sync::Arc;

/// Result of [`Supervisor::create_context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// A context with that name already existed and was left untouched.
    Exists,
}

/// Which contexts a run/stop applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunTarget {
    All,
    Context(String),
}

impl RunTarget {
    pub fn context(name: impl Into<String>) -> Self {
        RunTarget::Context(name.into())
    }
}

impl std::fmt::Display for RunTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunTarget::All => write!(f, "all contexts"),
            RunTarget::Context(name) => write!(f, "context '{}'", name),
        }
    }
}

struct Context {
    blackboard: Arc<Blackboard>,
    wave: Wave,
}

impl Context {
    fn new(name: &str) -> Self {
        Self {
            blackboard: Arc::new(Blackboard::new(name)),
            wave: Wave::new(name),
        }
    }

    fn name(&self) -> &str {
        self.wave.name()
    }
}

/// Index of the context called `name`, creating it if needed.
fn ensure_context(contexts: &mut Vec<Context>, name: &str) -> (usize, CreateOutcome) {
    match contexts.iter().position(|c| c.name() == name) {
        Some(index) => (index, CreateOutcome::Exists),
        None => {
            contexts.push(Context::new(name));
            (contexts.len() - 1, CreateOutcome::Created)
        }
    }
}

/// External adapters over the supervisor's contexts.
///
/// Referencing an unknown context creates it, so a module may be loaded
/// before the context it reads from.
struct ContextMap<'a> {
    contexts: &'a mut Vec<Context>,
}

impl ExternalAdapterMap for ContextMap<'_> {
    fn adapter(&mut self, context: &str) -> ExternalAdapter {
        let (index, outcome) = ensure_context(self.contexts, context);
        if outcome == CreateOutcome::Created {
            log::info!("context '{}' was referenced and thus created", context);
        }
        ExternalAdapter::new(Arc::clone(&self.contexts[index].blackboard))
    }
}

/// Owns every context by name, in creation order.
///
/// Dropping the supervisor stops every wave before any context is dropped.
pub struct Supervisor {
    contexts: Vec<Context>,
    // Declared after `contexts`: loaded units stay mapped until every
    // blackboard and module has been dropped.
    loader: PluginLoader,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::with_loader(PluginLoader::new())
    }

    pub fn with_loader(loader: PluginLoader) -> Self {
        Self {
            contexts: Vec::new(),
            loader,
        }
    }

    /// Build a supervisor from a topology: search paths first, then
    /// contexts and their modules in declaration order.
    pub fn from_config(config: &TopologyConfig) -> NaoResult<Self> {
        let mut supervisor = Self::new();
        supervisor.load_topology(config)?;
        Ok(supervisor)
    }

    /// Apply `config` on top of the current contexts.
    pub fn load_topology(&mut self, config: &TopologyConfig) -> NaoResult<()> {
        config.validate()?;
        for path in &config.search_paths {
            self.loader.add_search_path(path);
        }
        for context in &config.contexts {
            self.create_context(&context.name);
            for module in &context.modules {
                self.load_module(&context.name, module)?;
            }
        }
        log::info!(
            "topology{} applied: {} context(s), {} module(s)",
            config
                .name
                .as_deref()
                .map(|n| format!(" '{}'", n))
                .unwrap_or_default(),
            config.contexts.len(),
            config.module_count()
        );
        Ok(())
    }

    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut PluginLoader {
        &mut self.loader
    }

    pub fn create_context(&mut self, name: &str) -> CreateOutcome {
        let (_, outcome) = ensure_context(&mut self.contexts, name);
        match outcome {
            CreateOutcome::Created => log::info!("context '{}' created", name),
            CreateOutcome::Exists => log::debug!("context '{}' already exists", name),
        }
        outcome
    }

    pub fn has_context(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Context names in creation order.
    pub fn context_names(&self) -> Vec<&str> {
        self.contexts.iter().map(Context::name).collect()
    }

    /// Module names of `context` in execution order.
    pub fn module_names(&self, context: &str) -> NaoResult<&[String]> {
        Ok(self.context(context)?.wave.module_names())
    }

    pub fn state(&self, context: &str) -> NaoResult<WaveState> {
        Ok(self.context(context)?.wave.state())
    }

    /// Shared handle to the blackboard of `context`.
    ///
    /// Values written by loaded modules need their unit mapped to be dropped,
    /// so neither the board nor accessors taken from it may outlive the
    /// supervisor.
    pub fn blackboard(&self, context: &str) -> NaoResult<Arc<Blackboard>> {
        Ok(Arc::clone(&self.context(context)?.blackboard))
    }

    /// Load the module unit at `path` into `context`.
    ///
    /// Returns the module's display name.
    pub fn load_module(&mut self, context: &str, path: impl AsRef<Path>) -> NaoResult<String> {
        let local = self.local_adapter(context)?;
        let handle = {
            let mut external = ContextMap {
                contexts: &mut self.contexts,
            };
            self.loader.load(path, &local, &mut external)?
        };
        let name = handle.name().to_string();
        self.add_module(context, Box::new(handle))?;
        Ok(name)
    }

    /// Construct a module in-process and add it to `context`.
    ///
    /// `factory` receives the same adapters a loaded unit would.
    pub fn add_module_with<M, F>(&mut self, context: &str, factory: F) -> NaoResult<String>
    where
        M: Module + 'static,
        F: FnOnce(&LocalAdapter, &mut dyn ExternalAdapterMap) -> NaoResult<M>,
    {
        let local = self.local_adapter(context)?;
        let module = {
            let mut external = ContextMap {
                contexts: &mut self.contexts,
            };
            factory(&local, &mut external)?
        };
        let name = module.name().to_string();
        self.add_module(context, Box::new(module))?;
        Ok(name)
    }

    /// Start the targeted waves.
    ///
    /// Every targeted context is validated first; if any still has an
    /// unsatisfied require, nothing is started.
    pub fn run(&mut self, target: RunTarget) -> NaoResult<()> {
        let targets = self.targets(&target)?;

        for &index in &targets {
            let board = &self.contexts[index].blackboard;
            if !board.validate_globals() {
                let keys = board.unresolved_requests();
                log::error!(
                    "Dependencies for context '{}' are not met: {}",
                    board.name(),
                    keys.join(", ")
                );
                return Err(NaoError::UnmetDependencies {
                    context: board.name().to_string(),
                    keys,
                });
            }
        }

        let mut started: Vec<usize> = Vec::with_capacity(targets.len());
        for &index in &targets {
            let wave = &mut self.contexts[index].wave;
            if wave.is_running() {
                continue;
            }
            if let Err(e) = wave.start() {
                for &index in &started {
                    self.contexts[index].wave.stop();
                }
                return Err(e);
            }
            started.push(index);
        }
        log::info!("running {}", target);
        Ok(())
    }

    /// Stop the targeted waves, joining their threads.
    pub fn stop(&mut self, target: RunTarget) -> NaoResult<()> {
        for index in self.targets(&target)? {
            self.contexts[index].wave.stop();
        }
        Ok(())
    }

    /// Contexts with requires nobody globally provides, with those keys.
    pub fn unmet_dependencies(&self) -> Vec<(String, Vec<String>)> {
        self.contexts
            .iter()
            .filter_map(|c| {
                let keys = c.blackboard.unresolved_requests();
                (!keys.is_empty()).then(|| (c.name().to_string(), keys))
            })
            .collect()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.contexts.iter().position(|c| c.name() == name)
    }

    fn context(&self, name: &str) -> NaoResult<&Context> {
        self.index_of(name)
            .map(|i| &self.contexts[i])
            .ok_or_else(|| NaoError::not_found(format!("context '{}'", name)))
    }

    fn local_adapter(&self, context: &str) -> NaoResult<LocalAdapter> {
        Ok(LocalAdapter::new(Arc::clone(
            &self.context(context)?.blackboard,
        )))
    }

    fn add_module(&mut self, context: &str, module: Box<dyn Module>) -> NaoResult<()> {
        let index = self
            .index_of(context)
            .ok_or_else(|| NaoError::not_found(format!("context '{}'", context)))?;
        self.contexts[index].wave.add_module(module)
    }

    fn targets(&self, target: &RunTarget) -> NaoResult<Vec<usize>> {
        match target {
            RunTarget::All => Ok((0..self.contexts.len()).collect()),
            RunTarget::Context(name) => self
                .index_of(name)
                .map(|i| vec![i])
                .ok_or_else(|| NaoError::not_found(format!("context '{}'", name))),
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        for context in &mut self.contexts {
            context.wave.stop();
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("contexts", &self.context_names())
            .field("loader", &self.loader)
            .finish()
    }
}
