//! # NAO Core
//!
//! The runtime substrate for independently developed NAO modules.
//!
//! - **Communication**: typed, latest-value blackboards with require/provide
//!   checking at registration time
//! - **Modules**: units of periodic behaviour with a single `step()`
//! - **Scheduling**: waves, one thread each, stepping modules in order
//! - **Plugins**: modules loaded from separately compiled units
//! - **Supervisor**: named contexts, each a blackboard plus a wave
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nao_core::comm::{Getter, Setter};
//! use nao_core::{Module, RunTarget, Supervisor};
//!
//! struct Counter {
//!     ticks: Setter<u64>,
//!     n: u64,
//! }
//!
//! impl Module for Counter {
//!     fn step(&mut self) {
//!         self.n += 1;
//!         self.ticks.set(self.n);
//!         std::thread::sleep(std::time::Duration::from_millis(10));
//!     }
//! }
//!
//! struct Printer {
//!     ticks: Getter<u64>,
//! }
//!
//! impl Module for Printer {
//!     fn step(&mut self) {
//!         println!("ticks = {}", self.ticks.get_or(0));
//!         std::thread::sleep(std::time::Duration::from_millis(100));
//!     }
//! }
//!
//! let mut supervisor = Supervisor::new();
//! supervisor.create_context("sensors");
//! supervisor.create_context("logic");
//! supervisor.add_module_with("sensors", |local, _| {
//!     Ok(Counter { ticks: local.register_global_provide("ticks", 0u64)?, n: 0 })
//! })?;
//! supervisor.add_module_with("logic", |_, external| {
//!     Ok(Printer { ticks: external.adapter("sensors").register_global_require("ticks")? })
//! })?;
//! supervisor.run(RunTarget::All)?;
//! # Ok::<(), nao_core::NaoError>(())
//! ```

pub mod comm;
pub mod config;
pub mod core;
pub mod error;
pub mod plugin;
pub mod scheduling;
pub mod supervisor;

// Re-export commonly used types for easy access
pub use comm::{
    Blackboard, BlackboardMap, ExternalAdapter, ExternalAdapterMap, Getter, LocalAdapter,
    RegistrationState, Setter,
};
pub use config::{ContextConfig, TopologyConfig};
pub use crate::core::{DynamicModule, Module};
pub use error::{LoadError, NaoError, NaoResult, RegistrationError};
pub use plugin::{PluginHandle, PluginLoader};
pub use scheduling::{Wave, WaveState};
pub use supervisor::{CreateOutcome, RunTarget, Supervisor};
