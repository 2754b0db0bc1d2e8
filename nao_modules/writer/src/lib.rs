//! Example module: publishes a counter for every context to read.
//!
//! Build with `cargo build -p nao_writer` and load `libnao_writer.so`.

use nao_core::comm::{ExternalAdapterMap, LocalAdapter, Setter};
use nao_core::{export_module, DynamicModule, Module, NaoResult};
use std::time::Duration;

/// Key the counter is published under.
pub const COUNTER_KEY: &str = "test";

const PERIOD: Duration = Duration::from_millis(100);

pub struct Writer {
    counter: Setter<i64>,
    value: i64,
}

impl Module for Writer {
    fn name(&self) -> &str {
        "Writer"
    }

    fn step(&mut self) {
        self.value += 1;
        self.counter.set(self.value);
        log::debug!("Writer: counter is now {}", self.value);
        std::thread::sleep(PERIOD);
    }
}

impl DynamicModule for Writer {
    fn construct(local: &LocalAdapter, _: &mut dyn ExternalAdapterMap) -> NaoResult<Self> {
        let value = 5;
        let counter = local.register_global_provide(COUNTER_KEY, value)?;
        log::info!("Writer: publishing '{}' in '{}'", COUNTER_KEY, local.context());
        Ok(Self { counter, value })
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        log::info!("Writer out after {}", self.value);
    }
}

export_module!(Writer);
