//! Example module: follows the writer's counter from another context.
//!
//! Reads `test` from the `sensors` context and republishes the last value
//! it saw locally as `reader.last_seen`.

use nao_core::comm::{ExternalAdapterMap, Getter, LocalAdapter, Setter};
use nao_core::{export_module, DynamicModule, Module, NaoResult};
use std::time::Duration;

pub const SOURCE_CONTEXT: &str = "sensors";
pub const COUNTER_KEY: &str = "test";
pub const LAST_SEEN_KEY: &str = "reader.last_seen";

const PERIOD: Duration = Duration::from_millis(250);

pub struct Reader {
    counter: Getter<i64>,
    last_seen: Setter<i64>,
}

impl Module for Reader {
    fn name(&self) -> &str {
        "Reader"
    }

    fn step(&mut self) {
        // global keys are initialised when provided
        let data = self.counter.get_or(0);
        log::info!("Reader: {} = {}", COUNTER_KEY, data);
        self.last_seen.set(data);
        std::thread::sleep(PERIOD);
    }
}

impl DynamicModule for Reader {
    fn construct(local: &LocalAdapter, external: &mut dyn ExternalAdapterMap) -> NaoResult<Self> {
        let counter = external
            .adapter(SOURCE_CONTEXT)
            .register_global_require(COUNTER_KEY)?;
        let last_seen = local.register_provide(LAST_SEEN_KEY)?;
        Ok(Self { counter, last_seen })
    }
}

export_module!(Reader);

#[cfg(test)]
mod tests {
    use super::*;
    use nao_core::BlackboardMap;

    #[test]
    fn test_reader_follows_global_counter() {
        let mut boards = BlackboardMap::new();
        let counter = boards
            .local(SOURCE_CONTEXT)
            .register_global_provide::<i64>(COUNTER_KEY, 41)
            .unwrap();

        let local = boards.local("logic");
        let mut reader = Reader::construct(&local, &mut boards).unwrap();
        let last_seen = local.register_require::<i64>(LAST_SEEN_KEY).unwrap();

        counter.set(42);
        reader.step();
        assert_eq!(last_seen.get(), Some(42));
    }

    #[test]
    fn test_reader_leaves_request_until_provided() {
        let mut boards = BlackboardMap::new();
        let local = boards.local("logic");
        let _reader = Reader::construct(&local, &mut boards).unwrap();

        assert!(!boards.board(SOURCE_CONTEXT).validate_globals());
    }

    #[test]
    fn test_reader_rejects_local_counter() {
        let mut boards = BlackboardMap::new();
        boards
            .local(SOURCE_CONTEXT)
            .register_provide::<i64>(COUNTER_KEY)
            .unwrap();

        let local = boards.local("logic");
        assert!(Reader::construct(&local, &mut boards).is_err());
    }
}
