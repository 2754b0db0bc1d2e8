//! # Core module types
//!
//! - **Module**: the unit of periodic behaviour a wave drives
//! - **DynamicModule**: the constructor contract for modules built as plugins
//!
//! ## Module Lifecycle
//!
//! 1. **Construction** - the module registers its requires/provides through
//!    the adapters it is given and keeps the returned accessors
//! 2. **Hand-over** - the module is moved into exactly one wave
//! 3. **Execution** - `step()` is called once per wave iteration
//! 4. **Drop** - after the owning wave has stopped

pub mod module;

pub use module::{DynamicModule, Module};
