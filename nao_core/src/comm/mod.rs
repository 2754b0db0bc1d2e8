//! # NAO Communication Layer
//!
//! Typed, latest-value data exchange between modules:
//!
//! - [`TypedSlot`]: one key's storage cell (type tag, value, reader/writer lock)
//! - [`Blackboard`]: the per-context key table with require/provide checking
//! - [`LocalAdapter`] / [`ExternalAdapter`]: in-context and cross-context views
//! - [`Getter`] / [`Setter`]: accessors returned by registration
//!
//! ## Usage
//!
//! ```rust
//! use nao_core::comm::BlackboardMap;
//!
//! let mut boards = BlackboardMap::new();
//! let local = boards.local("sensors");
//! let temperature = local.register_global_provide::<f64>("temp", 36.6).unwrap();
//!
//! use nao_core::comm::ExternalAdapterMap;
//! let remote = boards.adapter("sensors");
//! let reading = remote.register_global_require::<f64>("temp").unwrap();
//!
//! temperature.set(37.2);
//! assert_eq!(reading.get(), Some(37.2));
//! ```

pub mod adapter;
pub mod blackboard;
pub mod slot;

pub use adapter::{BlackboardMap, ExternalAdapter, ExternalAdapterMap, LocalAdapter};
pub use blackboard::{Blackboard, RegistrationState};
pub use slot::{Getter, Setter, TypeTag, TypedSlot};
