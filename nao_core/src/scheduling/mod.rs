//! # NAO Scheduling
//!
//! - **Wave**: one worker thread stepping an ordered list of modules in a
//!   tight loop
//!
//! Waves run fully in parallel with each other. Within a wave, modules run in
//! the order they were added, once per pass. There is no throttling: a module
//! that needs a fixed rate sleeps inside its own `step()`.

pub mod wave;

pub use wave::{Wave, WaveState};
