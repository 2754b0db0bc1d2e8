//! NAO Manager Library
//!
//! The commands behind the `nao` binary.

pub mod cli_output;
pub mod commands;
