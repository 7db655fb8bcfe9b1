//! CLI module for trove
//!
//! `produce` and `consume` run the two scheduled flows from the config files.
//! `scan` and `compare` work on local paths only and need no config.

pub mod error;
pub mod output;

pub mod context;

pub mod compare;
pub mod consume;
pub mod export;
pub mod produce;
pub mod remote;
pub mod scan;

pub use context::CliContext;
