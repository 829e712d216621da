//! Command-line front end for pagewatch.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod output;
