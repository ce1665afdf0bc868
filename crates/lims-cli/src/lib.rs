//! Library side of the `lims` command: arguments, configuration, logging
//! setup, command implementations and table rendering.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod render;
