//! CLI module graph.

pub mod command;
pub mod deploy;
pub mod destroy;
pub mod operator;
pub mod output;
pub mod run;
pub mod status;
