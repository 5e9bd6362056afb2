//! CLI command handlers, one per file.

mod completions;
mod config;
mod man;
mod sign;

pub use completions::run_completions;
pub use config::run_config;
pub use man::run_man;
pub use sign::{run_sign, SignArgs};

#[cfg(test)]
pub(crate) use sign::effective_config;
