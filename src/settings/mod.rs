//! Layered settings: a TOML file chosen by `--settings`, then
//! `TOKEN_AUTHORITY__*` environment overrides.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
