//! Process-wide tracing setup. Starts at `info` (or `RUST_LOG`) and switches
//! to the configured filter once settings are loaded.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
