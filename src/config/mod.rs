//! Configuration for Lookout.
//!
//! Settings come from `config.kdl` files at two levels:
//! - System: `~/.config/lookout/config.kdl` (or `$LOOKOUT_CONFIG_DIR/config.kdl`)
//! - Project: `<data-dir>/<project-hash>/config.kdl`
//!
//! Keys:
//! - `persist` - keep `serve` session state in SQLite
//! - `data-dir` - root for per-project data (system level only)
//! - `response-timeout-secs` - give up on blocked interactions (0 = never)
//! - `log-level` - tracing filter when `LOOKOUT_LOG` is unset
//! - `output-format` - "json" or "human"
//!
//! ## Precedence
//!
//! CLI flag > environment > project config > system config > defaults
//!
//! Use the [`resolver`] module for resolution with source tracking.

pub mod resolver;
pub mod schema;

pub use resolver::{
    CONFIG_DIR_ENV, CONFIG_FILE, ConfigOverrides, ConfigSources, DATA_DIR_ENV, LOG_ENV, Resolved,
    Settings, ValueSource, read_config_file, resolve_settings,
};
pub use schema::{LOG_LEVELS, LookoutConfig, OutputFormat};
