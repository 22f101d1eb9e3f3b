//! # Command-Line Interface
//!
//! User-facing `hwt` commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project and node management | `init`, `new`, `check`, `depend` |
//! | Query | Dependency analysis | `ready`, `blocked`, `critical-path` |
//! | Exchange | Portable formats | `export json`, `export bom`, `import markdown` |
//!
//! ## Output Formats
//!
//! All commands support the `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Logging
//!
//! Logs go to stderr. The filter comes from `HWTRACK_LOG` (e.g.
//! `HWTRACK_LOG=debug`); `--verbose` forces debug level.
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod exchange;
mod node;
mod output;
mod query;

pub use app::{run, Cli, Commands, LOG_ENV};
pub use output::Output;
