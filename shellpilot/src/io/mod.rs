//! I/O helpers: processes, the oracle service, the operator, and the filesystem.

pub mod config;
pub mod operator;
pub mod oracle;
pub mod process;
pub mod prompt;
pub mod runner;
pub mod workspace;
