//! Stable exit codes for shellpilot CLI commands.

/// Session completed, the operator typed `exit`, or a non-session command succeeded.
pub const OK: i32 = 0;
/// Invalid config, missing credential, or any other fatal error.
pub const INVALID: i32 = 1;
/// Every allowed attempt failed.
pub const EXHAUSTED: i32 = 2;
/// The operator declined a plan.
pub const ABORTED: i32 = 3;
