//! Operator-supervised shell task loop.
//!
//! A planning oracle turns a goal into shell command lines. Each line is
//! classified and dispatched in order: directory changes move a logical
//! working directory, file creations are generated by the oracle and then
//! run and repaired until they work, and everything else is executed in a
//! shell. A failed plan is replanned with operator feedback up to a fixed
//! attempt ceiling.
//!
//! - **[`core`]**: Pure, deterministic logic (classification, fence stripping,
//!   path resolution, shared types). No I/O.
//! - **[`io`]**: Side effects (oracle calls, processes, filesystem, config,
//!   operator prompts), each behind a seam that tests can replace.
//!
//! Orchestration modules ([`artifact`], [`validate`], [`plan`], [`session`])
//! combine the two.

pub mod artifact;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod plan;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
