//! Deterministic, pure logic shared by the execution core.
//!
//! Core modules must be free of I/O side effects. They operate on plan text and
//! in-memory state and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod fence;
pub mod interpreter;
pub mod path;
pub mod types;
