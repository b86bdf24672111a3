//! Process management utilities for the launcher
//!
//! Platform-specific implementations for safe process spawning, lifecycle
//! management, and cleanup. Spawned children are placed in their own process
//! group so the whole tree can be signalled during teardown.

#[cfg(unix)]
pub mod unix;

#[cfg(unix)]
pub use unix::*;
