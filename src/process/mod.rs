//! Per-process readers for memory statistics and program names.
//!
//! This module provides:
//! - `memory`: tiered private/shared extraction from /proc/<pid>/smaps and statm
//! - `name`: canonical program name resolution through the exe symlink
//! - `scanner`: PID discovery in the proc filesystem

pub mod memory;
pub mod name;
pub mod scanner;

pub use memory::{read_sample, MemorySample};
pub use name::resolve_name;
pub use scanner::collect_pids;
