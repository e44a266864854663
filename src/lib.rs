//! psmem - per-program memory usage reporting
//!
//! Reports how much RAM is used per *program*, not per process: all
//! processes resolving to the same program name are summed together, with an
//! accurate split between private memory and the program's portion of shared
//! memory. Shared pages (libraries, copy-on-write forks) would be double
//! counted by a naive RSS sum, so the most accurate accounting method the
//! running kernel supports is selected automatically:
//!
//! - `Pss` from `/proc/<pid>/smaps` where available (summable shares)
//! - raw `Shared*`/`Private*` smaps sums on older 2.6 kernels
//! - the statm shared field as a last resort
//!
//! Processes created with CLONE_VM but without CLONE_THREAD share one real
//! address space while carrying distinct PIDs; they are detected by content
//! fingerprinting of their map listings and counted once. An advisory
//! accuracy level accompanies every report.
//!
//! Memory allocated on a program's behalf by another process (e.g. inside
//! the X server) is not accounted.

pub mod accuracy;
pub mod aggregate;
pub mod cli;
pub mod error;
pub mod kernel;
pub mod process;
pub mod report;

// Re-export main types for convenience
pub use accuracy::{advisory, classify, Accuracy};
pub use aggregate::{Accumulator, ProgramTotals};
pub use error::{ProcError, StartupError};
pub use kernel::{detect, KernelCapability, Tier};
pub use process::{collect_pids, read_sample, resolve_name, MemorySample};
