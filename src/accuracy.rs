//! Accuracy classification for reported totals.
//!
//! Advisory trust level derived from the kernel version and an independent
//! probe of our own smaps file. This is surfaced to the user separately from
//! the numeric aggregation; it never changes the numbers, only how much they
//! should be believed.

use std::fs;

use crate::kernel::{probe_smaps, statm_shared_is_bogus, KernelCapability};

/// Trust level for per-program totals, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accuracy {
    /// Shared memory accurate and summable; the grand total is meaningful.
    Full,
    /// Accurate per program in isolation, but shared values overlap across
    /// programs, so no grand total.
    IsolatedOnly,
    /// Some shared memory is not reported; values may be too large.
    Imprecise,
    /// No shared memory reported at all; values will be too large.
    Unreported,
}

/// Pure classification from version and probe results. `self_smaps` is
/// `None` when the file is absent, otherwise whether it contains Pss.
pub fn classify_probed(
    version: (u32, u32, u32),
    self_smaps: Option<bool>,
    meminfo_has_inactive: bool,
) -> Accuracy {
    match (version.0, version.1) {
        (2, 4) => {
            if meminfo_has_inactive {
                Accuracy::IsolatedOnly
            } else {
                Accuracy::Imprecise
            }
        }
        (2, 6) => match self_smaps {
            Some(true) => Accuracy::Full,
            Some(false) => Accuracy::IsolatedOnly,
            None if statm_shared_is_bogus(version) => Accuracy::Unreported,
            None => Accuracy::Imprecise,
        },
        (major, _) if major > 2 => Accuracy::Full,
        _ => Accuracy::IsolatedOnly,
    }
}

/// Classifies the running system. Re-probes our own smaps independently of
/// the tier the reader used for the pass.
pub fn classify(cap: &KernelCapability) -> Accuracy {
    let self_smaps = probe_smaps(&cap.proc_root.join("self/smaps"));
    let meminfo_has_inactive = fs::read_to_string(cap.proc_root.join("meminfo"))
        .map(|m| m.contains("Inact_"))
        .unwrap_or(false);
    classify_probed(cap.version, self_smaps, meminfo_has_inactive)
}

/// Advisory warning for the user, or `None` when totals are trustworthy.
pub fn advisory(accuracy: Accuracy) -> Option<&'static str> {
    match accuracy {
        Accuracy::Full => None,
        Accuracy::IsolatedOnly => Some(
            "Warning: Shared memory is slightly over-estimated by this system\n\
             for each program, so totals are not reported.",
        ),
        Accuracy::Imprecise => Some(
            "Warning: Shared memory is not reported accurately by this system.\n\
             Values reported could be too large, and totals are not reported.",
        ),
        Accuracy::Unreported => Some(
            "Warning: Shared memory is not reported by this system.\n\
             Values reported will be too large, and totals are not reported.",
        ),
    }
}
