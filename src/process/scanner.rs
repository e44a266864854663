//! PID discovery in the proc filesystem.
//!
//! Thread IDs are not listed in the top-level proc directory, so a plain
//! numeric-directory scan yields exactly the set of processes. The scan is a
//! snapshot: any PID it returns may be gone by the time it is read, which
//! the per-process readers report as a recoverable error.

use std::fs;
use std::path::Path;

/// Scans the proc root for numeric process directories, excluding `skip`
/// (our own PID). Returns PIDs in ascending order for deterministic passes.
pub fn collect_pids(proc_root: &Path, skip: u32) -> Vec<u32> {
    let mut pids = Vec::new();
    if let Ok(entries) = fs::read_dir(proc_root) {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            let Ok(pid) = name.parse::<u32>() else { continue };
            if pid != skip {
                pids.push(pid);
            }
        }
    }
    pids.sort_unstable();
    pids
}
