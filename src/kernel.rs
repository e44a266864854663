//! Kernel capability detection.
//!
//! Determines once, at startup, which memory accounting interface the running
//! kernel exposes. The result drives both the per-process reader (which tier
//! of parsing to use) and the accuracy classifier (how much to trust the
//! totals). Shared memory accounting has changed several times over kernel
//! history:
//!
//! - 2.6.23-rc8-mm1 and later expose `Pss` in `/proc/<pid>/smaps`, which is
//!   summable across processes without double counting.
//! - Earlier 2.6 kernels expose smaps without `Pss`.
//! - 2.6.1 through 2.6.9 report the total file-backed extent in the statm
//!   shared field, which is useless for our purposes.
//! - Everything else falls back to the statm shared-pages field.

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::StartupError;

/// Candidate roots for the process information filesystem. The second entry
/// is the linprocfs mount point used by the BSD Linux compatibility layer.
const PROC_ROOTS: [&str; 2] = ["/proc", "/compat/linux/proc"];

/// System page size in KiB, as used by statm-based tiers.
pub static PAGE_KIB: Lazy<u64> =
    Lazy::new(|| unsafe { libc::sysconf(libc::_SC_PAGESIZE) as u64 / 1024 });

/// Memory accounting tier available on this kernel, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// smaps with Pss fields: private/shared both accurate and summable.
    Pss,
    /// smaps without Pss: accurate per process, not summable across them.
    SmapsNoPss,
    /// Kernel in [2.6.1, 2.6.9]: the statm shared field is known bad, so
    /// everything is counted as private.
    LegacyStatm,
    /// No smaps at all: shared taken from the statm shared-pages field.
    NoSmaps,
}

/// Process-wide capability snapshot, computed once at startup.
#[derive(Debug, Clone)]
pub struct KernelCapability {
    pub version: (u32, u32, u32),
    pub tier: Tier,
    pub proc_root: PathBuf,
    pub page_kib: u64,
}

impl KernelCapability {
    /// Path of a per-process file, e.g. `proc_path(42, "smaps")`.
    pub fn proc_path(&self, pid: u32, file: &str) -> PathBuf {
        self.proc_root.join(pid.to_string()).join(file)
    }

    /// Whether the PSS strategy is active for this pass.
    pub fn has_pss(&self) -> bool {
        self.tier == Tier::Pss
    }
}

/// Parses a kernel release string into a version triple.
///
/// Takes at most three dot-separated components; the third is truncated at
/// the first `-` or `_` (pre-release and distro suffixes) and defaults to 0
/// when absent, so `"3.10"` parses as `(3, 10, 0)`.
pub fn parse_kernel_release(release: &str) -> Option<(u32, u32, u32)> {
    let mut parts = release.trim().splitn(3, '.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = match parts.next() {
        Some(raw) => {
            let bare = raw.split(|c| c == '-' || c == '_').next().unwrap_or("0");
            bare.parse().ok()?
        }
        None => 0,
    };
    Some((major, minor, patch))
}

/// Whether the statm shared field is the known-bad total file-backed extent.
pub fn statm_shared_is_bogus(version: (u32, u32, u32)) -> bool {
    (2, 6, 1) <= version && version <= (2, 6, 9)
}

/// Selects the accounting tier from the version triple and a probe of our own
/// smaps file. `self_smaps` is `None` when the file does not exist, otherwise
/// carries whether a Pss field was seen.
pub fn select_tier(version: (u32, u32, u32), self_smaps: Option<bool>) -> Tier {
    match self_smaps {
        Some(true) => Tier::Pss,
        Some(false) => {
            // Kernels past 2.x always ship Pss when smaps exists, so a probe
            // that misses it (e.g. an empty smaps for this process) is still
            // treated as PSS capable.
            if version.0 > 2 {
                Tier::Pss
            } else {
                Tier::SmapsNoPss
            }
        }
        None if statm_shared_is_bogus(version) => Tier::LegacyStatm,
        None => Tier::NoSmaps,
    }
}

/// Probes a smaps file: `None` if absent, otherwise whether it has Pss lines.
pub fn probe_smaps(path: &Path) -> Option<bool> {
    let content = fs::read_to_string(path).ok()?;
    Some(content.lines().any(|l| l.starts_with("Pss:")))
}

/// Detects the process information filesystem and accounting capability.
///
/// Fails with [`StartupError::UnsupportedSystem`] when no known procfs root
/// is mounted. `root_override` bypasses the mount-point search (used by
/// tests and by the `--proc-root` flag).
pub fn detect(root_override: Option<&Path>) -> Result<KernelCapability, StartupError> {
    let proc_root = match root_override {
        Some(p) if p.join("self").exists() => p.to_path_buf(),
        Some(_) => return Err(StartupError::UnsupportedSystem),
        None => PROC_ROOTS
            .iter()
            .map(|p| PathBuf::from(*p))
            .find(|p| p.join("self").exists())
            .ok_or(StartupError::UnsupportedSystem)?,
    };

    let release_path = proc_root.join("sys/kernel/osrelease");
    let release = fs::read_to_string(&release_path)
        .map_err(|e| StartupError::UnknownKernel(format!("{}: {}", release_path.display(), e)))?;
    let version = parse_kernel_release(&release)
        .ok_or_else(|| StartupError::UnknownKernel(release.trim().to_string()))?;

    let self_smaps = probe_smaps(&proc_root.join("self/smaps"));
    let tier = select_tier(version, self_smaps);
    debug!(?version, ?tier, root = %proc_root.display(), "detected kernel capability");

    Ok(KernelCapability {
        version,
        tier,
        proc_root,
        page_kib: *PAGE_KIB,
    })
}
