//! Tiered per-process memory extraction.
//!
//! Reads (private KiB, shared KiB, address-space fingerprint) for one PID
//! using the best interface the kernel offers. Under the PSS tier the shared
//! value is derived as `sum(Pss) - sum(Private*)`, which makes per-program
//! shared totals summable without double counting. The fingerprint is a hash
//! of the full raw smaps text and identifies processes created with CLONE_VM
//! but without CLONE_THREAD: separate PIDs mapping one real address space.

use std::fs;
use std::hash::Hasher;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::ProcError;
use crate::kernel::{KernelCapability, Tier};

/// Average per-line truncation bias of kernel-reported Pss values.
const PSS_ADJUST_KIB: f64 = 0.5;

/// Per-process result of one scan pass. Immutable once computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    /// Memory not shared with any other process, KiB.
    pub private_kib: u64,
    /// Memory shared with other processes, KiB. Under the PSS tier this is
    /// the process's proportional share; otherwise a per-process estimate
    /// that must not be summed across processes.
    pub shared_kib: u64,
    /// Hash of the full smaps text (PSS tier), or the PID itself where no
    /// meaningful content fingerprint exists.
    pub fingerprint: u64,
}

/// Fields of interest from /proc/<pid>/statm, in pages.
#[derive(Debug, Clone, Copy)]
struct Statm {
    resident_pages: u64,
    shared_pages: u64,
}

fn read_statm(path: &Path) -> Result<Statm, ProcError> {
    let content = fs::read_to_string(path)?;
    let mut fields = content.split_whitespace().skip(1);
    let parse = |f: Option<&str>| -> Result<u64, ProcError> {
        f.and_then(|v| v.parse().ok())
            .ok_or_else(|| ProcError::Malformed(format!("unparsable statm: {}", content.trim())))
    };
    Ok(Statm {
        resident_pages: parse(fields.next())?,
        shared_pages: parse(fields.next())?,
    })
}

/// Accumulated totals from one pass over a smaps file.
#[derive(Debug)]
struct SmapsScan {
    shared_kib: u64,
    private_kib: u64,
    pss_kib: u64,
    pss_lines: u64,
    saw_pss: bool,
    fingerprint: u64,
}

/// Single pass over /proc/<pid>/smaps.
///
/// Lines are classified by exact field-name prefix into Shared*/Private*/Pss
/// buckets; everything else (map headers, the many other fields) is ignored
/// for accounting but still feeds the content fingerprint, so the hash covers
/// the full unparsed map listing.
fn scan_smaps(path: &Path) -> Result<SmapsScan, ProcError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut scan = SmapsScan {
        shared_kib: 0,
        private_kib: 0,
        pss_kib: 0,
        pss_lines: 0,
        saw_pss: false,
        fingerprint: 0,
    };
    let mut hasher = ahash::AHasher::default();

    for line in reader.lines() {
        let line = line?;
        hasher.write(line.as_bytes());
        hasher.write_u8(b'\n');

        if line.starts_with("Shared") {
            scan.shared_kib += field_kib(&line)?;
        } else if line.starts_with("Private") {
            scan.private_kib += field_kib(&line)?;
        } else if line.starts_with("Pss") {
            scan.saw_pss = true;
            scan.pss_kib += field_kib(&line)?;
            scan.pss_lines += 1;
        }
    }

    scan.fingerprint = hasher.finish();
    Ok(scan)
}

/// Parses the KiB value of a matched smaps line, e.g. `"Pss:    12 kB"`.
fn field_kib(line: &str) -> Result<u64, ProcError> {
    line.split_whitespace()
        .nth(1)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| ProcError::Malformed(format!("unparsable smaps line: {}", line)))
}

/// Extracts a [`MemorySample`] for one PID using the capability's tier.
///
/// Fails with [`ProcError::Gone`] when any underlying file disappears
/// mid-read; callers skip the PID rather than aborting the pass.
pub fn read_sample(cap: &KernelCapability, pid: u32) -> Result<MemorySample, ProcError> {
    // statm is read for every tier; shared in smaps is a subset of this Rss
    // while text segments are not necessarily resident.
    let statm = read_statm(&cap.proc_path(pid, "statm"))?;

    match cap.tier {
        Tier::Pss | Tier::SmapsNoPss => {
            let scan = scan_smaps(&cap.proc_path(pid, "smaps"))?;
            if cap.tier == Tier::Pss && scan.saw_pss {
                let pss_total = scan.pss_kib as f64 + PSS_ADJUST_KIB * scan.pss_lines as f64;
                let shared = (pss_total - scan.private_kib as f64).max(0.0).round() as u64;
                Ok(MemorySample {
                    private_kib: scan.private_kib,
                    shared_kib: shared,
                    fingerprint: scan.fingerprint,
                })
            } else {
                // Without Pss the shared estimate is not summable and the
                // fingerprint carries no dedup value: use the PID.
                Ok(MemorySample {
                    private_kib: scan.private_kib,
                    shared_kib: scan.shared_kib,
                    fingerprint: pid as u64,
                })
            }
        }
        Tier::LegacyStatm => {
            // The statm shared field on these kernels is the file-backed
            // extent, not shared memory. Count everything as private and let
            // the accuracy classifier warn about the overestimate.
            Ok(MemorySample {
                private_kib: statm.resident_pages * cap.page_kib,
                shared_kib: 0,
                fingerprint: pid as u64,
            })
        }
        Tier::NoSmaps => {
            let rss_kib = statm.resident_pages * cap.page_kib;
            let shared_kib = statm.shared_pages * cap.page_kib;
            Ok(MemorySample {
                private_kib: rss_kib.saturating_sub(shared_kib),
                shared_kib,
                fingerprint: pid as u64,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Tier;
    use std::path::PathBuf;

    fn cap(root: &Path, tier: Tier) -> KernelCapability {
        KernelCapability {
            version: (5, 15, 0),
            tier,
            proc_root: root.to_path_buf(),
            page_kib: 4,
        }
    }

    fn write_proc_files(root: &Path, pid: u32, statm: &str, smaps: Option<&str>) -> PathBuf {
        let dir = root.join(pid.to_string());
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("statm"), statm).unwrap();
        if let Some(s) = smaps {
            std::fs::write(dir.join("smaps"), s).unwrap();
        }
        dir
    }

    const SMAPS_PSS: &str = "\
00400000-00452000 r-xp 00000000 08:02 173521 /usr/bin/dbus-daemon
Size:                328 kB
Rss:                 120 kB
Pss:                  65 kB
Shared_Clean:         80 kB
Shared_Dirty:          0 kB
Private_Clean:        60 kB
Private_Dirty:        40 kB
Referenced:          120 kB
Swap:                  0 kB
7f0000000000-7f0000021000 rw-p 00000000 00:00 0
Size:                132 kB
Rss:                  70 kB
Pss:                  65 kB
Shared_Clean:          0 kB
Shared_Dirty:          0 kB
Private_Clean:         0 kB
Private_Dirty:         0 kB
";

    // -------------------------------------------------------------------------
    // Tests for the PSS tier
    // -------------------------------------------------------------------------

    #[test]
    fn test_pss_shared_derivation() {
        // Private = 100, Pss lines sum to 130 over 2 lines: adjusted total is
        // 131.0, so shared = 31.
        let root = tempfile::tempdir().unwrap();
        write_proc_files(root.path(), 100, "500 250 80 20 0 150 0\n", Some(SMAPS_PSS));
        let sample = read_sample(&cap(root.path(), Tier::Pss), 100).unwrap();
        assert_eq!(sample.private_kib, 100);
        assert_eq!(sample.shared_kib, 31);
    }

    #[test]
    fn test_pss_shared_clamped_at_zero() {
        let root = tempfile::tempdir().unwrap();
        let smaps = "Pss: 10 kB\nPrivate_Dirty: 40 kB\n";
        write_proc_files(root.path(), 101, "10 10 2 1 0 5 0\n", Some(smaps));
        let sample = read_sample(&cap(root.path(), Tier::Pss), 101).unwrap();
        assert_eq!(sample.private_kib, 40);
        // 10.5 - 40 is negative; clamped rather than wrapped.
        assert_eq!(sample.shared_kib, 0);
    }

    #[test]
    fn test_fingerprint_tracks_full_content() {
        let root = tempfile::tempdir().unwrap();
        write_proc_files(root.path(), 200, "500 250 80 20 0 150 0\n", Some(SMAPS_PSS));
        write_proc_files(root.path(), 201, "500 250 80 20 0 150 0\n", Some(SMAPS_PSS));
        // Same accounting values but a different map header line.
        let diverged = SMAPS_PSS.replace("/usr/bin/dbus-daemon", "/usr/bin/dbus-broker");
        write_proc_files(root.path(), 202, "500 250 80 20 0 150 0\n", Some(&diverged));

        let c = cap(root.path(), Tier::Pss);
        let a = read_sample(&c, 200).unwrap();
        let b = read_sample(&c, 201).unwrap();
        let d = read_sample(&c, 202).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, d.fingerprint);
        assert_eq!(a.private_kib, d.private_kib);
    }

    // -------------------------------------------------------------------------
    // Tests for non-PSS tiers
    // -------------------------------------------------------------------------

    #[test]
    fn test_smaps_without_pss_uses_raw_sums() {
        let root = tempfile::tempdir().unwrap();
        let smaps = "\
Rss: 120 kB
Shared_Clean: 80 kB
Shared_Dirty: 10 kB
Private_Clean: 20 kB
Private_Dirty: 10 kB
";
        write_proc_files(root.path(), 300, "500 250 80 20 0 150 0\n", Some(smaps));
        let sample = read_sample(&cap(root.path(), Tier::SmapsNoPss), 300).unwrap();
        assert_eq!(sample.shared_kib, 90);
        assert_eq!(sample.private_kib, 30);
        // Fingerprint degrades to the PID: no clone dedup on this tier.
        assert_eq!(sample.fingerprint, 300);
    }

    #[test]
    fn test_legacy_statm_counts_rss_as_private() {
        let root = tempfile::tempdir().unwrap();
        write_proc_files(root.path(), 400, "500 250 999 20 0 150 0\n", None);
        let sample = read_sample(&cap(root.path(), Tier::LegacyStatm), 400).unwrap();
        assert_eq!(sample.private_kib, 250 * 4);
        assert_eq!(sample.shared_kib, 0);
    }

    #[test]
    fn test_no_smaps_statm_fallback() {
        let root = tempfile::tempdir().unwrap();
        write_proc_files(root.path(), 500, "500 250 80 20 0 150 0\n", None);
        let sample = read_sample(&cap(root.path(), Tier::NoSmaps), 500).unwrap();
        assert_eq!(sample.shared_kib, 80 * 4);
        assert_eq!(sample.private_kib, (250 - 80) * 4);
    }

    // -------------------------------------------------------------------------
    // Error paths
    // -------------------------------------------------------------------------

    #[test]
    fn test_vanished_process_reports_gone() {
        let root = tempfile::tempdir().unwrap();
        let err = read_sample(&cap(root.path(), Tier::Pss), 999).unwrap_err();
        assert!(matches!(err, ProcError::Gone));
    }

    #[test]
    fn test_malformed_statm() {
        let root = tempfile::tempdir().unwrap();
        write_proc_files(root.path(), 600, "not numbers at all\n", None);
        let err = read_sample(&cap(root.path(), Tier::NoSmaps), 600).unwrap_err();
        assert!(matches!(err, ProcError::Malformed(_)));
    }
}
