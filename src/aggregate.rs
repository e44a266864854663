//! Per-program aggregation of process memory samples.
//!
//! Folds (program name, sample) pairs into per-program totals. Shared memory
//! is combined according to the active tier: PSS shares are summable, while
//! non-PSS shared estimates overlap across processes, so only the largest
//! value seen is retained. Finalization applies the clone correction: when
//! every process grouped under one name reported the same address-space
//! fingerprint, those PIDs are handles onto a single real address space
//! (CLONE_VM without CLONE_THREAD) and the totals are divided by the process
//! count. The heuristic is approximate by design; two genuinely distinct
//! processes with byte-identical map listings would be folded too.

use ahash::{AHashMap, AHashSet};

use crate::process::MemorySample;

/// Per-program accumulator for one enumeration pass.
#[derive(Debug, Default)]
struct ProgramAggregate {
    private_kib: u64,
    shared_kib: u64,
    count: u32,
    fingerprints: AHashSet<u64>,
}

/// Finalized per-program totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramTotals {
    pub name: String,
    pub private_kib: u64,
    pub shared_kib: u64,
    pub count: u32,
}

impl ProgramTotals {
    pub fn combined_kib(&self) -> u64 {
        self.private_kib + self.shared_kib
    }
}

/// Accumulator owned by a single pass; no cross-pass state.
#[derive(Debug)]
pub struct Accumulator {
    programs: AHashMap<String, ProgramAggregate>,
    pss: bool,
}

impl Accumulator {
    /// `pss` selects the shared-combination policy for the whole pass.
    pub fn new(pss: bool) -> Self {
        Accumulator {
            programs: AHashMap::new(),
            pss,
        }
    }

    /// Folds one sample into its program's aggregate. Every aggregate is in
    /// a valid, finalizable state after each call, so a pass can be aborted
    /// at any per-process boundary.
    pub fn fold(&mut self, name: String, sample: MemorySample) {
        let agg = self.programs.entry(name).or_default();
        agg.private_kib += sample.private_kib;
        if self.pss {
            agg.shared_kib += sample.shared_kib;
        } else if agg.count == 0 || sample.shared_kib > agg.shared_kib {
            agg.shared_kib = sample.shared_kib;
        }
        agg.count += 1;
        agg.fingerprints.insert(sample.fingerprint);
    }

    /// Finalizes the pass: applies the clone correction, drops programs whose
    /// combined total is zero, and sorts ascending by combined size.
    pub fn finalize(self) -> Vec<ProgramTotals> {
        let pss = self.pss;
        let mut out: Vec<ProgramTotals> = self
            .programs
            .into_iter()
            .map(|(name, mut agg)| {
                if agg.fingerprints.len() == 1 && agg.count > 1 {
                    // One real address space behind several PIDs: counting it
                    // per PID would overstate usage.
                    agg.private_kib /= agg.count as u64;
                    if pss {
                        agg.shared_kib /= agg.count as u64;
                    }
                }
                ProgramTotals {
                    name,
                    private_kib: agg.private_kib,
                    shared_kib: agg.shared_kib,
                    count: agg.count,
                }
            })
            .filter(|t| t.combined_kib() != 0)
            .collect();
        out.sort_by(|a, b| {
            a.combined_kib()
                .cmp(&b.combined_kib())
                .then_with(|| a.name.cmp(&b.name))
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(private: u64, shared: u64, fingerprint: u64) -> MemorySample {
        MemorySample {
            private_kib: private,
            shared_kib: shared,
            fingerprint,
        }
    }

    // -------------------------------------------------------------------------
    // Shared-combination policy
    // -------------------------------------------------------------------------

    #[test]
    fn test_pss_shared_is_summed() {
        let mut acc = Accumulator::new(true);
        acc.fold("httpd".into(), sample(100, 30, 1));
        acc.fold("httpd".into(), sample(50, 20, 2));
        let totals = acc.finalize();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].private_kib, 150);
        assert_eq!(totals[0].shared_kib, 50);
        assert_eq!(totals[0].count, 2);
    }

    #[test]
    fn test_non_pss_shared_takes_maximum() {
        let mut acc = Accumulator::new(false);
        acc.fold("httpd".into(), sample(100, 30, 1));
        acc.fold("httpd".into(), sample(50, 80, 2));
        acc.fold("httpd".into(), sample(10, 40, 3));
        let totals = acc.finalize();
        assert_eq!(totals[0].private_kib, 160);
        assert_eq!(totals[0].shared_kib, 80);
    }

    // -------------------------------------------------------------------------
    // Clone correction
    // -------------------------------------------------------------------------

    #[test]
    fn test_clone_correction_divides_exactly() {
        let mut acc = Accumulator::new(true);
        acc.fold("db".into(), sample(120, 40, 7));
        acc.fold("db".into(), sample(80, 20, 7));
        let totals = acc.finalize();
        // One fingerprint across two processes: (120+80)/2 and (40+20)/2.
        assert_eq!(totals[0].private_kib, 100);
        assert_eq!(totals[0].shared_kib, 30);
        assert_eq!(totals[0].count, 2);
    }

    #[test]
    fn test_clone_correction_skips_distinct_fingerprints() {
        let mut acc = Accumulator::new(true);
        acc.fold("db".into(), sample(120, 40, 7));
        acc.fold("db".into(), sample(80, 20, 8));
        let totals = acc.finalize();
        assert_eq!(totals[0].private_kib, 200);
        assert_eq!(totals[0].shared_kib, 60);
    }

    #[test]
    fn test_single_process_never_altered() {
        let mut acc = Accumulator::new(true);
        acc.fold("init".into(), sample(123, 45, 9));
        let totals = acc.finalize();
        assert_eq!(totals[0].private_kib, 123);
        assert_eq!(totals[0].shared_kib, 45);
    }

    #[test]
    fn test_non_pss_clone_correction_leaves_shared() {
        // Outside the PSS tier shared is a max, not a sum, so only private
        // gets divided.
        let mut acc = Accumulator::new(false);
        acc.fold("db".into(), sample(120, 40, 7));
        acc.fold("db".into(), sample(80, 40, 7));
        let totals = acc.finalize();
        assert_eq!(totals[0].private_kib, 100);
        assert_eq!(totals[0].shared_kib, 40);
    }

    #[test]
    fn test_correction_never_increases_totals() {
        let raw = [
            ("a", sample(100, 10, 1)),
            ("a", sample(100, 10, 1)),
            ("a", sample(100, 10, 1)),
            ("b", sample(30, 5, 2)),
            ("b", sample(40, 5, 3)),
            ("c", sample(7, 0, 4)),
        ];
        let raw_private: u64 = raw.iter().map(|(_, s)| s.private_kib).sum();
        let mut acc = Accumulator::new(true);
        for (name, s) in raw {
            acc.fold(name.into(), s);
        }
        let folded: u64 = acc.finalize().iter().map(|t| t.private_kib).sum();
        assert!(folded <= raw_private);
    }

    // -------------------------------------------------------------------------
    // Filtering and ordering
    // -------------------------------------------------------------------------

    #[test]
    fn test_zero_total_programs_dropped() {
        let mut acc = Accumulator::new(true);
        acc.fold("empty".into(), sample(0, 0, 1));
        acc.fold("real".into(), sample(10, 0, 2));
        let totals = acc.finalize();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].name, "real");
    }

    #[test]
    fn test_sorted_ascending_by_combined() {
        let mut acc = Accumulator::new(true);
        acc.fold("big".into(), sample(1000, 200, 1));
        acc.fold("small".into(), sample(5, 1, 2));
        acc.fold("mid".into(), sample(50, 50, 3));
        let totals = acc.finalize();
        let combined: Vec<u64> = totals.iter().map(|t| t.combined_kib()).collect();
        let mut sorted = combined.clone();
        sorted.sort_unstable();
        assert_eq!(combined, sorted);
        assert_eq!(totals[0].name, "small");
        assert_eq!(totals[2].name, "big");
    }
}
