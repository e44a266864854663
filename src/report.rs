//! Plain-text report rendering.
//!
//! Output matches `du -h` style unit scaling: values stay below four digits
//! and carry a binary-prefix unit. The grand total line is printed only when
//! the PSS tier was active for the whole pass; on every other tier shared
//! values overlap between programs and a sum would be misleading.

use std::io::{self, Write};

use crate::aggregate::ProgramTotals;

/// Formats a KiB count with binary units, e.g. `1536` -> `"1.5 Mi"`.
pub fn human_kib(kib: u64) -> String {
    let powers = ["Ki", "Mi", "Gi", "Ti"];
    let mut num = kib as f64;
    let mut power = 0;
    while num >= 1000.0 && power + 1 < powers.len() {
        num /= 1024.0;
        power += 1;
    }
    format!("{:.1} {}", num, powers[power])
}

/// Program label annotated with the process count when grouped.
pub fn label_with_count(name: &str, count: u32) -> String {
    if count > 1 {
        format!("{} ({})", name, count)
    } else {
        name.to_string()
    }
}

/// Writes the per-program table, ascending by combined size, plus the grand
/// total footer when `show_total` (PSS tier active).
pub fn write_report(
    w: &mut impl Write,
    totals: &[ProgramTotals],
    show_total: bool,
) -> io::Result<()> {
    writeln!(w, " Private  +   Shared  =  RAM used\tProgram\n")?;
    let mut grand_total_kib = 0u64;
    for t in totals {
        grand_total_kib += t.combined_kib();
        writeln!(
            w,
            "{:>9}B + {:>9}B = {:>9}B\t{}",
            human_kib(t.private_kib),
            human_kib(t.shared_kib),
            human_kib(t.combined_kib()),
            label_with_count(&t.name, t.count),
        )?;
    }
    if show_total {
        writeln!(w, "{}", "-".repeat(33))?;
        writeln!(w, "{:>33}", format!("{}B", human_kib(grand_total_kib)))?;
        writeln!(w, "{}", "=".repeat(33))?;
    }
    Ok(())
}

/// Grand total across all retained programs, KiB. Only meaningful when the
/// PSS tier was active.
pub fn grand_total_kib(totals: &[ProgramTotals]) -> u64 {
    totals.iter().map(|t| t.combined_kib()).sum()
}
