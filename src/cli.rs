//! CLI arguments for psmem.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "psmem",
    about = "Report core memory usage per program, with accurate private/shared split",
    long_about = "Report core memory usage per program, not per process.\n\n\
                  All processes sharing a program name are summed together: private RAM plus \
                  that program's portion of shared RAM. Shared memory is hard to attribute; \
                  the most accurate method the running kernel supports is selected \
                  automatically, and a warning is printed when the result cannot be trusted.",
    version,
    long_version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (built ",
        env!("VERGEN_BUILD_TIMESTAMP"),
        ")"
    )
)]
pub struct Args {
    /// Group by full command line instead of the resolved binary name
    #[arg(short = 's', long)]
    pub split_args: bool,

    /// Only show memory usage of the given PIDs (comma-separated)
    #[arg(short = 'p', long, value_delimiter = ',')]
    pub pids: Option<Vec<u32>>,

    /// Print only the grand total in bytes
    #[arg(short = 't', long)]
    pub total: bool,

    /// Root of the process information filesystem (testing)
    #[arg(long, hide = true)]
    pub proc_root: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value = "warn")]
    pub log_level: LogLevel,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_list_parsing() {
        let args = Args::parse_from(["psmem", "-p", "1,42,7"]);
        assert_eq!(args.pids, Some(vec![1, 42, 7]));
        assert!(!args.split_args);
    }

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["psmem"]);
        assert!(args.pids.is_none());
        assert!(!args.total);
        assert!(args.proc_root.is_none());
    }
}
