//! psmem - per-program memory usage reporter.
//!
//! Entry point: privilege and capability pre-flight, one synchronous scan
//! pass over the proc filesystem, then the rendered report.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use nix::unistd::geteuid;
use tracing::{debug, warn, Level};

use psmem::cli::{Args, LogLevel};
use psmem::{
    advisory, classify, collect_pids, detect, read_sample, resolve_name, Accumulator,
    KernelCapability, ProcError, StartupError,
};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => Level::ERROR,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Root check before any work begins. An explicit PID list relaxes this to a
/// warning, since the caller may own those processes.
fn check_privileges(args: &Args) -> Result<(), StartupError> {
    if geteuid().is_root() {
        return Ok(());
    }
    if args.pids.is_some() {
        warn!("not running as root; processes of other users will be missing");
        return Ok(());
    }
    Err(StartupError::InsufficientPermissions)
}

/// One full enumeration pass: label, read, fold. Per-process errors only
/// shrink the sample set; they never abort the pass.
fn scan(cap: &KernelCapability, args: &Args) -> Accumulator {
    let pids = match &args.pids {
        Some(list) => list.clone(),
        None => collect_pids(&cap.proc_root, std::process::id()),
    };

    let mut acc = Accumulator::new(cap.has_pss());
    for pid in pids {
        let name = match resolve_name(cap, pid, args.split_args) {
            Ok(name) => name,
            Err(e) => {
                skip(pid, "name", e);
                continue;
            }
        };
        match read_sample(cap, pid) {
            Ok(sample) => acc.fold(name, sample),
            Err(e) => skip(pid, "memory", e),
        }
    }
    acc
}

fn skip(pid: u32, stage: &str, err: ProcError) {
    // Expected races (exited processes, kernel threads, permissions) are not
    // worth surfacing; parser surprises are.
    match err {
        ProcError::Malformed(ref msg) => debug!(pid, stage, %msg, "skipping process"),
        _ => debug!(pid, stage, %err, "skipping process"),
    }
}

fn run(args: &Args) -> Result<(), StartupError> {
    check_privileges(args)?;
    let cap = detect(args.proc_root.as_deref())?;
    debug!(version = ?cap.version, tier = ?cap.tier, "kernel capability");

    let totals = scan(&cap, args).finalize();
    let accuracy = classify(&cap);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = if args.total {
        writeln!(out, "{}", psmem::report::grand_total_kib(&totals) * 1024)
    } else {
        psmem::report::write_report(&mut out, &totals, cap.has_pss())
    };
    if let Err(e) = result {
        // Downstream pager or head closed the pipe; not an error.
        if e.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        eprintln!("psmem: write error: {}", e);
        std::process::exit(1);
    }

    if let Some(message) = advisory(accuracy) {
        eprintln!("{}", message);
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(&args);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("psmem: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
