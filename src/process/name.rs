//! Program name resolution.
//!
//! Derives the label a process is grouped under. The default policy resolves
//! through the exe symlink so interpreted programs merge under their
//! interpreter's real binary name, and keeps deleted or replaced binaries
//! distinguishable with `[deleted]` / `[updated]` annotations. An optional
//! mode groups by the full command line instead, for callers that want
//! per-invocation rather than per-binary grouping.

use std::fs;
use std::path::Path;

use crate::error::ProcError;
use crate::kernel::KernelCapability;

/// Marker the kernel appends to an exe link whose backing file was removed.
const DELETED_SUFFIX: &str = " (deleted)";

/// Reads the NUL-separated argument list, stripping the trailing empty
/// element when the command line ends in a NUL.
fn read_cmdline(cap: &KernelCapability, pid: u32) -> Result<Vec<String>, ProcError> {
    let raw = fs::read(cap.proc_path(pid, "cmdline"))?;
    let mut args: Vec<String> = raw
        .split(|&b| b == 0)
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect();
    if args.last().is_some_and(|a| a.is_empty()) {
        args.pop();
    }
    Ok(args)
}

/// Short command name from the status file, with the `Name:` label stripped.
fn read_short_name(cap: &KernelCapability, pid: u32) -> Result<String, ProcError> {
    let content = fs::read_to_string(cap.proc_path(pid, "status"))?;
    let first = content.lines().next().unwrap_or("");
    let name = first
        .strip_prefix("Name:")
        .ok_or_else(|| ProcError::Malformed(format!("unexpected status line: {}", first)))?;
    Ok(name.trim().to_string())
}

/// Resolves the exe symlink and applies the deleted/updated annotation.
///
/// When the link carries the kernel's deleted marker the backing file was
/// removed or replaced after exec (typically an upgrade). If a file exists
/// again at the bare path the program was updated in place; failing that the
/// first command-line argument is tried; otherwise the binary is plain gone.
fn resolve_exe(cap: &KernelCapability, pid: u32, cmdline: &[String]) -> Result<String, ProcError> {
    let target = fs::read_link(cap.proc_path(pid, "exe"))?;
    let path = target.to_string_lossy().into_owned();

    let path = match path.strip_suffix(DELETED_SUFFIX) {
        None => path,
        Some(bare) => {
            if Path::new(bare).exists() {
                format!("{} [updated]", bare)
            } else if cmdline.first().is_some_and(|a| Path::new(a).exists()) {
                format!("{} [updated]", cmdline[0])
            } else {
                format!("{} [deleted]", bare)
            }
        }
    };
    Ok(path)
}

/// Label choice between the resolved exe basename and the kernel's short
/// command name. The status name is truncated by the kernel, so whenever the
/// exe basename extends it we prefer the full basename; this also keeps a
/// renamed or upgraded binary distinguishable from its launcher.
pub fn choose_label(exe_basename: &str, short_name: &str) -> String {
    if exe_basename.starts_with(short_name) {
        exe_basename.to_string()
    } else {
        short_name.to_string()
    }
}

/// Canonical program name for one PID.
///
/// Kernel threads have no exe link and surface as [`ProcError::Gone`], which
/// callers treat like any vanished process. With `split_args` the label is
/// the joined command line instead of the binary name.
pub fn resolve_name(
    cap: &KernelCapability,
    pid: u32,
    split_args: bool,
) -> Result<String, ProcError> {
    let cmdline = read_cmdline(cap, pid)?;
    let exe = resolve_exe(cap, pid, &cmdline)?;

    if split_args && !cmdline.is_empty() {
        return Ok(cmdline.join(" "));
    }

    let basename = exe.rsplit('/').next().unwrap_or(&exe);
    let short = read_short_name(cap, pid)?;
    Ok(choose_label(basename, &short))
}
