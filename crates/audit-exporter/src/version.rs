//! Version reporting for the binary.
//!
//! Configuration flags are parsed by `exporter-config`, which has no version
//! flag of its own, so the binary checks for one before loading.

use std::ffi::OsStr;

/// Line printed for `--version`.
pub const VERSION_LINE: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// Returns true when the arguments after the program name ask for the version.
///
/// Accepts `--version`, `-V` and the single-dash `-version`. Arguments after
/// `--` are not inspected.
pub fn version_requested<I, S>(args: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    args.into_iter()
        .skip(1)
        .take_while(|arg| arg.as_ref() != "--")
        .any(|arg| matches!(arg.as_ref().to_str(), Some("--version" | "-V" | "-version")))
}
