//! Helpers for running external extraction tools.

use std::io::Write;

use tempfile::NamedTempFile;
use tokio::process::Command;

use papyrus_core::{Error, Result};

/// Run a command with a timeout, returning stdout as a string.
pub(crate) async fn run_cmd_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<String> {
    cmd.kill_on_drop(true);
    let output = tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| Error::Extraction(format!("External command timed out after {}s", timeout_secs)))?
        .map_err(|e| Error::Extraction(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Extraction(format!(
            "Command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Write `data` to a temporary file with the given suffix. The file is removed on drop.
pub(crate) fn write_temp_file(data: &[u8], suffix: &str) -> Result<NamedTempFile> {
    let mut tmpfile = tempfile::Builder::new()
        .prefix("papyrus-")
        .suffix(suffix)
        .tempfile()
        .map_err(|e| Error::Internal(format!("Failed to create temp file: {}", e)))?;
    tmpfile
        .write_all(data)
        .map_err(|e| Error::Internal(format!("Failed to write temp file: {}", e)))?;
    Ok(tmpfile)
}

/// Whether a tool answers `<binary> <version_flag>`.
///
/// Some tools (pdftotext) exit with 99 after printing their version.
pub(crate) async fn binary_available(binary: &str, version_flag: &str) -> bool {
    match Command::new(binary).arg(version_flag).output().await {
        Ok(output) => output.status.success() || output.status.code() == Some(99),
        Err(_) => false,
    }
}
