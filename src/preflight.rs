//! Startup preflight: verify the automation toolchain and a connected
//! device before the loop is allowed to start.

use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct CheckResult {
    pub ok: bool,
    pub detail: String,
}

impl CheckResult {
    fn pass(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
        }
    }

    fn fail(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Result of the three preflight checks.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub adb: CheckResult,
    pub maestro: CheckResult,
    pub device: CheckResult,
}

impl CheckReport {
    pub fn all_ok(&self) -> bool {
        self.adb.ok && self.maestro.ok && self.device.ok
    }
}

/// Run all preflight checks. Each check is bounded by its own deadline,
/// so a wedged toolchain cannot hang startup.
pub async fn run_checks() -> CheckReport {
    let adb = check_tool("adb", &["version"]).await;
    let maestro = check_tool("maestro", &["--version"]).await;
    let device = if adb.ok {
        check_device().await
    } else {
        CheckResult::fail("skipped: adb unavailable")
    };
    CheckReport {
        adb,
        maestro,
        device,
    }
}

async fn check_tool(program: &str, args: &[&str]) -> CheckResult {
    match timeout(CHECK_TIMEOUT, Command::new(program).args(args).output()).await {
        Err(_) => CheckResult::fail(format!("`{program}` timed out")),
        Ok(Err(err)) => CheckResult::fail(format!("`{program}` not runnable: {err}")),
        Ok(Ok(output)) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let version = stdout.lines().next().unwrap_or("ok").trim().to_string();
            CheckResult::pass(version)
        }
        Ok(Ok(output)) => CheckResult::fail(format!("`{program}` exited with {}", output.status)),
    }
}

async fn check_device() -> CheckResult {
    match timeout(
        CHECK_TIMEOUT,
        Command::new("adb").arg("devices").output(),
    )
    .await
    {
        Err(_) => CheckResult::fail("`adb devices` timed out"),
        Ok(Err(err)) => CheckResult::fail(format!("`adb devices` not runnable: {err}")),
        Ok(Ok(output)) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            match first_attached_device(&stdout) {
                Some(serial) => CheckResult::pass(format!("device connected: {serial}")),
                None => CheckResult::fail("no device connected"),
            }
        }
        Ok(Ok(output)) => CheckResult::fail(format!("`adb devices` exited with {}", output.status)),
    }
}

/// Parse `adb devices` output and return the first serial in `device`
/// state, skipping the header and unauthorized/offline entries.
pub fn first_attached_device(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            (state == "device").then(|| serial.to_string())
        })
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_attached_device() {
        let out = "List of devices attached\nemulator-5554\tdevice\n\n";
        assert_eq!(
            first_attached_device(out),
            Some("emulator-5554".to_string())
        );
    }

    #[test]
    fn skips_unauthorized_and_offline_entries() {
        let out = "List of devices attached\nABC123\tunauthorized\nDEF456\toffline\nGHI789\tdevice\n";
        assert_eq!(first_attached_device(out), Some("GHI789".to_string()));
    }

    #[test]
    fn empty_list_yields_none() {
        assert_eq!(first_attached_device("List of devices attached\n\n"), None);
    }
}
