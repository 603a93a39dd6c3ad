//! Device controller: stateless wrappers around the `adb` and `maestro`
//! CLIs. Each call issues exactly one external command under a bounded
//! deadline and maps failures to [`DeviceError`] with the operation name
//! and the tool's diagnostic output verbatim. No retries happen here.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::errors::DeviceError;

/// Seam over the attached device so the session loop can run against a
/// fake in tests.
#[async_trait]
pub trait DeviceControl: Send + Sync {
    /// Capture a full-screen bitmap (PNG bytes).
    async fn capture_screen(&self) -> Result<Vec<u8>, DeviceError>;

    /// Dump the on-screen UI hierarchy as text.
    async fn get_hierarchy(&self) -> Result<String, DeviceError>;

    /// Tap an element by its visible text.
    async fn tap(&self, text: &str) -> Result<(), DeviceError>;

    /// Tap a screen coordinate.
    async fn tap_point(&self, x: i64, y: i64) -> Result<(), DeviceError>;

    /// Type text into the focused field.
    async fn input_text(&self, text: &str) -> Result<(), DeviceError>;

    /// Hardware back action.
    async fn go_back(&self) -> Result<(), DeviceError>;
}

/// Driver for one Android device reachable over adb, with Maestro for
/// element-level interaction.
pub struct MaestroDriver {
    command_timeout: Duration,
    capture_timeout: Duration,
}

impl MaestroDriver {
    pub fn new(command_timeout: Duration, capture_timeout: Duration) -> Self {
        Self {
            command_timeout,
            capture_timeout,
        }
    }

    async fn run(
        &self,
        op: &'static str,
        program: &str,
        args: &[&str],
        deadline: Duration,
    ) -> Result<Vec<u8>, DeviceError> {
        debug!(op, program, ?args, "running device command");
        let output = timeout(deadline, Command::new(program).args(args).output())
            .await
            .map_err(|_| DeviceError::Timeout {
                op,
                timeout: deadline,
            })?
            .map_err(|source| DeviceError::Spawn { op, source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(DeviceError::CommandFailed { op, detail });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl DeviceControl for MaestroDriver {
    async fn capture_screen(&self) -> Result<Vec<u8>, DeviceError> {
        let op = "capture_screen";
        let bytes = self
            .run(op, "adb", &["exec-out", "screencap", "-p"], self.capture_timeout)
            .await?;
        if bytes.is_empty() {
            return Err(DeviceError::EmptyOutput { op });
        }
        Ok(bytes)
    }

    async fn get_hierarchy(&self) -> Result<String, DeviceError> {
        let op = "get_hierarchy";
        let bytes = self
            .run(op, "maestro", &["hierarchy"], self.command_timeout)
            .await?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        if text.trim().is_empty() {
            return Err(DeviceError::EmptyOutput { op });
        }
        Ok(text)
    }

    async fn tap(&self, text: &str) -> Result<(), DeviceError> {
        self.run(
            "tap",
            "maestro",
            &["studio", "tap", text],
            self.command_timeout,
        )
        .await
        .map(|_| ())
    }

    async fn tap_point(&self, x: i64, y: i64) -> Result<(), DeviceError> {
        let (x, y) = (x.to_string(), y.to_string());
        self.run(
            "tap_point",
            "maestro",
            &["studio", "tap", "-x", &x, "-y", &y],
            self.command_timeout,
        )
        .await
        .map(|_| ())
    }

    async fn input_text(&self, text: &str) -> Result<(), DeviceError> {
        self.run(
            "input_text",
            "maestro",
            &["studio", "input", text],
            self.command_timeout,
        )
        .await
        .map(|_| ())
    }

    async fn go_back(&self) -> Result<(), DeviceError> {
        // keyevent 4 is KEYCODE_BACK
        self.run(
            "go_back",
            "adb",
            &["shell", "input", "keyevent", "4"],
            self.command_timeout,
        )
        .await
        .map(|_| ())
    }
}
